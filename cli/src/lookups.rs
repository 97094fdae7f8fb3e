use anyhow::{bail, Context, Result};
use cert_common::codegen::generate_code;
use tracing::info;

use crate::{invocation_context::InvocationContext, output};

pub fn code(mention: &str, subject_key: &str) {
    let code = generate_code(mention.trim(), subject_key.trim());
    if code.is_empty() {
        println!("(no code: both the mention and the subject key are needed)");
    } else {
        println!("{code}");
    }
}

pub async fn list_mentions(context: &InvocationContext, json: bool) -> Result<()> {
    context.require_session()?;
    let mentions = context.client.list_mentions().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&mentions).context("While serializing mentions")?
        );
        return Ok(());
    }

    for mention in &mentions {
        println!("{}", output::mention_row(mention));
    }
    info!("{} mentions", mentions.len());
    Ok(())
}

pub async fn show_mention(context: &InvocationContext, nro: &str) -> Result<()> {
    context.require_session()?;
    match context.client.get_mention(nro).await? {
        Some(mention) => output::print_mention(&mention),
        None => bail!("Mention {nro} not found"),
    }
    Ok(())
}

pub async fn lookup_subject(context: &InvocationContext, subject_key: &str) -> Result<()> {
    context.require_session()?;
    match context.client.lookup_subject(subject_key.trim()).await? {
        Some(subject) => output::print_subject(&subject),
        None => println!("No subject registered with DNI {}", subject_key.trim()),
    }
    Ok(())
}
