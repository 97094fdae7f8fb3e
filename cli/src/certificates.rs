use std::{
    io::{self, IsTerminal},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use cert_common::{
    api::ApiClient,
    debounce::Debouncer,
    form::{Field, IssueForm, IssueWorkflow},
    models::{filter_certificates, Certificate, Mention},
};
use inquire::{Confirm, Select, Text};
use tracing::{info, warn};

use crate::{invocation_context::InvocationContext, output};

pub const DEFAULT_ANNUL_REASON: &str = "Anulado desde panel";

#[derive(clap::Args, Debug, Default)]
pub struct CreateArgs {
    /// Number of the mention to issue against. Fills and locks course, hours and issue date
    #[arg(short, long)]
    pub mention: Option<String>,

    /// DNI of the holder. A registered holder's name is filled in automatically
    #[arg(short = 'k', long)]
    pub subject_key: Option<String>,

    /// Full name of the holder, last word taken as the last name
    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(long)]
    pub course: Option<String>,

    #[arg(long)]
    pub hours: Option<String>,

    /// Issue date as YYYY-MM-DD, defaults to today
    #[arg(long)]
    pub issue_date: Option<String>,

    /// Override the derived code
    #[arg(long)]
    pub code: Option<String>,
}

pub async fn list(context: &InvocationContext, search: Option<&str>, json: bool) -> Result<()> {
    context.require_session()?;
    let certificates = context.client.list_certificates().await?;
    let matching = filter_certificates(&certificates, search.unwrap_or(""));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&matching).context("While serializing certificates")?
        );
        return Ok(());
    }

    for certificate in &matching {
        println!("{}", output::certificate_row(certificate));
    }
    info!("{} of {} certificates", matching.len(), certificates.len());
    Ok(())
}

fn prompt_mention(mentions: Vec<Mention>) -> Result<Option<String>> {
    const NO_MENTION: &str = "(none, enter course details by hand)";

    let mut options = vec![NO_MENTION.to_string()];
    options.extend(mentions.iter().map(output::mention_row));
    let choice = Select::new("Mention:", options)
        .with_help_message("Type to filter")
        .raw_prompt()?;

    Ok(match choice.index {
        0 => None,
        i => mentions.get(i - 1).map(|m| m.nro.clone()),
    })
}

fn prompt_optional(message: &str) -> Result<Option<String>> {
    let value = Text::new(message).prompt()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Sets `field` from a flag, or prompts for it when it is still empty and we are in a terminal.
fn fill_field(
    workflow: &IssueWorkflow<ApiClient>,
    field: Field,
    flag: Option<String>,
    current: impl Fn(&IssueForm) -> String,
    interactive: bool,
) -> Result<()> {
    if workflow.edit(|form| form.is_locked(field)) {
        if flag.is_some() {
            warn!(
                "ignoring --{} as it comes from the selected mention or subject",
                flag_name(field)
            );
        }
        return Ok(());
    }

    let value = match flag {
        Some(value) => Some(value),
        None if interactive && current(&workflow.snapshot()).is_empty() => {
            prompt_optional(&format!("{}:", capitalize(field.label())))?
        }
        None => None,
    };

    if let Some(value) = value {
        workflow.edit(|form| form.set_field(field, &value))?;
    }
    Ok(())
}

fn flag_name(field: Field) -> &'static str {
    match field {
        Field::FullName => "name",
        Field::Course => "course",
        Field::Hours => "hours",
        Field::IssueDate => "issue-date",
        Field::Code => "code",
        Field::Status => "status",
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether missing values can be prompted for.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

pub async fn create(
    context: &InvocationContext,
    args: CreateArgs,
    interactive: bool,
) -> Result<Certificate> {
    context.require_session()?;

    // Values arrive whole from flags or prompts, so there is nothing to wait out
    let debouncer = Debouncer::new(
        "subject_key",
        Duration::ZERO,
        context.config.lookup.min_length,
    );
    let mut workflow =
        IssueWorkflow::with_debouncer(Arc::new(context.client.clone()), debouncer);

    let mention = match args.mention {
        Some(nro) => Some(nro),
        None if interactive => prompt_mention(context.client.list_mentions().await?)?,
        None => None,
    };
    if let Some(nro) = mention {
        if workflow.select_mention(&nro).await?.is_none() {
            bail!("Mention {nro} not found");
        }
    }

    let subject_key = match args.subject_key {
        Some(key) => Some(key),
        None if interactive => prompt_optional("DNI (leave empty if unknown):")?,
        None => None,
    };
    if let Some(key) = subject_key {
        workflow.input_subject_key(key.trim());
        workflow.settled().await;
    }

    if let Some(banner) = workflow.snapshot().banner() {
        warn!("{banner}");
    }
    workflow.edit(|form| form.dismiss_banner());
    if let Some(subject) = workflow.snapshot().matched_subject() {
        info!("found registered holder {}", subject.full_name);
    }

    fill_field(
        &workflow,
        Field::FullName,
        args.name,
        |form| form.full_name().to_string(),
        interactive,
    )?;
    fill_field(
        &workflow,
        Field::Course,
        args.course,
        |form| form.course().to_string(),
        interactive,
    )?;
    fill_field(
        &workflow,
        Field::Hours,
        args.hours,
        |form| form.hours().to_string(),
        interactive,
    )?;
    fill_field(
        &workflow,
        Field::IssueDate,
        args.issue_date,
        |form| form.issue_date().to_string(),
        false,
    )?;
    fill_field(
        &workflow,
        Field::Code,
        args.code,
        |form| form.code().to_string(),
        false,
    )?;

    let certificate = workflow.submit().await?;

    println!("✅ Certificate issued\n");
    output::print_certificate(&certificate, &context.config.public_url);
    Ok(certificate)
}

pub async fn annul(context: &InvocationContext, code: &str, reason: &str, yes: bool) -> Result<()> {
    context.require_session()?;

    if !yes {
        if !io::stdin().is_terminal() {
            bail!("Refusing to annul {code} without confirmation, pass --yes");
        }
        let confirmed = Confirm::new(&format!("Annul certificate {code}? This cannot be undone"))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            println!("Nothing annulled");
            return Ok(());
        }
    }

    let reason = reason.trim();
    let reason = (!reason.is_empty()).then_some(reason);
    let Some(certificate) = context.client.annul_certificate(code, reason).await? else {
        bail!("No certificate with code {code}");
    };
    println!(
        "Certificate {code} is now {}",
        output::status_label(&certificate.status)
    );
    Ok(())
}

pub async fn qr(context: &InvocationContext, code: &str, output: Option<PathBuf>) -> Result<()> {
    context.require_session()?;
    let png = context.client.certificate_qr(code).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(format!("{code}.png")));
    std::fs::write(&path, png).context(format!("While writing QR code to {path:?}"))?;
    info!("QR code saved to {}", path.display());
    Ok(())
}
