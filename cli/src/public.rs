use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cert_common::codegen::{is_code_shaped, share_link};
use tracing::info;

use crate::{invocation_context::InvocationContext, output};

pub async fn verify(context: &InvocationContext, code: &str) -> Result<()> {
    let code = code.trim();
    if !is_code_shaped(code) {
        bail!("'{code}' does not look like a certificate code");
    }

    match context.client.verify(code).await? {
        Some(certificate) => {
            println!("✅ Certificate found\n");
            output::print_certificate(&certificate, &context.config.public_url);
            if !certificate.status.is_valid() {
                println!("\n⚠️  This certificate is no longer valid");
            }
        }
        None => {
            println!("❌ No certificate with code {code}");
        }
    }
    Ok(())
}

pub async fn pdf(
    context: &InvocationContext,
    code: &str,
    output: Option<PathBuf>,
    download: bool,
) -> Result<()> {
    let Some(bytes) = context.client.certificate_pdf(code, download).await? else {
        bail!("No certificate with code {code}");
    };

    let path = output.unwrap_or_else(|| PathBuf::from(format!("{code}.pdf")));
    std::fs::write(&path, bytes).context(format!("While writing PDF to {path:?}"))?;
    info!("PDF saved to {}", path.display());
    println!(
        "Share link: {}",
        share_link(&context.config.public_url, code)
    );
    Ok(())
}
