use std::io::{self, IsTerminal};

use anyhow::{bail, Result};
use inquire::{validator::Validation, CustomUserError, Password, PasswordDisplayMode, Text};
use tracing::info;

use crate::invocation_context::InvocationContext;

pub(crate) fn email_validator(email: &str) -> Result<Validation, CustomUserError> {
    if email.trim().is_empty() {
        return Ok(Validation::Invalid("Email cannot be empty".into()));
    }

    if !email.contains('@') {
        return Ok(Validation::Invalid(
            "Enter the email of your operator account".into(),
        ));
    }

    Ok(Validation::Valid)
}

pub async fn login(context: &InvocationContext, email: Option<String>) -> Result<()> {
    if !io::stdout().is_terminal() {
        bail!("Failed to login. Outside a terminal, set CERTDESK_TOKEN instead")
    }

    let email = match email {
        Some(email) => email,
        None => Text::new("Email:").with_validator(email_validator).prompt()?,
    };
    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let session = context.client.login(email.trim(), &password).await?;
    context.session().save(session)?;

    println!("\n✅ Logged in as {}", email.trim());
    Ok(())
}

pub fn logout(context: &InvocationContext) -> Result<()> {
    context.session().clear()?;
    info!("Session removed from: {}", context.session().report_location());
    Ok(())
}

pub fn status(context: &InvocationContext) {
    let Some(session) = context.session().current() else {
        println!("❌ Not logged in");
        println!("Run 'certdesk login' to authenticate");
        return;
    };

    println!("\n✅ Logged in");
    println!("──────────────────────");
    println!("API:          {}", context.config.api_url);
    println!("User:         {}", session.email);
    println!("Role:         {}", session.role);
    println!("Stored in:    {}", context.session().report_location());
}
