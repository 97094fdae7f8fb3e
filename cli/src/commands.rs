use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::{
    certificates::{self, CreateArgs},
    error::CapturedError,
    invocation_context::InvocationContext,
    login, lookups, public,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the certificates API, including its /api prefix
    #[arg(long, env = "CERTDESK_API_URL")]
    api_url: Option<String>,

    /// Accept invalid TLS certificates - only use against self-signed test deployments
    #[arg(long, default_value = "false")]
    skip_ssl_verification: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with an operator account and store the session locally. Scripts can set
    /// `CERTDESK_TOKEN` instead
    Login {
        #[arg(long)]
        email: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show who is logged in and where the session is stored
    Status,

    /// Print the code derived from a mention and a subject key, without contacting the backend
    Code {
        mention: String,
        subject_key: String,
    },

    /// Course mentions certificates are issued against
    Mentions {
        #[command(subcommand)]
        cmd: MentionCommand,
    },

    /// People certificates are issued to
    Subjects {
        #[command(subcommand)]
        cmd: SubjectCommand,
    },

    /// Issue and manage certificates
    Certificates {
        #[command(subcommand)]
        cmd: CertificateCommand,
    },

    /// Check a certificate code against the public registry
    Verify { code: String },

    /// Download the PDF of a certificate
    Pdf {
        code: String,

        /// Where to write the PDF, defaults to <code>.pdf
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ask for the attachment version of the file
        #[arg(long, default_value = "false")]
        download: bool,
    },
}

#[derive(Subcommand)]
pub enum MentionCommand {
    /// List the mentions in the reference sheet
    List {
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Show a single mention
    Show { nro: String },
}

#[derive(Subcommand)]
pub enum SubjectCommand {
    /// Look a subject up by their key (DNI)
    Lookup { subject_key: String },
}

#[derive(Subcommand)]
pub enum CertificateCommand {
    /// List issued certificates
    List {
        /// Only show certificates whose code, names or course contain this text
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Issue a new certificate. Missing values are prompted for when running in a terminal
    Create(CreateArgs),

    /// Annul a certificate
    Annul {
        code: String,

        #[arg(long, default_value = certificates::DEFAULT_ANNUL_REASON)]
        reason: String,

        /// Skip the confirmation prompt
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },

    /// Download the QR code of a certificate as PNG
    Qr {
        code: String,

        /// Where to write the image, defaults to <code>.png
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run() -> Result<(), CapturedError> {
        let command = Cli::parse();

        // Offline, so it works without configuration or a session
        if let Commands::Code {
            mention,
            subject_key,
        } = &command.command
        {
            lookups::code(mention, subject_key);
            return Ok(());
        }

        let context = InvocationContext::from_env(command.api_url, command.skip_ssl_verification)?;

        match command.command {
            Commands::Code { .. } => {}
            Commands::Login { email } => login::login(&context, email).await?,
            Commands::Logout => login::logout(&context)?,
            Commands::Status => login::status(&context),
            Commands::Mentions { cmd } => match cmd {
                MentionCommand::List { json } => lookups::list_mentions(&context, json).await?,
                MentionCommand::Show { nro } => lookups::show_mention(&context, &nro).await?,
            },
            Commands::Subjects { cmd } => match cmd {
                SubjectCommand::Lookup { subject_key } => {
                    lookups::lookup_subject(&context, &subject_key).await?
                }
            },
            Commands::Certificates { cmd } => match cmd {
                CertificateCommand::List { search, json } => {
                    certificates::list(&context, search.as_deref(), json).await?
                }
                CertificateCommand::Create(args) => {
                    let interactive = certificates::is_interactive();
                    certificates::create(&context, args, interactive).await?;
                }
                CertificateCommand::Annul { code, reason, yes } => {
                    certificates::annul(&context, &code, &reason, yes).await?
                }
                CertificateCommand::Qr { code, output } => {
                    certificates::qr(&context, &code, output).await?
                }
            },
            Commands::Verify { code } => public::verify(&context, &code).await?,
            Commands::Pdf {
                code,
                output,
                download,
            } => public::pdf(&context, &code, output, download).await?,
        }

        info!("Finished {}", context.config.api_url);
        Ok(())
    }
}
