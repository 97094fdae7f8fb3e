use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cert_common::{
    api::ApiClient,
    config::Config,
    session::{EnvVarStore, HomeDirStore, Session, SessionContext, SessionStore},
};
use tracing::debug;

/// Everything a command needs: resolved configuration, the session, and a client bound to both.
pub struct InvocationContext {
    pub config: Config,
    pub client: ApiClient,
}

impl InvocationContext {
    pub fn new(config: Config, session: SessionContext) -> Result<Self> {
        let client = ApiClient::from_config(&config, Arc::new(session))
            .context("While building the API client")?;
        Ok(Self { config, client })
    }

    /// Reads configuration from the environment, applies command line overrides and loads the
    /// stored session. `CERTDESK_TOKEN` takes precedence over the session file.
    pub fn from_env(api_url: Option<String>, skip_ssl: bool) -> Result<Self> {
        let mut config = Config::from_env()
            .context("While reading configuration from the environment")?
            .with_api_url(api_url);
        config.skip_ssl |= skip_ssl;

        let store: Box<dyn SessionStore> = if std::env::var("CERTDESK_TOKEN").is_ok() {
            Box::new(EnvVarStore)
        } else {
            Box::new(HomeDirStore::from_env()?)
        };
        let session = SessionContext::load_from(store)?;
        debug!("using API at {}", config.api_url);

        Self::new(config, session)
    }

    pub fn session(&self) -> &SessionContext {
        self.client.session()
    }

    /// The current session, or an error telling the user to log in.
    pub fn require_session(&self) -> Result<Session> {
        match self.session().current() {
            Some(session) => Ok(session),
            None => bail!("Not logged in. Run 'certdesk login' first, or set CERTDESK_TOKEN"),
        }
    }
}
