use std::str::FromStr;
use std::time;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    /// Base URL of the certificates backend, including its `/api` prefix.
    #[envconfig(from = "CERTDESK_API_URL", default = "http://localhost:8000/api")]
    pub api_url: String,

    /// Origin serving the public verification pages, used to build share links.
    #[envconfig(from = "CERTDESK_PUBLIC_URL", default = "http://localhost:5173")]
    pub public_url: String,

    #[envconfig(from = "CERTDESK_REQUEST_TIMEOUT_MS", default = "30000")]
    pub request_timeout: EnvMsDuration,

    #[envconfig(from = "CERTDESK_SKIP_SSL", default = "false")]
    pub skip_ssl: bool,

    #[envconfig(nested = true)]
    pub lookup: LookupConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct LookupConfig {
    #[envconfig(from = "CERTDESK_LOOKUP_QUIET_PERIOD_MS", default = "1000")]
    pub quiet_period: EnvMsDuration,

    #[envconfig(from = "CERTDESK_LOOKUP_MIN_LENGTH", default = "4")]
    pub min_length: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_hashmap(&Default::default())
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(api_url) = api_url {
            self.api_url = api_url;
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
