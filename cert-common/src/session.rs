//! Explicit session handling.
//!
//! The logged-in operator's token is held by a [`SessionContext`] that is handed to whatever
//! needs it. Where the token is persisted is up to the [`SessionStore`] it was built with.

use std::{
    path::PathBuf,
    sync::{Mutex, RwLock},
};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub email: String,
    pub role: String,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, Error>;
    fn save(&self, session: &Session) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
    fn report_location(&self) -> String;
}

/// Stores the session as JSON under `$CERTDESK_HOME`, falling back to `~/.certdesk`.
pub struct HomeDirStore {
    dir: PathBuf,
}

impl HomeDirStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_env() -> Result<Self, Error> {
        let dir = match std::env::var("CERTDESK_HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".certdesk"),
        };
        Ok(Self::new(dir))
    }

    fn file(&self) -> PathBuf {
        self.dir.join("session.json")
    }
}

impl SessionStore for HomeDirStore {
    fn load(&self) -> Result<Option<Session>, Error> {
        let file = self.file();
        if !file.exists() {
            return Ok(None);
        }
        let session = std::fs::read_to_string(&file).context(format!(
            "While trying to read session from file {:?}",
            file
        ))?;
        let session =
            serde_json::from_str(&session).context("While trying to parse stored session")?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        std::fs::create_dir_all(&self.dir)
            .context(format!("While trying to create directory {:?}", self.dir))?;
        let file = self.file();
        let session =
            serde_json::to_string(session).context("While trying to serialize session")?;
        std::fs::write(&file, session).context(format!(
            "While trying to write session to file {:?}",
            file
        ))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        let file = self.file();
        if file.exists() {
            std::fs::remove_file(&file)
                .context(format!("While trying to remove session file {:?}", file))?;
        }
        Ok(())
    }

    fn report_location(&self) -> String {
        self.file().to_string_lossy().to_string()
    }
}

/// Reads a token from `CERTDESK_TOKEN`, for CI and scripts. Never persists anything.
pub struct EnvVarStore;

impl SessionStore for EnvVarStore {
    fn load(&self) -> Result<Option<Session>, Error> {
        let Ok(token) = std::env::var("CERTDESK_TOKEN") else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            email: std::env::var("CERTDESK_EMAIL").unwrap_or_default(),
            role: std::env::var("CERTDESK_ROLE").unwrap_or_else(|_| "operador".to_string()),
        }))
    }

    fn save(&self, _session: &Session) -> Result<(), Error> {
        anyhow::bail!("sessions read from CERTDESK_TOKEN cannot be saved, unset it to log in")
    }

    fn clear(&self) -> Result<(), Error> {
        Ok(())
    }

    fn report_location(&self) -> String {
        "the CERTDESK_TOKEN environment variable".to_string()
    }
}

/// Keeps the session in memory only.
#[derive(Default)]
pub struct MemoryStore {
    session: Mutex<Option<Session>>,
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<Session>, Error> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    fn report_location(&self) -> String {
        "memory".to_string()
    }
}

/// The current session plus the store it is persisted to.
pub struct SessionContext {
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Builds a context and immediately loads whatever the store holds.
    pub fn load_from(store: Box<dyn SessionStore>) -> Result<Self, Error> {
        let context = Self::new(store);
        context.load()?;
        Ok(context)
    }

    pub fn load(&self) -> Result<Option<Session>, Error> {
        let session = self.store.load()?;
        debug!(
            "loaded session from {}: {}",
            self.store.report_location(),
            session.is_some()
        );
        *self.current.write().unwrap() = session.clone();
        Ok(session)
    }

    pub fn save(&self, session: Session) -> Result<(), Error> {
        self.store.save(&session)?;
        info!("Session saved to: {}", self.store.report_location());
        *self.current.write().unwrap() = Some(session);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), Error> {
        *self.current.write().unwrap() = None;
        self.store.clear()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().unwrap().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().unwrap().as_ref().map(|s| s.token.clone())
    }

    pub fn report_location(&self) -> String {
        self.store.report_location()
    }
}
