use crate::error::{Error, Result};
use crate::models::{CommitAuthor, RemoteCredential, DEFAULT_PROJECT_EXTENSION, DEFAULT_REMOTE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable consulted for the git token before prompting.
pub const TOKEN_ENV_VAR: &str = "ALSYNC_GIT_TOKEN";

/// Persisted session settings. The git secret is deliberately not part of
/// this struct and never touches disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project_path: PathBuf,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    #[serde(default = "default_project_extension")]
    pub project_extension: String,
    #[serde(default = "default_push_interval_secs")]
    pub push_interval_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_remote_name() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_project_extension() -> String {
    DEFAULT_PROJECT_EXTENSION.to_string()
}

fn default_push_interval_secs() -> u64 {
    3600
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_path: PathBuf::new(),
            remote_url: String::new(),
            username: String::new(),
            email: None,
            remote_name: default_remote_name(),
            project_extension: default_project_extension(),
            push_interval_secs: default_push_interval_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Settings {
    pub fn new(
        project_path: impl Into<PathBuf>,
        remote_url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            remote_url: remote_url.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Checks that everything a session needs is present. Run once, before
    /// the session starts.
    pub fn validate(&self, secret: &str) -> Result<()> {
        if self.project_path.as_os_str().is_empty() {
            return Err(Error::MissingSetting("project path"));
        }
        if self.remote_url.trim().is_empty() {
            return Err(Error::MissingSetting("git repository URL"));
        }
        if self.username.trim().is_empty() {
            return Err(Error::MissingSetting("git username"));
        }
        if secret.is_empty() {
            return Err(Error::MissingSetting("git token"));
        }
        Ok(())
    }

    pub fn author(&self) -> CommitAuthor {
        CommitAuthor::from_username(&self.username, self.email.as_deref())
    }

    pub fn credential(&self, secret: impl Into<String>) -> RemoteCredential {
        RemoteCredential::new(self.username.clone(), secret)
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval_secs.max(1))
    }

    /// `None` when debouncing is switched off.
    pub fn debounce(&self) -> Option<Duration> {
        (self.debounce_ms > 0).then_some(Duration::from_millis(self.debounce_ms))
    }
}

/// Reads the git token from the environment, if set and non-empty.
pub fn token_from_env() -> Option<String> {
    std::env::var(TOKEN_ENV_VAR)
        .ok()
        .filter(|token| !token.is_empty())
}
