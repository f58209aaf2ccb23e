use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Driver settings. Every field has a default, so an empty TOML document is a
/// valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name given to the loop thread.
    pub thread_name: String,

    /// How long the loop waits for a command before draining native events.
    pub poll_interval_ms: u64,

    /// Upper bound on every caller round trip through the loop.
    pub command_timeout_ms: u64,

    /// How long a flush waits for a caller to release the window surface.
    pub surface_lock_timeout_ms: u64,

    /// Show new windows as soon as they are created.
    pub show_on_open: bool,

    pub default_title: String,

    /// `env_logger` filter used by [`crate::init_logging`] when `RUST_LOG` is
    /// not set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_name: "casement-loop".to_string(),
            poll_interval_ms: 4,
            command_timeout_ms: 5000,
            surface_lock_timeout_ms: 250,
            show_on_open: true,
            default_title: "casement".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("parse: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&s).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
    }

    /// Loads `path`, falling back to defaults if the file does not exist.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[must_use]
    pub fn surface_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.surface_lock_timeout_ms)
    }
}
