//! Repository configuration (`.tessera/config.toml`)
//!
//! ```toml
//! [user]
//! name = "Robert Coup"
//! email = "robert@coup.net.nz"
//!
//! [annotations]
//! enabled = true
//! ```

#![allow(clippy::result_large_err)]

use crate::errors::{config_error, io_error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::object::Signature;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub annotations: AnnotationsConfig,
}

impl RepoConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(io_error("read_config", e)),
        };
        toml::from_str(&text)
            .map_err(|e| config_error(format!("Invalid {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| config_error(format!("Cannot encode config: {}", e)))?;
        fs::write(path, text).map_err(|e| io_error("write_config", e))
    }

    /// Committer signature stamped now
    ///
    /// Fails with `MissingIdentity` unless both name and email are set.
    pub fn committer(&self) -> Result<Signature> {
        match (&self.user.name, &self.user.email) {
            (Some(name), Some(email)) => Ok(Signature::now(name, email)),
            _ => Err(ExError::new(ExErrorKind::MissingIdentity)
                .with_op("committer")
                .with_message(
                    "Please tell me who you are: set user.name and user.email in .tessera/config.toml",
                )),
        }
    }
}
