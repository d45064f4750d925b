//! # Config Store
//!
//! JSON persistence of the connection settings. The file holds one object
//! with two optional string fields:
//!
//! ```json
//! { "ip_address": "192.168.1.50", "port": "8080" }
//! ```
//!
//! Unknown fields are ignored on read and dropped on write. Writes overwrite
//! the file in place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::config::ConnectionSettings;
use crate::error::{RelayError, RelayResult};

/// The stored mapping. Either key may be missing; callers fill the gaps with
/// [`StoredSettings::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl StoredSettings {
    pub fn is_empty(&self) -> bool {
        self.ip_address.is_none() && self.port.is_none()
    }

    /// Concrete settings, taking each missing key from `defaults`.
    pub fn resolve(&self, defaults: &ConnectionSettings) -> ConnectionSettings {
        ConnectionSettings {
            ip_address: self
                .ip_address
                .clone()
                .unwrap_or_else(|| defaults.ip_address.clone()),
            port: self.port.clone().unwrap_or_else(|| defaults.port.clone()),
        }
    }
}

impl From<&ConnectionSettings> for StoredSettings {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            ip_address: Some(settings.ip_address.clone()),
            port: Some(settings.port.clone()),
        }
    }
}

/// Read the mapping at `path`. A missing file yields an empty mapping; a file
/// that exists but is not a valid settings object is a `Config` error.
pub fn load(path: impl AsRef<Path>) -> RelayResult<StoredSettings> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, starting from defaults");
            return Ok(StoredSettings::default());
        }
        Err(e) => {
            return Err(RelayError::io("read config", e)
                .with_context(path.display().to_string()));
        }
    };

    serde_json::from_str(&text).map_err(|e| {
        RelayError::config(path.display().to_string(), e.to_string()).with_recovery_suggestion(
            "Fix or delete the config file; it must be a JSON object with string fields ip_address and port",
        )
    })
}

/// Serialise `settings` to `path`, replacing whatever was there.
pub fn save(settings: &StoredSettings, path: impl AsRef<Path>) -> RelayResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).map_err(|e| {
        RelayError::io("write config", e).with_context(path.display().to_string())
    })?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

/// A config file location, for front ends that load and save repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> RelayResult<StoredSettings> {
        load(&self.path)
    }

    pub fn save(&self, settings: &StoredSettings) -> RelayResult<()> {
        save(settings, &self.path)
    }

    /// Persist concrete connection settings.
    pub fn save_connection(&self, settings: &ConnectionSettings) -> RelayResult<()> {
        self.save(&StoredSettings::from(settings))
    }
}
