//! # Configuration
//!
//! Optional TOML file with defaults for the global CLI flags.
//!
//! Lookup order: `--config <path>`, then `$NBHD_CONFIG`, then built-in
//! defaults. Command-line flags always win over the file.
//!
//! ```toml
//! database = "site.redb"
//! backend = "redb"
//! default_owner = "did:plc:abc123"
//! site_base_url = "https://alice.nbhd.example"
//! ```

use clap::ValueEnum;
use nbhd_core::NbhdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "NBHD_CONFIG";

/// Database path used when neither flag nor config names one.
pub const DEFAULT_DATABASE: &str = "nbhd.db";

/// Config files larger than this are rejected unread.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Storage backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Snapshot file, loaded into memory and rewritten after each change.
    File,
    /// redb database (ACID, written in place).
    #[default]
    Redb,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Redb => f.write_str("redb"),
        }
    }
}

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NbhdConfig {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub default_owner: Option<String>,
    pub site_base_url: Option<String>,
}

impl NbhdConfig {
    /// Parse a config document.
    pub fn from_toml_str(text: &str) -> Result<Self, NbhdError> {
        toml::from_str(text)
            .map_err(|e| NbhdError::DeserializationError(format!("Invalid config: {}", e)))
    }

    /// Read a config file.
    pub fn from_file(path: &Path) -> Result<Self, NbhdError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            NbhdError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(NbhdError::IoError(format!(
                "Config '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            NbhdError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from an explicit path, `$NBHD_CONFIG`, or fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, NbhdError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

/// Effective settings after merging flags over config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: Backend,
    pub default_owner: Option<String>,
    pub site_base_url: Option<String>,
    pub json_mode: bool,
}

impl Settings {
    /// Merge: a flag that was given beats the config value beats the default.
    #[must_use]
    pub fn resolve(
        config: NbhdConfig,
        database: Option<PathBuf>,
        backend: Option<Backend>,
        json_mode: bool,
    ) -> Self {
        Self {
            database: database
                .or(config.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            backend: backend.or(config.backend).unwrap_or_default(),
            default_owner: config.default_owner,
            site_base_url: config.site_base_url,
            json_mode,
        }
    }

    /// The owner given on the command line, else the configured default.
    pub fn owner(&self, flag: Option<String>) -> Result<String, NbhdError> {
        flag.or_else(|| self.default_owner.clone()).ok_or_else(|| {
            NbhdError::InvalidRecord(
                "No owner: pass --owner or set default_owner in the config".to_string(),
            )
        })
    }
}
