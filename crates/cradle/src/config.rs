//! Configuration management for cradle.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "cradle";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CRADLE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/cradle/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Account configuration.
    pub accounts: AccountsConfig,
    /// Child record configuration.
    pub children: ChildrenConfig,
    /// Identification payload configuration.
    pub payload: PayloadConfig,
}

/// Storage-related configuration.
///
/// File and directory names are resolved under `data_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of all durable state.
    /// Defaults to `~/.local/share/cradle`
    pub data_dir: Option<PathBuf>,
    /// Users collection file.
    pub users_file: String,
    /// Children collection file.
    pub children_file: String,
    /// ID counters collection file.
    pub sequences_file: String,
    /// Directory for uploaded photos.
    pub photos_dir: String,
    /// Directory for rendered identification images.
    pub qrcodes_dir: String,
}

/// Account-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Minimum password length in characters.
    pub min_password_length: usize,
}

/// Child-record configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildrenConfig {
    /// Highest accepted age, inclusive.
    pub max_age: u32,
}

/// Error-correction level handed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrection {
    /// ~7% recovery.
    Low,
    /// ~15% recovery.
    #[default]
    Medium,
    /// ~25% recovery.
    Quartile,
    /// ~30% recovery.
    High,
}

impl std::fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::Quartile => write!(f, "quartile"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Identification payload rendering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    /// Pixels per module.
    pub box_size: u32,
    /// Quiet-zone width in modules.
    pub border: u32,
    /// Error-correction level.
    pub error_correction: ErrorCorrection,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None, // Will be resolved to default at runtime
            users_file: "users.json".to_string(),
            children_file: "children.json".to_string(),
            sequences_file: "sequences.json".to_string(),
            photos_dir: "photos".to_string(),
            qrcodes_dir: "qrcodes".to_string(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            min_password_length: 6,
        }
    }
}

impl Default for ChildrenConfig {
    fn default() -> Self {
        Self { max_age: 25 }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            box_size: 10,
            border: 4,
            error_correction: ErrorCorrection::Medium,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CRADLE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at the given data directory, defaults elsewhere.
    #[must_use]
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = Some(data_dir.as_ref().to_path_buf());
        config
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.accounts.min_password_length == 0 {
            return Err(Error::ConfigValidation {
                message: "min_password_length must be greater than 0".to_string(),
            });
        }

        if self.payload.box_size == 0 {
            return Err(Error::ConfigValidation {
                message: "box_size must be greater than 0".to_string(),
            });
        }

        let names = [
            ("users_file", &self.storage.users_file),
            ("children_file", &self.storage.children_file),
            ("sequences_file", &self.storage.sequences_file),
            ("photos_dir", &self.storage.photos_dir),
            ("qrcodes_dir", &self.storage.qrcodes_dir),
        ];
        for (i, (key, value)) in names.iter().enumerate() {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("{key} cannot be empty"),
                });
            }
            if let Some((other, _)) = names[..i].iter().find(|(_, v)| v.trim() == value.trim()) {
                return Err(Error::ConfigValidation {
                    message: format!("{other} and {key} must name different paths"),
                });
            }
        }

        Ok(())
    }

    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the photos directory.
    #[must_use]
    pub fn photos_dir(&self) -> PathBuf {
        self.data_dir().join(&self.storage.photos_dir)
    }

    /// Get the identification image directory.
    #[must_use]
    pub fn qrcodes_dir(&self) -> PathBuf {
        self.data_dir().join(&self.storage.qrcodes_dir)
    }
}
