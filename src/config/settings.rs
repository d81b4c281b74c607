use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub release: ReleaseConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Remote that receives the release branch and tags
    pub remote: String,
    pub tag_prefix: String,
    /// How many log entries a lookup by hash searches when no depth is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub log_commands: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            tag_prefix: "v".to_string(),
            log_limit: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_commands: true,
            log_path: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("gitrelease"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Config file not found",
            )));
        }

        Self::from_toml(&fs::read_to_string(&path)?)
    }

    /// Load configuration, or the defaults when no config file exists yet
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::load() {
            Err(ConfigError::ReadError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default_config())
            }
            Err(ConfigError::DirectoryNotFound) => Ok(Self::default_config()),
            other => other,
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self)?;

        fs::write(&path, contents)?;

        // Set permissions to 600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let remote = &self.release.remote;
        if remote.is_empty() || remote.chars().any(char::is_whitespace) || remote.starts_with('-') {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid remote name: {:?}",
                remote
            )));
        }

        if self.release.tag_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "tag_prefix must not contain whitespace".to_string(),
            ));
        }

        if self.release.tag_prefix.starts_with('-') {
            return Err(ConfigError::InvalidValue(
                "tag_prefix must not start with '-'".to_string(),
            ));
        }

        if self.release.log_limit == Some(0) {
            return Err(ConfigError::InvalidValue(
                "log_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
