//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to serialize configuration
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to write configuration file
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create configuration directory
    #[error("failed to create config directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Home directory not found
    #[error("could not determine home directory")]
    NoHomeDir,

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// A secret was expected in an environment variable that is not set
    #[error("environment variable '{var}' is not set (required for {purpose})")]
    MissingSecret { var: String, purpose: String },

    /// Failed to read or write the secret key file
    #[error("secret key file '{path}': {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key file exists but does not hold a valid Fernet key
    #[error("invalid secret key in '{0}'")]
    InvalidKey(PathBuf),

    /// Encrypted value could not be decrypted with the loaded key
    #[error("cannot decrypt {0}: invalid value or secret key mismatch")]
    Decrypt(String),
}

impl ConfigError {
    /// Create a new ReadFile error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new ParseToml error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Create a new WriteFile error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new CreateDir error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a new InvalidValue error.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new KeyFile error.
    pub fn key_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::KeyFile {
            path: path.into(),
            source,
        }
    }

    /// Create a new MissingSecret error.
    pub fn missing_secret(var: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self::MissingSecret {
            var: var.into(),
            purpose: purpose.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::NoHomeDir;
        assert_eq!(err.to_string(), "could not determine home directory");

        let err = ConfigError::invalid_value("search.query_limit", "must be greater than zero");
        assert!(err.to_string().contains("search.query_limit"));
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_missing_secret() {
        let err = ConfigError::missing_secret("TAGSYNC_CATALOG_PASSWORD", "catalog login");
        assert!(err.to_string().contains("TAGSYNC_CATALOG_PASSWORD"));
        assert!(err.to_string().contains("catalog login"));
    }

    #[test]
    fn test_decrypt_error_mentions_key_mismatch() {
        let err = ConfigError::Decrypt("encrypted value".into());
        assert!(err.to_string().contains("secret key mismatch"));
    }
}
