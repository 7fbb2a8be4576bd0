//! Fernet encryption for secrets stored in config files.
//!
//! The key is a url-safe base64 string kept in its own file, by default
//! `~/.tagsync/secret.key`. Config values such as `catalog.encrypted_password`
//! hold tokens produced by [`SecretKey::encrypt`].

use std::fs;
use std::path::{Path, PathBuf};

use fernet::Fernet;
use tracing::debug;

use crate::loader::GLOBAL_CONFIG_DIR;
use crate::ConfigError;

/// Default key file name inside the global config directory.
pub const KEY_FILE_NAME: &str = "secret.key";

/// Default key file location (`~/.tagsync/secret.key`).
pub fn default_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(KEY_FILE_NAME))
}

/// A loaded Fernet key.
pub struct SecretKey {
    fernet: Fernet,
    encoded: String,
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

impl SecretKey {
    /// Parse an encoded key; `None` if it is not a valid Fernet key.
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let encoded = encoded.trim();
        Fernet::new(encoded).map(|fernet| Self {
            fernet,
            encoded: encoded.to_string(),
        })
    }

    /// Load the key stored at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::key_file(path, e))?;
        Self::from_encoded(&content).ok_or_else(|| ConfigError::InvalidKey(path.to_path_buf()))
    }

    /// Generate a key and write it to `path`, creating parent directories.
    ///
    /// An existing key file is only replaced when `force` is set, since every
    /// value encrypted with the old key becomes unreadable.
    pub fn create(path: &Path, force: bool) -> Result<Self, ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::key_file(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "key file already exists (use --force to replace it)",
                ),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let key = Self::from_encoded(&Fernet::generate_key())
            .ok_or_else(|| ConfigError::InvalidKey(path.to_path_buf()))?;
        fs::write(path, &key.encoded).map_err(|e| ConfigError::key_file(path, e))?;
        restrict_permissions(path)?;
        debug!("Wrote secret key to {}", path.display());
        Ok(key)
    }

    /// Encrypt a plaintext value into a Fernet token.
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a Fernet token back to its plaintext.
    pub fn decrypt(&self, token: &str) -> Result<String, ConfigError> {
        let bytes = self
            .fernet
            .decrypt(token.trim())
            .map_err(|_| ConfigError::Decrypt("encrypted value".into()))?;
        String::from_utf8(bytes)
            .map_err(|_| ConfigError::Decrypt("encrypted value (not UTF-8)".into()))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| ConfigError::key_file(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
