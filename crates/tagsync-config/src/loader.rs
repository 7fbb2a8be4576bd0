//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.tagsync/config.toml`
//! 2. Local config: `.tagsync/config.toml` (in the working directory)
//! 3. Explicit config file
//! 4. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{
    CatalogConfig, ConfigOverrides, LoggingConfig, SearchConfig, SecretsConfig, TagSyncConfig,
    WarehouseConfig, WritebackConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
pub(crate) const GLOBAL_CONFIG_DIR: &str = ".tagsync";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".tagsync";

/// Configuration loader with inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.tagsync`)
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.tagsync`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a working directory.
    pub fn local_config_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration with an optional explicit file and CLI overrides.
    ///
    /// Merges config in order: global → local → explicit → overrides.
    /// An explicit file that does not exist is an error; missing global and
    /// local files are skipped.
    pub fn load(
        &self,
        work_dir: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<TagSyncConfig, ConfigError> {
        let mut config = TagSyncConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(work_dir)? {
            config = merge_configs(config, local_config);
        }

        if let Some(path) = explicit {
            debug!("Loading explicit config from {:?}", path);
            config = merge_configs(config, load_config_file(path)?);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&self) -> Result<Option<TagSyncConfig>, ConfigError> {
        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        load_config_file(&global_path).map(Some)
    }

    /// Load only the local configuration for a working directory.
    pub fn load_local(&self, work_dir: &Path) -> Result<Option<TagSyncConfig>, ConfigError> {
        let local_path = self.local_config_path(work_dir);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Initialize local configuration for a working directory.
    ///
    /// Creates `.tagsync/config.toml` with default configuration unless it
    /// already exists.
    pub fn init_local(&self, work_dir: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = self.local_config_path(work_dir);
        if !config_path.exists() {
            save_config_file(&config_path, &TagSyncConfig::default())?;
        }
        Ok(config_path)
    }

    /// Initialize the global configuration file.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(config_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };
        if !config_path.exists() {
            save_config_file(&config_path, &TagSyncConfig::default())?;
        }
        Ok(config_path)
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<TagSyncConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &TagSyncConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Use `overlay` if it differs from the default, otherwise keep `base`.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: TagSyncConfig, overlay: TagSyncConfig) -> TagSyncConfig {
    TagSyncConfig {
        catalog: merge_catalog(base.catalog, overlay.catalog),
        search: merge_search(base.search, overlay.search),
        writeback: merge_writeback(base.writeback, overlay.writeback),
        warehouse: merge_warehouse(base.warehouse, overlay.warehouse),
        logging: merge_logging(base.logging, overlay.logging),
        secrets: SecretsConfig {
            key_file: overlay.secrets.key_file.or(base.secrets.key_file),
        },
    }
}

fn merge_catalog(base: CatalogConfig, overlay: CatalogConfig) -> CatalogConfig {
    let d = CatalogConfig::default();
    CatalogConfig {
        pod: pick(base.pod, overlay.pod, d.pod),
        identity_url: overlay.identity_url.or(base.identity_url),
        search_url: overlay.search_url.or(base.search_url),
        asset_url: overlay.asset_url.or(base.asset_url),
        username: pick(base.username, overlay.username, d.username),
        password_env: pick(base.password_env, overlay.password_env, d.password_env),
        encrypted_password: overlay.encrypted_password.or(base.encrypted_password),
        resource_name: pick(base.resource_name, overlay.resource_name, d.resource_name),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
        max_retries: pick(base.max_retries, overlay.max_retries, d.max_retries),
    }
}

fn merge_search(base: SearchConfig, overlay: SearchConfig) -> SearchConfig {
    let d = SearchConfig::default();
    SearchConfig {
        query_limit: pick(base.query_limit, overlay.query_limit, d.query_limit),
        page_size: pick(base.page_size, overlay.page_size, d.page_size),
        verbose: base.verbose || overlay.verbose,
        asset_types: pick(base.asset_types, overlay.asset_types, d.asset_types),
    }
}

fn merge_writeback(base: WritebackConfig, overlay: WritebackConfig) -> WritebackConfig {
    let d = WritebackConfig::default();
    WritebackConfig {
        business_terms: pick(base.business_terms, overlay.business_terms, d.business_terms),
        business_term_tag: pick(
            base.business_term_tag,
            overlay.business_term_tag,
            d.business_term_tag,
        ),
        parent_policies: pick(base.parent_policies, overlay.parent_policies, d.parent_policies),
        parent_policy_tag: pick(
            base.parent_policy_tag,
            overlay.parent_policy_tag,
            d.parent_policy_tag,
        ),
        classifications: pick(base.classifications, overlay.classifications, d.classifications),
        classification_tag: pick(
            base.classification_tag,
            overlay.classification_tag,
            d.classification_tag,
        ),
        comments: pick(base.comments, overlay.comments, d.comments),
        include_url_in_table_comment: pick(
            base.include_url_in_table_comment,
            overlay.include_url_in_table_comment,
            d.include_url_in_table_comment,
        ),
        url_text: pick(base.url_text, overlay.url_text, d.url_text),
        unset_tags_first: pick(
            base.unset_tags_first,
            overlay.unset_tags_first,
            d.unset_tags_first,
        ),
        apply: pick(base.apply, overlay.apply, d.apply),
    }
}

fn merge_warehouse(base: WarehouseConfig, overlay: WarehouseConfig) -> WarehouseConfig {
    let d = WarehouseConfig::default();
    WarehouseConfig {
        hostname: overlay.hostname.or(base.hostname),
        port: pick(base.port, overlay.port, d.port),
        http_path: overlay.http_path.or(base.http_path),
        jdbc_url: overlay.jdbc_url.or(base.jdbc_url),
        token_env: pick(base.token_env, overlay.token_env, d.token_env),
        encrypted_token: overlay.encrypted_token.or(base.encrypted_token),
        pre_statements: pick(base.pre_statements, overlay.pre_statements, d.pre_statements),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
        poll_interval_ms: pick(
            base.poll_interval_ms,
            overlay.poll_interval_ms,
            d.poll_interval_ms,
        ),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let d = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, d.level),
        format: pick(base.format, overlay.format, d.format),
    }
}
