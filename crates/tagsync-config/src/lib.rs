//! TagSync Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.tagsync/config.toml`
//! - Local config: `.tagsync/config.toml` (in the working directory)
//! - An explicit config file passed on the command line
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → explicit → CLI overrides.
//! Secrets live either in environment variables named by the config, or in the
//! file as Fernet tokens encrypted with a local key (see [`SecretKey`]).

mod error;
mod loader;
mod secret;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use secret::{default_key_path, SecretKey};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default maximum hits a single search window may report.
pub const DEFAULT_QUERY_LIMIT: u64 = 10_000;

/// Default page size for windowed fetches.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Root configuration for TagSync.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TagSyncConfig {
    /// Catalog service connection
    pub catalog: CatalogConfig,

    /// Search partitioning behaviour
    pub search: SearchConfig,

    /// What gets written back to the warehouse
    pub writeback: WritebackConfig,

    /// Warehouse connection
    pub warehouse: WarehouseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Key used for encrypted secrets
    pub secrets: SecretsConfig,
}

/// Catalog service connection settings.
///
/// # Example TOML
///
/// ```toml
/// [catalog]
/// pod = "dm-us"
/// username = "svc_tagsync"
/// password_env = "TAGSYNC_CATALOG_PASSWORD"
/// resource_name = "Azure Databricks"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Pod identifier used to derive service URLs
    pub pod: String,

    /// Identity service base URL (derived from `pod` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_url: Option<String>,

    /// Search service base URL (derived from `pod` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,

    /// Asset page base URL used in comment links (derived from `pod` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,

    /// Catalog login user
    pub username: String,

    /// Environment variable holding the catalog password
    pub password_env: String,

    /// Fernet-encrypted catalog password; wins over `password_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_password: Option<String>,

    /// Name of the catalog resource to synchronize
    pub resource_name: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            pod: "dm-us".to_string(),
            identity_url: None,
            search_url: None,
            asset_url: None,
            username: String::new(),
            password_env: "TAGSYNC_CATALOG_PASSWORD".to_string(),
            encrypted_password: None,
            resource_name: String::new(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl CatalogConfig {
    /// Effective identity service base URL.
    pub fn identity_url(&self) -> String {
        self.identity_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.informaticacloud.com", self.pod))
    }

    /// Effective search service base URL.
    pub fn search_url(&self) -> String {
        self.search_url
            .clone()
            .unwrap_or_else(|| format!("https://cdgc-api.{}.informaticacloud.com", self.pod))
    }

    /// Effective asset page base URL.
    pub fn asset_url(&self) -> String {
        self.asset_url
            .clone()
            .unwrap_or_else(|| format!("https://cdgc.{}.informaticacloud.com/asset", self.pod))
    }

    /// Catalog password: decrypted from `encrypted_password` when set,
    /// otherwise read from the configured environment variable.
    pub fn password(&self, secrets: &SecretsConfig) -> Result<String, ConfigError> {
        resolve_secret(
            self.encrypted_password.as_deref(),
            &self.password_env,
            secrets,
            "catalog login",
        )
    }
}

/// Progressive search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum hits a single query may report before it must be split
    pub query_limit: u64,

    /// Page size for windowed fetches
    pub page_size: u64,

    /// Report every probe and split decision at INFO level
    pub verbose: bool,

    /// Concrete asset types used for the type-split tier, in probe order
    pub asset_types: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query_limit: DEFAULT_QUERY_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            verbose: false,
            asset_types: default_asset_types(),
        }
    }
}

/// The relational asset types probed when a resource overflows the query limit.
pub fn default_asset_types() -> Vec<String> {
    [
        "com.infa.odin.models.relational.Database",
        "com.infa.odin.models.relational.Schema",
        "com.infa.odin.models.relational.Table",
        "com.infa.odin.models.relational.View",
        "com.infa.odin.models.relational.Column",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Writeback selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WritebackConfig {
    /// Write business term tags
    pub business_terms: bool,

    /// Tag name for business terms
    pub business_term_tag: String,

    /// Write parent policy tags
    pub parent_policies: bool,

    /// Tag name for parent policies
    pub parent_policy_tag: String,

    /// Write classification tags
    pub classifications: bool,

    /// Tag name for classifications
    pub classification_tag: String,

    /// Write descriptions as comments
    pub comments: bool,

    /// Append an asset link to table and view comments
    pub include_url_in_table_comment: bool,

    /// Link text for the asset link
    pub url_text: String,

    /// Unset the managed tags before setting them
    pub unset_tags_first: bool,

    /// Execute set/comment statements (false = unset and pre-statements only)
    pub apply: bool,
}

impl Default for WritebackConfig {
    fn default() -> Self {
        Self {
            business_terms: true,
            business_term_tag: "infa_business_term".to_string(),
            parent_policies: true,
            parent_policy_tag: "infa_policy".to_string(),
            classifications: true,
            classification_tag: "infa_classification".to_string(),
            comments: true,
            include_url_in_table_comment: false,
            url_text: "Open in Data Catalog".to_string(),
            unset_tags_first: false,
            apply: true,
        }
    }
}

impl WritebackConfig {
    /// Tag names that are unset when `unset_tags_first` is enabled.
    pub fn managed_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if self.business_terms {
            tags.push(self.business_term_tag.clone());
        }
        if self.parent_policies {
            tags.push(self.parent_policy_tag.clone());
        }
        if self.classifications {
            tags.push(self.classification_tag.clone());
        }
        tags
    }
}

/// Warehouse connection settings.
///
/// Either `hostname` + `http_path` or a `jdbc_url` must be provided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Server hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Server port
    pub port: u16,

    /// HTTP path identifying the SQL warehouse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,

    /// JDBC URL, parsed when hostname/http_path are absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jdbc_url: Option<String>,

    /// Environment variable holding the access token
    pub token_env: String,

    /// Fernet-encrypted access token; wins over `token_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_token: Option<String>,

    /// Statements executed before any tag statement
    pub pre_statements: Vec<String>,

    /// Per-statement wait timeout in seconds
    pub timeout_secs: u64,

    /// Delay between status polls for long-running statements
    pub poll_interval_ms: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 443,
            http_path: None,
            jdbc_url: None,
            token_env: "TAGSYNC_WAREHOUSE_TOKEN".to_string(),
            encrypted_token: None,
            pre_statements: Vec::new(),
            timeout_secs: 50,
            poll_interval_ms: 1000,
        }
    }
}

impl WarehouseConfig {
    /// Warehouse access token: decrypted from `encrypted_token` when set,
    /// otherwise read from the configured environment variable.
    pub fn token(&self, secrets: &SecretsConfig) -> Result<String, ConfigError> {
        resolve_secret(
            self.encrypted_token.as_deref(),
            &self.token_env,
            secrets,
            "warehouse access",
        )
    }
}

/// Location of the key for encrypted secrets.
///
/// # Example TOML
///
/// ```toml
/// [secrets]
/// key_file = "/etc/tagsync/secret.key"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SecretsConfig {
    /// Key file path (`~/.tagsync/secret.key` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl SecretsConfig {
    /// Effective key file path.
    pub fn key_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.key_file {
            Some(path) => Ok(path.clone()),
            None => default_key_path().ok_or(ConfigError::NoHomeDir),
        }
    }

    pub fn load_key(&self) -> Result<SecretKey, ConfigError> {
        SecretKey::load(&self.key_path()?)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the catalog pod
    pub pod: Option<String>,

    /// Override the resource to synchronize
    pub resource_name: Option<String>,

    /// Override the per-query hit limit
    pub query_limit: Option<u64>,

    /// Force verbose partitioning output
    pub verbose: Option<bool>,

    /// Override log level
    pub log_level: Option<String>,
}

impl TagSyncConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref pod) = overrides.pod {
            self.catalog.pod = pod.clone();
        }

        if let Some(ref name) = overrides.resource_name {
            self.catalog.resource_name = name.clone();
        }

        if let Some(limit) = overrides.query_limit {
            self.search.query_limit = limit;
        }

        if let Some(verbose) = overrides.verbose {
            self.search.verbose = verbose;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.query_limit == 0 {
            return Err(ConfigError::invalid_value(
                "search.query_limit",
                "must be greater than zero",
            ));
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::invalid_value(
                "search.page_size",
                "must be greater than zero",
            ));
        }
        if self.catalog.pod.is_empty()
            && (self.catalog.identity_url.is_none() || self.catalog.search_url.is_none())
        {
            return Err(ConfigError::invalid_value(
                "catalog.pod",
                "empty, and catalog.identity_url/search_url are not both set",
            ));
        }
        Ok(())
    }

    /// Validate the settings needed to talk to the warehouse.
    pub fn validate_warehouse(&self) -> Result<(), ConfigError> {
        let wh = &self.warehouse;
        let explicit = wh.hostname.is_some() && wh.http_path.is_some();
        if !explicit && wh.jdbc_url.is_none() {
            return Err(ConfigError::invalid_value(
                "warehouse",
                "specify hostname and http_path, or jdbc_url",
            ));
        }
        Ok(())
    }
}

/// Encrypted values shorter than this are treated as unset.
const MIN_ENCRYPTED_LEN: usize = 3;

fn resolve_secret(
    encrypted: Option<&str>,
    var: &str,
    secrets: &SecretsConfig,
    purpose: &str,
) -> Result<String, ConfigError> {
    match encrypted.map(str::trim) {
        Some(token) if token.len() >= MIN_ENCRYPTED_LEN => {
            secrets.load_key()?.decrypt(token).map_err(|e| match e {
                ConfigError::Decrypt(_) => ConfigError::Decrypt(format!("secret for {}", purpose)),
                other => other,
            })
        }
        _ => read_secret(var, purpose),
    }
}

/// Read a secret from the environment.
fn read_secret(var: &str, purpose: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::missing_secret(var, purpose)),
    }
}

/// Default path of the global configuration file, if a home directory exists.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tagsync").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TagSyncConfig::default();
        assert_eq!(config.search.query_limit, 10_000);
        assert_eq!(config.search.page_size, 100);
        assert_eq!(config.search.asset_types.len(), 5);
        assert_eq!(config.warehouse.port, 443);
        assert!(config.writeback.apply);
        assert!(!config.writeback.unset_tags_first);
    }

    #[test]
    fn test_derived_urls() {
        let catalog = CatalogConfig {
            pod: "dmp-us".to_string(),
            ..Default::default()
        };
        assert_eq!(catalog.identity_url(), "https://dmp-us.informaticacloud.com");
        assert_eq!(
            catalog.search_url(),
            "https://cdgc-api.dmp-us.informaticacloud.com"
        );
        assert_eq!(
            catalog.asset_url(),
            "https://cdgc.dmp-us.informaticacloud.com/asset"
        );
    }

    #[test]
    fn test_explicit_urls_win() {
        let catalog = CatalogConfig {
            search_url: Some("http://localhost:9200".to_string()),
            ..Default::default()
        };
        assert_eq!(catalog.search_url(), "http://localhost:9200");
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = TagSyncConfig::default();
        let overrides = ConfigOverrides {
            resource_name: Some("Snowflake Emea".to_string()),
            query_limit: Some(100),
            verbose: Some(true),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.catalog.resource_name, "Snowflake Emea");
        assert_eq!(config.search.query_limit, 100);
        assert!(config.search.verbose);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = TagSyncConfig::default();
        config.search.query_limit = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("query_limit"));
    }

    #[test]
    fn test_validate_requires_pod_or_urls() {
        let mut config = TagSyncConfig::default();
        config.catalog.pod = String::new();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "catalog.pod"));

        config.catalog.identity_url = Some("https://id.example".to_string());
        config.catalog.search_url = Some("https://search.example".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_warehouse() {
        let mut config = TagSyncConfig::default();
        assert!(config.validate_warehouse().is_err());

        config.warehouse.jdbc_url =
            Some("jdbc:databricks://adb-1.azuredatabricks.net:443/default;httpPath=/sql/1.0/warehouses/abc".to_string());
        assert!(config.validate_warehouse().is_ok());
    }

    #[test]
    fn test_managed_tags() {
        let mut writeback = WritebackConfig::default();
        writeback.parent_policies = false;
        assert_eq!(
            writeback.managed_tags(),
            vec!["infa_business_term".to_string(), "infa_classification".to_string()]
        );
    }

    #[test]
    fn test_missing_secret() {
        let catalog = CatalogConfig {
            password_env: "TAGSYNC_TEST_SURELY_UNSET_VAR".to_string(),
            ..Default::default()
        };
        let err = catalog.password(&SecretsConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { .. }));
    }

    #[test]
    fn test_encrypted_secret_wins_over_env() {
        let temp = tempfile::TempDir::new().unwrap();
        let key_path = temp.path().join("secret.key");
        let key = SecretKey::create(&key_path, false).unwrap();

        let secrets = SecretsConfig {
            key_file: Some(key_path),
        };
        let catalog = CatalogConfig {
            password_env: "TAGSYNC_TEST_SURELY_UNSET_VAR".to_string(),
            encrypted_password: Some(key.encrypt("hunter2")),
            ..Default::default()
        };
        assert_eq!(catalog.password(&secrets).unwrap(), "hunter2");

        let warehouse = WarehouseConfig {
            encrypted_token: Some(key.encrypt("dapi-123")),
            ..Default::default()
        };
        assert_eq!(warehouse.token(&secrets).unwrap(), "dapi-123");
    }

    #[test]
    fn test_short_encrypted_value_falls_back_to_env() {
        let catalog = CatalogConfig {
            password_env: "TAGSYNC_TEST_SURELY_UNSET_VAR".to_string(),
            encrypted_password: Some("  ".to_string()),
            ..Default::default()
        };
        let secrets = SecretsConfig {
            key_file: Some(PathBuf::from("/nonexistent/secret.key")),
        };
        assert!(matches!(
            catalog.password(&secrets),
            Err(ConfigError::MissingSecret { .. })
        ));
    }

    #[test]
    fn test_encrypted_secret_with_wrong_key() {
        let temp = tempfile::TempDir::new().unwrap();
        let other = SecretKey::create(&temp.path().join("other.key"), false).unwrap();
        let key_path = temp.path().join("secret.key");
        SecretKey::create(&key_path, false).unwrap();

        let warehouse = WarehouseConfig {
            encrypted_token: Some(other.encrypt("dapi-123")),
            ..Default::default()
        };
        let secrets = SecretsConfig {
            key_file: Some(key_path),
        };
        assert!(matches!(
            warehouse.token(&secrets),
            Err(ConfigError::Decrypt(_))
        ));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = TagSyncConfig::default();
        config.catalog.resource_name = "Azure Databricks".to_string();
        config.warehouse.pre_statements = vec!["USE CATALOG main".to_string()];
        config.logging.format = LogFormat::Json;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TagSyncConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }
}
