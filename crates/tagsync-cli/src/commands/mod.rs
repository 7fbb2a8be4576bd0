//! CLI command implementations

pub mod config;
pub mod plan;
pub mod sync;

use anyhow::{Context, Result};
use tagsync_catalog::{
    CatalogSession, HttpSearchBackend, HttpSearchConfig, IdentityClient, ObjectId,
    PartitionConfig,
};
use tagsync_config::{ConfigLoader, TagSyncConfig};

use crate::progress::{finish_spinner, spinner};
use crate::GlobalOptions;

/// Load configuration: global, local, `--config` file, then flag overrides.
pub fn load_config(global: &GlobalOptions) -> Result<TagSyncConfig> {
    let work_dir = std::env::current_dir().context("Failed to get current directory")?;
    let overrides = global.to_config_overrides();

    let config = ConfigLoader::new()
        .load(&work_dir, global.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Log in to the catalog and build the search transport.
pub async fn connect(config: &TagSyncConfig, quiet: bool) -> Result<HttpSearchBackend> {
    let catalog = &config.catalog;
    if catalog.username.is_empty() {
        anyhow::bail!("catalog.username is not configured");
    }
    let password = catalog
        .password(&config.secrets)
        .context("Catalog password not available")?;

    let pb = spinner("Logging in to the catalog...", quiet);
    let identity = IdentityClient::new(catalog.identity_url(), catalog.timeout_secs)
        .context("Failed to create identity client")?;
    let credentials = identity
        .login(&catalog.username, &password)
        .await
        .context("Catalog login failed")?;
    finish_spinner(pb, &format!("Logged in to org {}", credentials.org_id));

    HttpSearchBackend::new(HttpSearchConfig::from_catalog(catalog), credentials)
        .context("Failed to create search client")
}

/// Catalog session using the configured partitioning settings.
pub fn session<'a>(
    backend: &'a HttpSearchBackend,
    config: &TagSyncConfig,
) -> CatalogSession<'a> {
    CatalogSession::new(
        backend,
        PartitionConfig::from(&config.search),
        config.search.page_size,
    )
}

/// Resource name from config or `--resource`, required by resource-scoped commands.
pub fn resource_name(config: &TagSyncConfig) -> Result<&str> {
    let name = config.catalog.resource_name.as_str();
    if name.is_empty() {
        anyhow::bail!("No resource selected: pass --resource or set catalog.resource_name");
    }
    Ok(name)
}

/// Look up a loaded resource, listing the known names when it is missing.
pub fn require_resource(session: &CatalogSession<'_>, name: &str) -> Result<ObjectId> {
    session.find_resource(name).ok_or_else(|| {
        let known: Vec<&str> = session
            .resources()
            .iter()
            .map(|&id| session.graph().get(id).name.as_str())
            .collect();
        anyhow::anyhow!(
            "Resource '{}' not found in catalog (known: {})",
            name,
            known.join(", ")
        )
    })
}

/// Print an informational message unless quiet.
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
