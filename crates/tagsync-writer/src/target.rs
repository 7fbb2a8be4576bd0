//! Warehouse connection target.

use once_cell::sync::Lazy;
use regex::Regex;

use tagsync_config::WarehouseConfig;

use crate::error::{Result, WriterError};

static JDBC_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"jdbc:databricks://([^:;/]+)").expect("JDBC host pattern is valid"));

static JDBC_HTTP_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"httpPath=([^;]+)").expect("JDBC httpPath pattern is valid"));

/// Resolved warehouse endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseTarget {
    pub hostname: String,
    pub port: u16,
    pub http_path: String,
}

impl WarehouseTarget {
    /// Resolve from explicit hostname and http path, else from the JDBC URL.
    pub fn resolve(config: &WarehouseConfig) -> Result<Self> {
        if let (Some(hostname), Some(http_path)) = (&config.hostname, &config.http_path) {
            if !hostname.is_empty() && !http_path.is_empty() {
                return Ok(Self {
                    hostname: hostname.clone(),
                    port: config.port,
                    http_path: http_path.clone(),
                });
            }
        }

        match config.jdbc_url.as_deref() {
            Some(url) if !url.is_empty() => Self::from_jdbc_url(url, config.port),
            _ => Err(WriterError::invalid_target(
                "specify hostname and http_path, or a jdbc_url",
            )),
        }
    }

    /// Parse `jdbc:databricks://host:443/default;...;httpPath=/sql/1.0/warehouses/abc;...`.
    pub fn from_jdbc_url(url: &str, port: u16) -> Result<Self> {
        let host = JDBC_HOST.captures(url).and_then(|c| c.get(1));
        let path = JDBC_HTTP_PATH.captures(url).and_then(|c| c.get(1));
        match (host, path) {
            (Some(host), Some(path)) => Ok(Self {
                hostname: host.as_str().to_string(),
                port,
                http_path: path.as_str().to_string(),
            }),
            _ => Err(WriterError::invalid_target(
                "invalid jdbc_url format for hostname and httpPath",
            )),
        }
    }

    /// Warehouse id: last segment of the http path.
    pub fn warehouse_id(&self) -> &str {
        self.http_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.http_path)
    }

    pub fn base_url(&self) -> String {
        if self.port == 443 {
            format!("https://{}", self.hostname)
        } else {
            format!("https://{}:{}", self.hostname, self.port)
        }
    }
}
