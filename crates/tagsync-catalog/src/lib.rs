//! TagSync Catalog - Catalog search client with progressive query partitioning
//!
//! The catalog's search service caps every result window, so a resource
//! with more records than the cap cannot be fetched with one paginated
//! query. This crate probes hit counts and splits the scope until every
//! sub-query fits, then fetches, deduplicates and assembles the records
//! into a typed object graph.
//!
//! # Features
//!
//! - **Partitioning**: category → asset type → five-way → letter → two-letter ladder
//! - **Pluggable search**: anything implementing [`SearchBackend`]
//! - **Governance graph**: policies, classifications and business terms linked to assets
//!
//! # Example
//!
//! ```ignore
//! use tagsync_catalog::{CatalogSession, HttpSearchBackend, HttpSearchConfig, IdentityClient};
//!
//! let credentials = IdentityClient::new(catalog.identity_url(), 30)?
//!     .login(&catalog.username, &catalog.password(&config.secrets)?)
//!     .await?;
//! let backend = HttpSearchBackend::new(HttpSearchConfig::from_catalog(&catalog), credentials)?;
//!
//! let mut session = CatalogSession::new(&backend, (&config.search).into(), config.search.page_size);
//! session.load().await?;
//! let load = session.load_resource("warehouse_prod").await?;
//! ```

pub mod assembler;
pub mod auth;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod graph;
pub mod http;
pub mod partition;
pub mod range;
pub mod search;

// Re-exports for convenience
pub use assembler::{CatalogSession, ResourceLoad};
pub use auth::{Credentials, IdentityClient};
pub use dedup::{dedup_records, DedupStats, Deduplicator, RecordKey};
pub use error::{CatalogError, Result};
pub use filter::{equality_filter, range_filter, Filter, QueryDocument, SortClause};
pub use graph::{CatalogGraph, CatalogObject, ObjectId, RecordOutcome, SkipReason};
pub use http::{HttpSearchBackend, HttpSearchConfig};
pub use partition::{Category, PartitionConfig, PlanEntry, ProgressivePartitioner, QueryPlan};
pub use range::AlphaRange;
pub use search::{CountOracle, PaginatedFetcher, SearchBackend, SearchHit, SearchResponse};
