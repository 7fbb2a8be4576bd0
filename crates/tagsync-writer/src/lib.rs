//! TagSync Writer - Warehouse tag and comment writer
//!
//! Turns the governance links of a catalog graph into DDL statements and
//! runs them against a SQL warehouse.
//!
//! # Example
//!
//! ```ignore
//! use tagsync_writer::{StatementBuilder, TagWriter, WarehouseExecutor};
//!
//! let plan = StatementBuilder::new(config.writeback.clone(), config.catalog.asset_url())
//!     .build(session.graph(), &load.objects);
//! let executor = WarehouseExecutor::from_config(&config.warehouse, &config.secrets)?;
//! let report = TagWriter::new(&executor)
//!     .with_pre_statements(config.warehouse.pre_statements.clone())
//!     .with_apply(config.writeback.apply)
//!     .apply(&plan)
//!     .await?;
//! ```

pub mod error;
pub mod executor;
pub mod path;
pub mod statement;
pub mod target;
pub mod writer;

// Re-exports for convenience
pub use error::{Result, WriterError};
pub use executor::{
    DryRunExecutor, StatementExecutor, StatementOutcome, StatementState, WarehouseExecutor,
};
pub use path::{ObjectKind, ObjectPath};
pub use statement::{sanitize_literal, StatementBuilder, StatementPlan, StatementTarget};
pub use target::WarehouseTarget;
pub use writer::{FailedStatement, ProgressCallback, TagWriter, WriteReport};
