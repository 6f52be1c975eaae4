//! # mssql-sf-transfer
//!
//! Engine for migrating a SQL Server database into Snowflake by streaming
//! each table through S3 as CSV chunks.
//!
//! One submission discovers every user table in the source, extracts rows
//! concurrently with bounded parallelism, serializes them as size-capped CSV
//! chunks, uploads each chunk to the object store, bulk-loads the chunks
//! into a freshly created staging schema, and atomically swaps staging
//! tables into the production schema.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mssql_sf_transfer::{TransferEngine, TransferRegistry, TransferRequest, validate};
//!
//! #[tokio::main]
//! async fn main() -> mssql_sf_transfer::Result<()> {
//!     let registry = Arc::new(TransferRegistry::new());
//!     let engine = TransferEngine::new(registry.clone(), None);
//!
//!     let request: TransferRequest = serde_json::from_str(r#"{ "...": "..." }"#)?;
//!     assert!(validate(&request).is_empty());
//!
//!     let transfer = engine.submit(request).await?;
//!     println!("transfer {} running", transfer.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod logsink;
pub mod orchestrator;
pub mod registry;
pub mod s3;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;
pub mod util;

// Re-exports for convenient access
pub use config::{validate, S3Config, SourceConfig, TargetConfig, TransferRequest};
pub use error::{Result, TransferError};
pub use logsink::LogSink;
pub use orchestrator::{Query, Transfer, TransferEngine, TransferStatus};
pub use registry::TransferRegistry;
pub use util::random_characters;
