//! # wharf-filesystem
//!
//! Filesystem destination client for wharf data pipelines.
//!
//! This crate implements the destination domain, providing:
//!
//! - **Path Layouts**: Template-driven placement of data files with
//!   prefix-based table addressing
//! - **Load Jobs**: Synchronous single-file uploads with immediate terminal
//!   state and optional staging followups
//! - **Storage Initialization**: Idempotent table directory setup with
//!   per-table truncation
//! - **Versioned Catalog**: Dual-write (hash-keyed plus `current`) storage
//!   of schema and pipeline-state documents
//!
//! ## Storage Layout
//!
//! ```text
//! {dataset}/
//! ├── {table_dir}/                     # data objects, per layout template
//! ├── _wharf_loads/
//! │   ├── init                         # initialization sentinel
//! │   └── {schema}.{load_id}.jsonl     # one record per completed batch
//! ├── _wharf_schema_versions/
//! │   ├── init
//! │   ├── {schema}__{hash}.jsonl       # immutable, content-addressed
//! │   └── {schema}__current.jsonl      # mutable last-write-wins pointer
//! └── _wharf_pipeline_state/
//!     ├── init
//!     ├── {pipeline}__{hash}.jsonl
//!     └── {pipeline}__current.jsonl
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use wharf_core::MemoryBackend;
//! use wharf_filesystem::{FilesystemClient, FilesystemConfig, Schema};
//!
//! let config = FilesystemConfig::new("memory://bucket", "reports");
//! let schema = Schema::new("analytics")?;
//! let client = FilesystemClient::new(Arc::new(MemoryBackend::new()), config, schema)?;
//!
//! client.initialize_storage(None, &BTreeSet::new()).await?;
//! let job = client.start_file_load("events", file.path(), "1700000000.101").await?;
//! for followup in job.followup_jobs() {
//!     // hand reference jobs to the downstream destination
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

mod catalog;
pub mod client;
pub mod config;
pub mod jobs;
pub mod layout;
pub mod metrics;
pub mod schema;
pub mod state;

// Re-export main types at crate root
pub use client::{FilesystemClient, LoadRecord, StagingScope};
pub use config::{DEFAULT_LAYOUT, FilesystemConfig};
pub use jobs::{JobState, LoadJob, ParsedJobFileName, ReferenceJob};
pub use layout::Layout;
pub use schema::{ColumnSchema, DataType, Schema, StoredSchemaInfo, TableSchema};
pub use state::PipelineStateDoc;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{FilesystemClient, LoadRecord, StagingScope};
    pub use crate::config::FilesystemConfig;
    pub use crate::jobs::{JobState, LoadJob, ReferenceJob};
    pub use crate::schema::{Schema, TableSchema};
    pub use crate::state::PipelineStateDoc;
}
