//! # wharf-core
//!
//! Core abstractions for the wharf destination client.
//!
//! This crate provides the foundational types and traits shared across all
//! wharf components:
//!
//! - **Storage Contract**: The filesystem-style backend trait plus in-memory
//!   and local-directory implementations
//! - **Canonical JSON**: Deterministic encoding and content hashing for
//!   catalog documents
//! - **Naming**: Identifier normalization for dataset and table names
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging setup and span helpers
//!
//! ## Crate Boundary
//!
//! `wharf-core` is the only crate allowed to define shared primitives. The
//! destination client in `wharf-filesystem` builds on these contracts and
//! never reaches around them.
//!
//! ## Example
//!
//! ```rust
//! use wharf_core::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let dataset = DatasetName::new("Reports")?;
//! assert_eq!(dataset.as_str(), "reports");
//! # Ok::<(), wharf_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod canonical_json;
pub mod error;
pub mod local;
pub mod naming;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use wharf_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::canonical_json::{content_hash, to_canonical_bytes, to_canonical_string};
    pub use crate::error::{Error, Result};
    pub use crate::local::LocalBackend;
    pub use crate::naming::{DatasetName, normalize_identifier};
    pub use crate::storage::{MemoryBackend, StorageBackend};
}

// Re-export key types at crate root for ergonomics
pub use canonical_json::{CanonicalJsonError, content_hash};
pub use error::{Error, Result};
pub use local::LocalBackend;
pub use naming::{DatasetName, normalize_identifier};
pub use observability::{LogFormat, init_logging};
pub use storage::{MemoryBackend, StorageBackend};
