//! Shared test utilities for wharf integration tests.
//!
//! This crate provides:
//! - [`RecordingBackend`]: In-memory storage with operation recording and
//!   failure injection
//! - [`NoDeleteFile`] / [`SilentRemove`]: capability-stripped backend
//!   wrappers for exercising the truncation fallback chain
//!
//! # Example
//!
//! ```rust,ignore
//! use wharf_test_utils::{RecordingBackend, StorageOp, init_test_logging};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     init_test_logging();
//!     let storage = RecordingBackend::new();
//!     // ... run test ...
//!     assert!(matches!(storage.operations()[0], StorageOp::MakeDirs { .. }));
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod storage;

pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("wharf=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
