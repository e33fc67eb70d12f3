//! Observability infrastructure for wharf.
//!
//! Structured logging with consistent spans: initialization helpers plus
//! span constructors so every component labels load operations the same way.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `wharf_filesystem=debug`)
///
/// # Example
///
/// ```rust
/// use wharf_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for dataset-level operations with standard fields.
///
/// # Example
///
/// ```rust
/// use wharf_core::observability::dataset_span;
///
/// let span = dataset_span("initialize_storage", "reports");
/// let _guard = span.enter();
/// // ... do dataset operation
/// ```
#[must_use]
pub fn dataset_span(operation: &str, dataset: &str) -> Span {
    tracing::info_span!(
        "dataset",
        op = operation,
        dataset = dataset,
    )
}

/// Creates a span for load-batch operations.
///
/// # Example
///
/// ```rust
/// use wharf_core::observability::load_span;
///
/// let span = load_span("start_file_load", "reports", "1700000000.101");
/// let _guard = span.enter();
/// // ... do load operation
/// ```
#[must_use]
pub fn load_span(operation: &str, dataset: &str, load_id: &str) -> Span {
    tracing::info_span!(
        "load",
        op = operation,
        dataset = dataset,
        load_id = load_id,
    )
}
