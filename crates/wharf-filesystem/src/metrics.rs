//! Destination metrics.
//!
//! Provides metrics for load, truncation, and catalog activity. These
//! complement the structured logging approach already in place.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Load Metrics
// ============================================================================

/// Uploaded data files counter.
pub const FILES_UPLOADED: &str = "wharf_files_uploaded_total";

/// Upload duration histogram.
pub const UPLOAD_DURATION: &str = "wharf_upload_duration_seconds";

/// Completed load batches counter.
pub const LOADS_COMPLETED: &str = "wharf_loads_completed_total";

// ============================================================================
// Truncation Metrics
// ============================================================================

/// Objects deleted by table truncation counter.
pub const OBJECTS_TRUNCATED: &str = "wharf_objects_truncated_total";

/// Deletes that used the fallback remove primitive counter.
pub const FALLBACK_DELETES: &str = "wharf_fallback_deletes_total";

// ============================================================================
// Catalog Metrics
// ============================================================================

/// Catalog document writes counter.
pub const CATALOG_WRITES: &str = "wharf_catalog_writes_total";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all destination metric descriptions.
///
/// Call this once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(FILES_UPLOADED, "Total data files uploaded to the dataset");
    describe_histogram!(UPLOAD_DURATION, "Duration of file uploads in seconds");
    describe_counter!(LOADS_COMPLETED, "Total load batches completed");
    describe_counter!(OBJECTS_TRUNCATED, "Total objects deleted by table truncation");
    describe_counter!(FALLBACK_DELETES, "Total deletes served by the fallback remove primitive");
    describe_counter!(CATALOG_WRITES, "Total schema and state documents written to the catalog");
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records one uploaded file and how long the upload took.
pub fn record_file_uploaded(table: &str, duration_secs: f64) {
    let labels = [("table", table.to_string())];

    counter!(FILES_UPLOADED, &labels).increment(1);
    histogram!(UPLOAD_DURATION, &labels).record(duration_secs);
}

/// Records a completed load batch.
pub fn record_load_completed(schema: &str) {
    counter!(LOADS_COMPLETED, "schema" => schema.to_string()).increment(1);
}

/// Records objects deleted while truncating one table.
pub fn record_truncation(table: &str, objects_deleted: u64) {
    counter!(OBJECTS_TRUNCATED, "table" => table.to_string()).increment(objects_deleted);
}

/// Records a delete that fell back to the generic remove primitive.
pub fn record_fallback_delete() {
    counter!(FALLBACK_DELETES).increment(1);
}

/// Records a catalog document write.
pub fn record_catalog_write(kind: &str) {
    counter!(CATALOG_WRITES, "kind" => kind.to_string()).increment(1);
}
