//! Pipeline-state documents.
//!
//! A pipeline's resumable state is an opaque JSON document supplied by the
//! caller. The destination wraps it in a small envelope and versions it
//! through the same dual-write catalog used for schema documents, keyed by
//! pipeline name and the content hash of the state body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wharf_core::{Result, content_hash};

/// Version of the state document format written to storage.
pub const STATE_ENGINE_VERSION: u32 = 1;

/// Versioned snapshot of a pipeline's resumable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStateDoc {
    /// Caller-managed state version counter.
    pub version: u64,
    /// Document format version.
    pub engine_version: u32,
    /// Pipeline the state belongs to.
    pub pipeline_name: String,
    /// Opaque state body.
    pub state: serde_json::Value,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
    /// Content hash of the state body alone, not the envelope.
    pub version_hash: String,
}

impl PipelineStateDoc {
    /// Wraps a state body in a stamped envelope.
    ///
    /// The hash covers only the state body, so re-wrapping an unchanged
    /// state produces a document stored under the same catalog key.
    ///
    /// # Errors
    ///
    /// Returns an error if the state body cannot be canonically serialized
    /// (for example, it contains floating-point numbers).
    pub fn new(
        pipeline_name: impl Into<String>,
        version: u64,
        state: serde_json::Value,
    ) -> Result<Self> {
        let version_hash = content_hash(&state)?;
        Ok(Self {
            version,
            engine_version: STATE_ENGINE_VERSION,
            pipeline_name: pipeline_name.into(),
            state,
            created_at: Utc::now(),
            version_hash,
        })
    }
}
