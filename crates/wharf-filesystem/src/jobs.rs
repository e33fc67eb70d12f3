//! Load jobs and followup reference jobs.
//!
//! A load job moves one extracted data file into the dataset. The upload is
//! a single synchronous step, so a job observed by the orchestrator is
//! always already terminal; there is no pending state to poll. Failures
//! surface as errors from [`crate::FilesystemClient::start_file_load`]
//! instead of as a job state, leaving retry policy entirely to the
//! orchestrator.

use std::fmt;

use ulid::Ulid;
use wharf_core::{Error, Result};

/// A job file name of the form `{table_name}.{file_id}.{retry_count}.{ext}`.
///
/// The name carries everything needed to route a file: the logical table it
/// belongs to, a unique file id, how often the orchestrator retried it, and
/// the file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJobFileName {
    /// Logical table the file loads into.
    pub table_name: String,
    /// Unique id distinguishing files of the same table and load.
    pub file_id: String,
    /// Orchestrator retry counter, zero for the first attempt.
    pub retry_count: u32,
    /// File format extension, e.g. `jsonl`.
    pub ext: String,
}

impl ParsedJobFileName {
    /// Creates a fresh job file name with a newly generated file id.
    #[must_use]
    pub fn new(table_name: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            file_id: Ulid::new().to_string(),
            retry_count: 0,
            ext: ext.into(),
        }
    }

    /// Parses a job file name into its four dot-separated parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name does not have exactly
    /// four non-empty parts or the retry counter is not a number.
    pub fn parse(file_name: &str) -> Result<Self> {
        let parts: Vec<&str> = file_name.split('.').collect();
        let &[table_name, file_id, retry, ext] = parts.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "invalid job file name {file_name:?}: expected table_name.file_id.retry_count.ext"
            )));
        };
        if table_name.is_empty() || file_id.is_empty() || ext.is_empty() {
            return Err(Error::InvalidInput(format!(
                "invalid job file name {file_name:?}: empty part"
            )));
        }
        let retry_count = retry.parse::<u32>().map_err(|_| {
            Error::InvalidInput(format!(
                "invalid job file name {file_name:?}: retry count {retry:?} is not a number"
            ))
        })?;
        Ok(Self {
            table_name: table_name.to_string(),
            file_id: file_id.to_string(),
            retry_count,
            ext: ext.to_string(),
        })
    }

    /// Returns the canonical file name, `{table}.{file_id}.{retry}.{ext}`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.table_name, self.file_id, self.retry_count, self.ext
        )
    }

    /// Returns a copy with the retry counter bumped.
    #[must_use]
    pub fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

impl fmt::Display for ParsedJobFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Terminal states a job can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Handed to a downstream destination and not yet finished there.
    Running,
    /// Finished; the object exists at its destination path.
    Completed,
}

/// One data file moved into the dataset.
///
/// Created by [`crate::FilesystemClient::start_file_load`] once the upload
/// has finished, or by `restore_file_load` when rehydrating a prior load
/// after a process restart.
#[derive(Debug, Clone)]
pub struct LoadJob {
    file_name: ParsedJobFileName,
    state: JobState,
    remote_path: Option<String>,
    as_staging: bool,
}

impl LoadJob {
    /// Job for a file that was uploaded in this process.
    pub(crate) fn uploaded(
        file_name: ParsedJobFileName,
        remote_path: String,
        as_staging: bool,
    ) -> Self {
        Self {
            file_name,
            state: JobState::Completed,
            remote_path: Some(remote_path),
            as_staging,
        }
    }

    /// Job for a file the destination absorbs without writing an object.
    pub(crate) fn no_op(file_name: ParsedJobFileName) -> Self {
        Self {
            file_name,
            state: JobState::Completed,
            remote_path: None,
            as_staging: false,
        }
    }

    /// Job rehydrated after a restart; the upload happened in a prior run.
    pub(crate) fn restored(file_name: ParsedJobFileName) -> Self {
        Self {
            file_name,
            state: JobState::Completed,
            remote_path: None,
            as_staging: false,
        }
    }

    /// Returns the parsed job file name.
    #[must_use]
    pub fn file_name(&self) -> &ParsedJobFileName {
        &self.file_name
    }

    /// Returns the job id, which is the canonical file name.
    #[must_use]
    pub fn job_id(&self) -> String {
        self.file_name.file_name()
    }

    /// Returns the terminal state of the job.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Returns the protocol-qualified path of the uploaded object, when one
    /// was written.
    #[must_use]
    pub fn remote_path(&self) -> Option<&str> {
        self.remote_path.as_deref()
    }

    /// Reference jobs the orchestrator should dispatch against the real
    /// downstream destination.
    ///
    /// Non-empty only when the client is configured as a staging area and
    /// the job wrote an object.
    #[must_use]
    pub fn followup_jobs(&self) -> Vec<ReferenceJob> {
        match (&self.remote_path, self.state) {
            (Some(remote_path), JobState::Completed) if self.as_staging => {
                vec![ReferenceJob::new(
                    self.file_name.file_name(),
                    remote_path.clone(),
                )]
            }
            _ => Vec::new(),
        }
    }

    /// Failure message accessor, meaningful only for failed jobs.
    ///
    /// Jobs constructed by this client are terminal and never failed, so
    /// calling this is a programming error in the orchestrator.
    ///
    /// # Panics
    ///
    /// Always: a completed job has no failure to report.
    #[must_use]
    pub fn failure(&self) -> &str {
        panic!(
            "job {} is {:?}; failure() is only meaningful for failed jobs",
            self.file_name, self.state
        )
    }
}

/// Pointer job emitted when this destination acts as a staging tier.
///
/// Carries the original job's file name and a protocol-qualified path the
/// downstream destination can read the staged object from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceJob {
    file_name: String,
    state: JobState,
    remote_path: String,
}

impl ReferenceJob {
    pub(crate) fn new(file_name: String, remote_path: String) -> Self {
        Self {
            file_name,
            state: JobState::Running,
            remote_path,
        }
    }

    /// Returns the original job's file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Always [`JobState::Running`]: the downstream destination has not
    /// picked the reference up yet.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Returns the protocol-qualified path of the staged object.
    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }
}
