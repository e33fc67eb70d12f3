//! Client configuration.

use serde::{Deserialize, Serialize};

/// Default path layout: table directory, then one object per load/file pair.
pub const DEFAULT_LAYOUT: &str = "{table_name}/{load_id}.{file_id}.{ext}";

/// Configuration for a [`FilesystemClient`](crate::client::FilesystemClient).
///
/// Validated at client construction: the layout template is parsed and the
/// dataset name normalized there, so an invalid config fails fast instead of
/// at the first load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Destination bucket URL, e.g. `s3://my-bucket/lake` or `file:///data`.
    ///
    /// The scheme selects the backend driver (constructed by the caller);
    /// this client only uses it to qualify remote paths handed to
    /// followup jobs.
    pub bucket_url: String,

    /// Logical dataset name; normalized into the dataset root directory.
    pub dataset_name: String,

    /// Path layout template for data objects.
    ///
    /// Placeholders: `{schema_name}`, `{table_name}`, `{load_id}`,
    /// `{file_id}`, `{ext}`. Must contain `{table_name}`, and only
    /// `{schema_name}` may appear before it.
    #[serde(default = "default_layout")]
    pub layout: String,

    /// When set, completed load jobs emit reference followup jobs so another
    /// destination can pick up the staged objects.
    #[serde(default)]
    pub as_staging: bool,
}

fn default_layout() -> String {
    DEFAULT_LAYOUT.to_string()
}

impl FilesystemConfig {
    /// Creates a config with the default layout and staging disabled.
    #[must_use]
    pub fn new(bucket_url: impl Into<String>, dataset_name: impl Into<String>) -> Self {
        Self {
            bucket_url: bucket_url.into(),
            dataset_name: dataset_name.into(),
            layout: default_layout(),
            as_staging: false,
        }
    }

    /// Replaces the layout template.
    #[must_use]
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Marks this destination as a staging area for another destination.
    #[must_use]
    pub fn staging(mut self) -> Self {
        self.as_staging = true;
        self
    }

    /// Returns the storage protocol from the bucket URL (`file` if the URL
    /// carries no scheme).
    #[must_use]
    pub fn protocol(&self) -> &str {
        match self.bucket_url.split_once("://") {
            Some((scheme, _)) => scheme,
            None => "file",
        }
    }

    /// Returns the bucket path: everything after the scheme separator.
    #[must_use]
    pub fn bucket_path(&self) -> &str {
        match self.bucket_url.split_once("://") {
            Some((_, path)) => path.trim_end_matches('/'),
            None => self.bucket_url.trim_end_matches('/'),
        }
    }
}
