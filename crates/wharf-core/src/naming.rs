//! Identifier normalization for dataset and table names.
//!
//! Every name that becomes a path segment under the storage root is folded
//! through the same rule so that logically-equal names map to the same
//! directory regardless of how the caller spelled them.

use std::fmt;

use crate::error::{Error, Result};

/// Normalizes a logical name for use as a storage path segment.
///
/// Folds to ASCII lowercase, replaces every character outside `[a-z0-9_]`
/// with an underscore, and prefixes an underscore when the name would start
/// with a digit. The rule is idempotent: normalizing a normalized name is a
/// no-op.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the name is empty or whitespace-only.
pub fn normalize_identifier(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "identifier cannot be empty".to_string(),
        ));
    }
    Ok(fold(trimmed))
}

/// The infallible folding step shared with [`DatasetName::with_suffix`].
fn fold(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' | '_' => out.push(c),
            'A'..='Z' => out.push(c.to_ascii_lowercase()),
            _ => out.push('_'),
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// A normalized dataset root name.
///
/// Always holds the output of [`normalize_identifier`], so it can be joined
/// into storage keys without further validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetName(String);

impl DatasetName {
    /// Creates a dataset name, normalizing the input.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the name is empty or whitespace-only.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self(normalize_identifier(name)?))
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a new dataset name with `suffix` appended and re-normalized.
    ///
    /// Infallible because the receiver is already non-empty.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(fold(&format!("{}{suffix}", self.0)))
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
