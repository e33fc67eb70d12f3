//! Path layout templates for data files.
//!
//! A layout is a template string with `{placeholder}` markers that decides
//! where a load job's file lands inside the dataset, e.g.
//! `{table_name}/{load_id}.{file_id}.{ext}`. Rendering is pure string
//! substitution with no I/O.
//!
//! # Table Prefixes
//!
//! Every object written for a table shares the table's *prefix*: the
//! rendered template up to and including the first `{table_name}` plus the
//! literal character that follows it. Truncation matches objects against
//! this prefix, so the template is validated at construction to keep prefix
//! derivation sound:
//!
//! - `{table_name}` must be present;
//! - only `{schema_name}` may appear before it;
//! - another placeholder may not follow it directly (a literal separator is
//!   required to tell `events` apart from `events_archive`).

use wharf_core::{Error, Result};

/// Placeholders understood by layout templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    SchemaName,
    TableName,
    LoadId,
    FileId,
    Ext,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "schema_name" => Some(Self::SchemaName),
            "table_name" => Some(Self::TableName),
            "load_id" => Some(Self::LoadId),
            "file_id" => Some(Self::FileId),
            "ext" => Some(Self::Ext),
            _ => None,
        }
    }
}

/// One parsed piece of a template: literal text or a placeholder.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A validated path layout template.
///
/// # Examples
///
/// ```
/// use wharf_filesystem::Layout;
///
/// let layout = Layout::parse("{schema_name}/{table_name}/{load_id}.{file_id}.{ext}")?;
/// let path = layout.render("s", "events", "L1", "F1", "jsonl");
/// assert_eq!(path, "s/events/L1.F1.jsonl");
/// assert_eq!(layout.table_prefix("s", "events"), "s/events/");
/// # Ok::<(), wharf_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    template: String,
    segments: Vec<Segment>,
    /// Index of the first `{table_name}` segment.
    table_index: usize,
    /// Literal character directly after `{table_name}`, if the template
    /// continues past it.
    separator: Option<char>,
    has_ext: bool,
}

impl Layout {
    /// Parses and validates a layout template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if the template contains an unknown
    /// or unclosed placeholder, lacks `{table_name}`, places a placeholder
    /// other than `{schema_name}` before `{table_name}`, or follows
    /// `{table_name}` directly with another placeholder.
    pub fn parse(template: &str) -> Result<Self> {
        let segments = scan_segments(template)?;

        let table_index = segments
            .iter()
            .position(|s| matches!(s, Segment::Placeholder(Placeholder::TableName)))
            .ok_or_else(|| {
                Error::invalid_layout(format!(
                    "layout {template:?} must contain the {{table_name}} placeholder"
                ))
            })?;

        for segment in &segments[..table_index] {
            if let Segment::Placeholder(placeholder) = segment {
                if *placeholder != Placeholder::SchemaName {
                    return Err(Error::invalid_layout(format!(
                        "layout {template:?}: only {{schema_name}} may appear before {{table_name}}"
                    )));
                }
            }
        }

        let separator = match segments.get(table_index + 1) {
            Some(Segment::Literal(text)) => text.chars().next(),
            Some(Segment::Placeholder(_)) => {
                return Err(Error::invalid_layout(format!(
                    "layout {template:?}: {{table_name}} must be followed by a separator"
                )));
            }
            None => None,
        };

        let has_ext = segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(Placeholder::Ext)));

        Ok(Self {
            template: template.to_string(),
            segments,
            table_index,
            separator,
            has_ext,
        })
    }

    /// Returns the raw template string.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Renders the destination path for one file.
    ///
    /// If the template has no `{ext}` placeholder the extension is appended
    /// as a suffix, so the file format is always recoverable from the path.
    #[must_use]
    pub fn render(
        &self,
        schema_name: &str,
        table_name: &str,
        load_id: &str,
        file_id: &str,
        ext: &str,
    ) -> String {
        let mut path = String::with_capacity(self.template.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder(placeholder) => path.push_str(match placeholder {
                    Placeholder::SchemaName => schema_name,
                    Placeholder::TableName => table_name,
                    Placeholder::LoadId => load_id,
                    Placeholder::FileId => file_id,
                    Placeholder::Ext => ext,
                }),
            }
        }
        if !self.has_ext {
            path.push('.');
            path.push_str(ext);
        }
        path
    }

    /// Renders the prefix shared by every object of one table.
    ///
    /// The prefix covers the template up to and including `{table_name}`
    /// plus the literal separator after it (when the template continues),
    /// and is always a literal prefix of [`Layout::render`] for the same
    /// schema and table.
    #[must_use]
    pub fn table_prefix(&self, schema_name: &str, table_name: &str) -> String {
        let mut prefix = String::new();
        for segment in &self.segments[..=self.table_index] {
            match segment {
                Segment::Literal(text) => prefix.push_str(text),
                Segment::Placeholder(Placeholder::SchemaName) => prefix.push_str(schema_name),
                Segment::Placeholder(Placeholder::TableName) => prefix.push_str(table_name),
                // validation rejects other placeholders before the table segment
                Segment::Placeholder(_) => {}
            }
        }
        if let Some(separator) = self.separator {
            prefix.push(separator);
        }
        prefix
    }

    /// Returns the directory portion of the table prefix.
    ///
    /// This is the deepest directory containing every object for the table.
    /// A layout that keeps files directly under the dataset root (for
    /// example `{table_name}.{load_id}.{file_id}.{ext}`) yields an empty
    /// string, meaning the dataset root itself.
    #[must_use]
    pub fn table_dir(&self, schema_name: &str, table_name: &str) -> String {
        let prefix = self.table_prefix(schema_name, table_name);
        match prefix.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }
}

/// Splits a template into literal and placeholder segments.
fn scan_segments(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(Error::invalid_layout(format!(
                "layout {template:?}: unclosed placeholder"
            )));
        };
        let name = &after[..close];
        let placeholder = Placeholder::from_name(name).ok_or_else(|| {
            Error::invalid_layout(format!(
                "layout {template:?}: unknown placeholder {name:?}"
            ))
        })?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(placeholder));
        rest = &after[close + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::DEFAULT_LAYOUT;

    #[test]
    fn default_layout_renders_all_parts() {
        let layout = Layout::parse(DEFAULT_LAYOUT).expect("valid layout");
        let path = layout.render("s", "events", "1700000000.123", "abc123", "jsonl");
        assert_eq!(path, "events/1700000000.123.abc123.jsonl");
    }

    #[test]
    fn schema_scoped_layout_renders_and_prefixes() {
        let layout =
            Layout::parse("{schema_name}/{table_name}/{load_id}.{file_id}.{ext}").expect("valid");
        assert_eq!(layout.render("s", "events", "L1", "F1", "jsonl"), "s/events/L1.F1.jsonl");
        assert_eq!(layout.table_prefix("s", "events"), "s/events/");
        assert_eq!(layout.table_dir("s", "events"), "s/events");
    }

    #[test]
    fn appends_extension_when_template_omits_it() {
        let layout = Layout::parse("{table_name}/{load_id}.{file_id}").expect("valid");
        assert_eq!(layout.render("s", "events", "L1", "F1", "jsonl"), "events/L1.F1.jsonl");
    }

    #[test]
    fn template_may_end_at_table_name() {
        let layout = Layout::parse("archive/{table_name}").expect("valid");
        let prefix = layout.table_prefix("s", "events");
        assert_eq!(prefix, "archive/events");
        assert!(layout.render("s", "events", "L1", "F1", "jsonl").starts_with(&prefix));
    }

    #[test]
    fn flat_layout_has_empty_table_dir() {
        let layout = Layout::parse("{table_name}.{load_id}.{file_id}.{ext}").expect("valid");
        assert_eq!(layout.table_prefix("s", "events"), "events.");
        assert_eq!(layout.table_dir("s", "events"), "");
    }

    #[test]
    fn rejects_template_without_table_name() {
        let err = Layout::parse("{schema_name}/{load_id}.{file_id}.{ext}").unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { .. }));
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let err = Layout::parse("{table_name}/{year}/{load_id}.{file_id}.{ext}").unwrap_err();
        assert!(err.to_string().contains("unknown placeholder"));
    }

    #[test]
    fn rejects_non_schema_placeholder_before_table_name() {
        let err = Layout::parse("{load_id}/{table_name}.{file_id}.{ext}").unwrap_err();
        assert!(err.to_string().contains("{schema_name}"));
    }

    #[test]
    fn rejects_placeholder_directly_after_table_name() {
        let err = Layout::parse("{table_name}{load_id}.{file_id}.{ext}").unwrap_err();
        assert!(err.to_string().contains("separator"));
    }

    #[test]
    fn rejects_unclosed_placeholder() {
        let err = Layout::parse("{table_name}/{load_id").unwrap_err();
        assert!(err.to_string().contains("unclosed"));
    }

    const VALID_TEMPLATES: &[&str] = &[
        "{table_name}/{load_id}.{file_id}.{ext}",
        "{schema_name}/{table_name}/{load_id}.{file_id}.{ext}",
        "{schema_name}.{table_name}.{load_id}.{file_id}.{ext}",
        "{table_name}.{load_id}.{file_id}.{ext}",
        "data/{table_name}/{file_id}",
        "archive/{table_name}",
    ];

    proptest! {
        #[test]
        fn prefix_is_literal_prefix_of_render(
            template in prop::sample::select(VALID_TEMPLATES),
            schema in "[a-z][a-z0-9_]{0,8}",
            table in "[a-z][a-z0-9_]{0,8}",
            load_id in "[0-9]{1,10}",
            file_id in "[a-z0-9]{1,12}",
            ext in "[a-z]{1,5}",
        ) {
            let layout = Layout::parse(template).expect("template is valid");
            let rendered = layout.render(&schema, &table, &load_id, &file_id, &ext);
            let prefix = layout.table_prefix(&schema, &table);
            prop_assert!(rendered.starts_with(&prefix));
        }
    }
}
