//! Schema data model for datasets.
//!
//! A [`Schema`] names the logical tables a pipeline loads and carries a
//! monotonic version counter. Every dataset also holds three internal
//! bookkeeping tables (loads, schema versions, pipeline state) that are
//! seeded automatically and laid out under plain table-name directories
//! rather than through the configured layout template.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wharf_core::{Result, content_hash, normalize_identifier};

/// Version of the schema document format written to storage.
pub const ENGINE_VERSION: u32 = 1;

/// Prefix shared by all internal bookkeeping tables.
pub const INTERNAL_TABLE_PREFIX: &str = "_wharf";

/// Table recording one row per completed load batch.
pub const LOADS_TABLE: &str = "_wharf_loads";

/// Table holding versioned schema documents.
pub const VERSION_TABLE: &str = "_wharf_schema_versions";

/// Table holding versioned pipeline-state documents.
pub const STATE_TABLE: &str = "_wharf_pipeline_state";

/// Returns `true` for internal bookkeeping tables.
///
/// Internal tables bypass the layout template: their objects always live
/// directly under `{dataset}/{table_name}/`.
#[must_use]
pub fn is_internal_table(table_name: &str) -> bool {
    table_name.starts_with(INTERNAL_TABLE_PREFIX)
}

/// Column data types supported by the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Bigint,
    /// 64-bit float.
    Double,
    /// Boolean.
    Bool,
    /// Timestamp with timezone.
    Timestamp,
    /// Arbitrary nested JSON.
    Json,
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

impl ColumnSchema {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Marks the column as non-nullable.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Schema of one logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Normalized table name.
    pub name: String,
    /// Columns keyed by name.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSchema>,
}

impl TableSchema {
    /// Creates an empty table schema with a normalized name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name normalizes to an empty identifier.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: normalize_identifier(name)?,
            columns: BTreeMap::new(),
        })
    }

    /// Adds a column, replacing any column with the same name.
    #[must_use]
    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }
}

/// Schema of a dataset: named tables plus a version counter.
///
/// The internal bookkeeping tables are always present; [`Schema::with_table`]
/// adds user tables and bumps the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Normalized schema name.
    pub name: String,
    /// Monotonic version counter, bumped on every table change.
    pub version: u32,
    /// Tables keyed by name, internal bookkeeping tables included.
    pub tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    /// Creates a schema containing only the internal bookkeeping tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the name normalizes to an empty identifier.
    pub fn new(name: &str) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for internal in [LOADS_TABLE, VERSION_TABLE, STATE_TABLE] {
            tables.insert(internal.to_string(), TableSchema::new(internal)?);
        }
        Ok(Self {
            name: normalize_identifier(name)?,
            version: 1,
            tables,
        })
    }

    /// Adds a table and bumps the schema version.
    #[must_use]
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.insert(table.name.clone(), table);
        self.version += 1;
        self
    }

    /// Returns the table with the given name, if present.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Returns all table names in sorted order, internal tables included.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Computes the content hash identifying this exact schema document.
    ///
    /// The hash is stable under map-key ordering because tables and columns
    /// are kept in sorted maps and hashing uses canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be canonically serialized.
    pub fn version_hash(&self) -> Result<String> {
        Ok(content_hash(self)?)
    }
}

/// Stored form of a schema document, as written to the version catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSchemaInfo {
    /// Content hash of the schema document.
    pub version_hash: String,
    /// Schema name.
    pub schema_name: String,
    /// Schema version counter at write time.
    pub version: u32,
    /// Document format version.
    pub engine_version: u32,
    /// Write timestamp.
    pub inserted_at: DateTime<Utc>,
    /// Serialized schema body.
    pub schema: String,
}

impl StoredSchemaInfo {
    /// Builds the stored document for a schema, stamped with the current
    /// time.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be serialized.
    pub fn for_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            version_hash: schema.version_hash()?,
            schema_name: schema.name.clone(),
            version: schema.version,
            engine_version: ENGINE_VERSION,
            inserted_at: Utc::now(),
            schema: serde_json::to_string(schema)?,
        })
    }
}
