// ABOUTME: Engine-agnostic descriptors for tables, columns, indexes and row values
// ABOUTME: Shared model produced by inspectors and consumed by the code emitter

pub mod inspector;
pub mod typemap;

pub use inspector::{connect_inspector, Engine, ReadPlan, SchemaInspector};
pub use typemap::{map_native_type, normalize_default, NativeType, PortableType, Size};

use std::collections::BTreeMap;

/// Structure of a single table as seen by the dumper
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDescriptor>,
    /// Engine-level storage options (engine, charset, collation), passed through verbatim
    pub storage: BTreeMap<String, String>,
    pub comment: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            storage: BTreeMap::new(),
            comment: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Columns whose native type had no portable counterpart
    pub fn fallback_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns
            .iter()
            .filter(|c| c.portable == PortableType::FallbackText)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub native_type: String,
    pub portable: PortableType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    /// Build a column from its declared native type, resolving the portable tag
    pub fn from_native(name: impl Into<String>, native: &NativeType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            native_type: native.to_string(),
            portable: map_native_type(native),
            nullable,
            default: None,
            auto_increment: false,
            comment: None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.portable, PortableType::Blob { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

/// A scalar cell value read from the source database
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret a textual cell according to the column's portable type
    ///
    /// Drivers speaking a text protocol hand back every cell as a string;
    /// integers, floats and booleans are recovered here. Decimals stay textual
    /// so no precision is lost.
    pub fn from_text(text: String, portable: &PortableType) -> Value {
        match portable {
            PortableType::Int { .. } => {
                if let Ok(i) = text.parse::<i64>() {
                    Value::Int(i)
                } else if let Ok(u) = text.parse::<u64>() {
                    Value::UInt(u)
                } else {
                    Value::Text(text)
                }
            }
            PortableType::Float { .. } => match text.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Text(text),
            },
            PortableType::Boolean => match text.as_str() {
                "1" | "t" | "true" => Value::Bool(true),
                "0" | "f" | "false" => Value::Bool(false),
                _ => Value::Text(text),
            },
            PortableType::Blob { .. } => Value::Bytes(text.into_bytes()),
            _ => Value::Text(text),
        }
    }
}

/// A chunk of rows destined for a single insert statement
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate a row as (column, value) pairs in column order
    pub fn row(&self, index: usize) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.rows[index].iter())
    }
}
