//! Destination table shape.

use crate::record::NameMatching;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Column type as reported by the store's shape query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Text,
    Binary,
    Uuid,
    Timestamp,
    Json,
}

impl StoreType {
    /// Whether a non-null value can be written to a column of this type.
    ///
    /// Integer columns check the value's range; floating point columns also
    /// accept integers. `Null` is accepted here; nullability is a column
    /// property, checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (StoreType::Boolean, Value::Bool(_)) => true,
            (StoreType::SmallInt, Value::Int(v)) => i16::try_from(*v).is_ok(),
            (StoreType::Integer, Value::Int(v)) => i32::try_from(*v).is_ok(),
            (StoreType::BigInt, Value::Int(_)) => true,
            (StoreType::Real | StoreType::Double, Value::Float(_) | Value::Int(_)) => true,
            (StoreType::Text, Value::Text(_)) => true,
            (StoreType::Binary, Value::Bytes(_)) => true,
            (StoreType::Uuid, Value::Uuid(_)) => true,
            (StoreType::Timestamp, Value::Timestamp(_)) => true,
            (StoreType::Json, Value::Json(_)) => true,
            _ => false,
        }
    }
}

/// One column of a destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub store_type: StoreType,
    pub nullable: bool,
    /// Value a freshly added staging row starts with. `None` means null.
    pub default: Option<Value>,
}

impl ColumnDescriptor {
    /// A nullable column without a default.
    pub fn new(name: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            name: name.into(),
            store_type,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Initial value of this column in a fresh staging row.
    pub fn fresh_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}

/// Ordered column set of a destination table.
///
/// Column order is the order the shape query reported, and is the order
/// cells appear in every staged row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DestinationSchema {
    columns: Vec<ColumnDescriptor>,
}

impl DestinationSchema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the first column whose name matches under `matching`.
    pub fn position(&self, name: &str, matching: NameMatching) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| matching.matches(&c.name, name))
    }

    /// A new row with every column at its fresh value.
    pub fn fresh_row(&self) -> Vec<Value> {
        self.columns.iter().map(ColumnDescriptor::fresh_value).collect()
    }
}
