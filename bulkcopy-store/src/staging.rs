//! Staging table: the schema-shaped row buffer handed to a bulk write.

use bulkcopy_core::{DestinationSchema, NameMatching, Value};
use std::sync::Arc;

/// Rows waiting to be written, shaped like the destination table.
///
/// Every row has exactly one cell per schema column, in schema order. Rows
/// start at the columns' fresh values (default or null). Clearing removes
/// rows and keeps the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingTable {
    schema: Arc<DestinationSchema>,
    rows: Vec<Vec<Value>>,
}

impl StagingTable {
    pub fn new(schema: Arc<DestinationSchema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(schema: Arc<DestinationSchema>, capacity: usize) -> Self {
        Self {
            schema,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn schema(&self) -> &DestinationSchema {
        &self.schema
    }

    /// Append a fresh row and return its cells for population.
    pub fn add_row(&mut self) -> &mut [Value] {
        let row = self.schema.fresh_row();
        self.rows.push(row);
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Cell at `row` in the column named `column` (exact match).
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.schema.position(column, NameMatching::Exact)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove every row; the schema is retained.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
