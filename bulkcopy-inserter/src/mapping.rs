//! Schema discovery and field-to-column binding.

use bulkcopy_core::{
    Accessor, BulkCopyResult, DestinationSchema, Dialect, FieldMap, NameMatching, Record,
    TableName,
};
use bulkcopy_store::{Connection, StagingTable};
use std::fmt;
use std::sync::Arc;

/// Run the zero-row shape query for `destination` and build its schema.
///
/// Store errors are returned unchanged.
pub fn resolve_schema<C: Connection>(
    connection: &mut C,
    destination: &TableName,
    dialect: Dialect,
) -> BulkCopyResult<DestinationSchema> {
    let sql = dialect.shape_query(destination);
    let columns = connection.query_shape(&sql)?;
    Ok(DestinationSchema::new(columns))
}

/// A destination column fed by a record field.
struct ColumnBinding<T> {
    column: usize,
    accessor: Accessor<T>,
}

/// Destination schema plus the record fields bound to its columns.
///
/// Built once per inserter and never changed afterwards.
pub struct TableMapping<T> {
    schema: Arc<DestinationSchema>,
    bindings: Vec<ColumnBinding<T>>,
}

impl<T> TableMapping<T> {
    /// Bind every column whose name matches a field of `fields`.
    ///
    /// Columns without a field and fields without a column are skipped.
    pub fn bind(schema: DestinationSchema, fields: &FieldMap<T>, matching: NameMatching) -> Self {
        let bindings = schema
            .columns()
            .iter()
            .enumerate()
            .filter_map(|(column, descriptor)| {
                fields
                    .get(&descriptor.name, matching)
                    .map(|accessor| ColumnBinding {
                        column,
                        accessor: Arc::clone(accessor),
                    })
            })
            .collect();
        Self {
            schema: Arc::new(schema),
            bindings,
        }
    }

    pub fn schema(&self) -> &Arc<DestinationSchema> {
        &self.schema
    }

    /// Names of the bound columns, in schema order.
    pub fn mapped_columns(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .filter_map(|b| self.schema.column(b.column))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Append one row for `record` to `staging`.
    ///
    /// Bound columns take the accessor's value (`Value::Null` for absent
    /// values); unbound columns keep their fresh-row value.
    pub fn stage(&self, record: &T, staging: &mut StagingTable) {
        let row = staging.add_row();
        for binding in &self.bindings {
            row[binding.column] = (binding.accessor)(record);
        }
    }
}

impl<T: Record> TableMapping<T> {
    /// Discover the destination schema and bind `T`'s fields to it.
    pub fn resolve<C: Connection>(
        connection: &mut C,
        destination: &TableName,
        dialect: Dialect,
        matching: NameMatching,
    ) -> BulkCopyResult<Self> {
        let schema = resolve_schema(connection, destination, dialect)?;
        let mapping = Self::bind(schema, &T::field_map(), matching);
        tracing::info!(
            table = %destination,
            columns = mapping.schema.len(),
            mapped_columns = mapping.bindings.len(),
            "Resolved destination schema"
        );
        Ok(mapping)
    }
}

impl<T> fmt::Debug for TableMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapping")
            .field("schema", &self.schema)
            .field("mapped_columns", &self.mapped_columns())
            .finish()
    }
}
