//! In-memory store.
//!
//! A small relational store that speaks just enough of the two store traits
//! to back tests: it answers the zero-row shape query for both dialects,
//! validates and appends bulk-written rows, supports enclosing transactions,
//! and can be told to fail upcoming queries or writes.

use crate::staging::StagingTable;
use crate::{BulkCopy, Connection};
use bulkcopy_core::{
    BulkCopyResult, ColumnDescriptor, CopyOptions, DestinationSchema, StoreError, StoreResult,
    TableName, Value,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One accepted bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub table: TableName,
    pub rows: usize,
    pub options: CopyOptions,
    pub transaction: Option<u64>,
}

#[derive(Debug)]
struct MemoryTable {
    schema: DestinationSchema,
    rows: Vec<Vec<Value>>,
}

type PendingWrite = (TableName, Vec<Vec<Value>>);

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<TableName, MemoryTable>,
    // Open transactions and the writes they are holding back.
    transactions: HashMap<u64, Vec<PendingWrite>>,
    next_transaction_id: u64,
    queries: Vec<String>,
    writes: Vec<WriteRecord>,
    write_attempts: usize,
    query_failures: VecDeque<StoreError>,
    // Keyed by zero-based write attempt.
    write_failures: BTreeMap<usize, StoreError>,
}

/// In-memory relational store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Create (or replace) a table and return its parsed name.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> BulkCopyResult<TableName> {
        let name = TableName::parse(name)?;
        let mut state = self.lock()?;
        state.tables.insert(
            name.clone(),
            MemoryTable {
                schema: DestinationSchema::new(columns),
                rows: Vec::new(),
            },
        );
        Ok(name)
    }

    /// Drop a table. Returns false if it did not exist.
    pub fn drop_table(&self, table: &TableName) -> StoreResult<bool> {
        Ok(self.lock()?.tables.remove(table).is_some())
    }

    /// Open a connection to this store.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            store: self.clone(),
        }
    }

    /// Begin a transaction. Writes made under it become visible on commit.
    pub fn begin(&self) -> StoreResult<MemoryTransaction> {
        let mut state = self.lock()?;
        state.next_transaction_id += 1;
        let id = state.next_transaction_id;
        state.transactions.insert(id, Vec::new());
        Ok(MemoryTransaction {
            id,
            store: self.clone(),
        })
    }

    /// Committed rows of `table`, in insertion order.
    pub fn rows(&self, table: &TableName) -> StoreResult<Vec<Vec<Value>>> {
        let state = self.lock()?;
        state
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| not_found(table))
    }

    pub fn row_count(&self, table: &TableName) -> StoreResult<usize> {
        let state = self.lock()?;
        state
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| not_found(table))
    }

    /// Every shape query received, in order.
    pub fn queries(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.queries.clone())
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> StoreResult<Vec<WriteRecord>> {
        Ok(self.lock()?.writes.clone())
    }

    /// Number of write attempts, accepted or not.
    pub fn write_attempts(&self) -> StoreResult<usize> {
        Ok(self.lock()?.write_attempts)
    }

    /// Make the next shape query fail with `error`.
    pub fn fail_next_query(&self, error: StoreError) -> StoreResult<()> {
        self.lock()?.query_failures.push_back(error);
        Ok(())
    }

    /// Make the next write attempt fail with `error`.
    pub fn fail_next_write(&self, error: StoreError) -> StoreResult<()> {
        let mut state = self.lock()?;
        let attempt = state.write_attempts;
        state.write_failures.insert(attempt, error);
        Ok(())
    }

    /// Make the write attempt with zero-based index `attempt` fail with `error`.
    pub fn fail_write_at(&self, attempt: usize, error: StoreError) -> StoreResult<()> {
        self.lock()?.write_failures.insert(attempt, error);
        Ok(())
    }
}

fn not_found(table: &TableName) -> StoreError {
    StoreError::TableNotFound {
        table: table.to_string(),
    }
}

/// Extract the table from `SELECT TOP 0 * FROM t` or `SELECT * FROM t WHERE 1 = 0`.
fn shape_query_table(sql: &str) -> StoreResult<TableName> {
    let syntax = |reason: &str| StoreError::Other {
        reason: format!("unsupported shape query {sql:?}: {reason}"),
    };

    let upper = sql.to_ascii_uppercase();
    let start = upper.find(" FROM ").ok_or_else(|| syntax("missing FROM"))? + " FROM ".len();
    let mut end = sql.len();
    let tail = upper.trim_end();
    if tail.ends_with(" WHERE 1 = 0") {
        end = tail.len() - " WHERE 1 = 0".len();
    } else if !upper.starts_with("SELECT TOP 0 ") {
        return Err(syntax("query may return rows"));
    }

    TableName::parse(sql[start..end].trim()).map_err(|e| syntax(&e.to_string()))
}

/// Validate staged rows against a table and produce the cells to store.
fn prepare_rows(
    table: &TableName,
    schema: &DestinationSchema,
    staged: &StagingTable,
    options: CopyOptions,
) -> StoreResult<Vec<Vec<Value>>> {
    let shape_matches = staged.schema().len() == schema.len()
        && staged
            .schema()
            .columns()
            .iter()
            .zip(schema.columns())
            .all(|(a, b)| a.name == b.name);
    if !shape_matches {
        return Err(StoreError::Other {
            reason: format!("staged columns do not match {table}"),
        });
    }

    let mut prepared = Vec::with_capacity(staged.len());
    for row in staged.rows() {
        let mut cells = Vec::with_capacity(row.len());
        for (column, value) in schema.columns().iter().zip(row) {
            let mut value = value.clone();
            if value.is_null() && !options.contains(CopyOptions::KEEP_NULLS) {
                if let Some(default) = &column.default {
                    value = default.clone();
                }
            }
            if value.is_null() && !column.nullable {
                return Err(StoreError::ConstraintViolation {
                    table: table.to_string(),
                    column: column.name.clone(),
                    reason: "cannot insert null into a non-nullable column".to_string(),
                });
            }
            if !column.store_type.accepts(&value) {
                return Err(StoreError::TypeMismatch {
                    table: table.to_string(),
                    column: column.name.clone(),
                    expected: column.store_type,
                    got: value.kind().to_string(),
                });
            }
            cells.push(value);
        }
        prepared.push(cells);
    }
    Ok(prepared)
}

// ============================================================================
// CONNECTION / BULK COPY / TRANSACTION
// ============================================================================

/// Connection handle to a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: MemoryStore,
}

impl MemoryConnection {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Connection for MemoryConnection {
    type Transaction = MemoryTransaction;
    type Copier = MemoryBulkCopy;

    fn query_shape(&mut self, sql: &str) -> StoreResult<Vec<ColumnDescriptor>> {
        let mut state = self.store.lock()?;
        state.queries.push(sql.to_string());
        if let Some(err) = state.query_failures.pop_front() {
            return Err(err);
        }
        let table = shape_query_table(sql)?;
        state
            .tables
            .get(&table)
            .map(|t| t.schema.columns().to_vec())
            .ok_or_else(|| not_found(&table))
    }

    fn bulk_copy(
        &self,
        destination: TableName,
        options: CopyOptions,
        transaction: Option<&MemoryTransaction>,
    ) -> MemoryBulkCopy {
        MemoryBulkCopy {
            store: self.store.clone(),
            destination,
            options,
            transaction: transaction.map(MemoryTransaction::id),
        }
    }
}

/// Bulk-write handle into a [`MemoryStore`] table.
#[derive(Debug, Clone)]
pub struct MemoryBulkCopy {
    store: MemoryStore,
    destination: TableName,
    options: CopyOptions,
    transaction: Option<u64>,
}

impl BulkCopy for MemoryBulkCopy {
    fn destination(&self) -> &TableName {
        &self.destination
    }

    fn options(&self) -> CopyOptions {
        self.options
    }

    fn write_to_server(&mut self, rows: &StagingTable) -> StoreResult<()> {
        let mut guard = self.store.lock()?;
        let state = &mut *guard;

        let attempt = state.write_attempts;
        state.write_attempts += 1;
        if let Some(err) = state.write_failures.remove(&attempt) {
            return Err(err);
        }

        if let Some(id) = self.transaction {
            if !state.transactions.contains_key(&id) {
                return Err(StoreError::TransactionClosed { transaction_id: id });
            }
        }

        let table = state
            .tables
            .get_mut(&self.destination)
            .ok_or_else(|| not_found(&self.destination))?;
        let prepared = prepare_rows(&self.destination, &table.schema, rows, self.options)?;
        let count = prepared.len();

        match self.transaction {
            Some(id) => {
                if let Some(pending) = state.transactions.get_mut(&id) {
                    pending.push((self.destination.clone(), prepared));
                }
            }
            None => table.rows.extend(prepared),
        }

        state.writes.push(WriteRecord {
            table: self.destination.clone(),
            rows: count,
            options: self.options,
            transaction: self.transaction,
        });
        tracing::trace!(table = %self.destination, rows = count, "Memory store accepted bulk write");
        Ok(())
    }
}

/// Transaction on a [`MemoryStore`]. Clones refer to the same transaction.
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    id: u64,
    store: MemoryStore,
}

impl MemoryTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Apply every write made under this transaction.
    ///
    /// All or nothing: if a target table no longer exists, nothing is
    /// applied and the transaction stays open.
    pub fn commit(&self) -> StoreResult<()> {
        let mut guard = self.store.lock()?;
        let state = &mut *guard;
        let closed = StoreError::TransactionClosed {
            transaction_id: self.id,
        };
        let pending = state.transactions.get(&self.id).ok_or(closed.clone())?;
        if let Some((missing, _)) = pending
            .iter()
            .find(|(table, _)| !state.tables.contains_key(table))
        {
            return Err(not_found(missing));
        }

        let pending = state.transactions.remove(&self.id).ok_or(closed)?;
        for (table, rows) in pending {
            if let Some(target) = state.tables.get_mut(&table) {
                target.rows.extend(rows);
            }
        }
        Ok(())
    }

    /// Discard every write made under this transaction.
    pub fn rollback(&self) -> StoreResult<()> {
        let mut state = self.store.lock()?;
        state
            .transactions
            .remove(&self.id)
            .map(|_| ())
            .ok_or(StoreError::TransactionClosed {
                transaction_id: self.id,
            })
    }
}
