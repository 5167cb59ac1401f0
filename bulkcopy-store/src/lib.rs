//! bulkcopy Store - Store Traits and In-Memory Implementation
//!
//! Defines the seam between the inserter and a relational data store:
//! - [`Connection`]: an open connection that can answer a zero-row shape
//!   query and hand out bulk-write handles
//! - [`BulkCopy`]: a bulk-write handle bound to one destination table
//! - [`StagingTable`]: the row buffer a bulk write consumes
//!
//! Network transport, the wire-level bulk-copy protocol and SQL execution
//! belong to the store client behind these traits. [`MemoryStore`] is an
//! in-memory implementation for tests and examples.

pub mod memory;
pub mod staging;

pub use memory::{MemoryBulkCopy, MemoryConnection, MemoryStore, MemoryTransaction, WriteRecord};
pub use staging::StagingTable;

use bulkcopy_core::{ColumnDescriptor, CopyOptions, StoreResult, TableName};

// ============================================================================
// STORE TRAITS
// ============================================================================

/// An open connection to a relational store.
pub trait Connection {
    /// Enclosing transaction a bulk write can join.
    type Transaction;

    /// Bulk-write handle produced by [`Connection::bulk_copy`].
    type Copier: BulkCopy;

    /// Run a query that returns no rows and report the columns of its
    /// result set, in order.
    fn query_shape(&mut self, sql: &str) -> StoreResult<Vec<ColumnDescriptor>>;

    /// Build a bulk-write handle for `destination` on this connection.
    fn bulk_copy(
        &self,
        destination: TableName,
        options: CopyOptions,
        transaction: Option<&Self::Transaction>,
    ) -> Self::Copier;
}

/// A bulk-write handle bound to one destination table.
pub trait BulkCopy {
    /// The table rows are written to.
    fn destination(&self) -> &TableName;

    /// Options this handle was built with.
    fn options(&self) -> CopyOptions {
        CopyOptions::empty()
    }

    /// Write every row of `rows` to the destination table.
    ///
    /// Returns only once the store has accepted the rows. Any failure is
    /// returned as-is; implementations do not retry.
    fn write_to_server(&mut self, rows: &StagingTable) -> StoreResult<()>;
}

impl<B: BulkCopy + ?Sized> BulkCopy for Box<B> {
    fn destination(&self) -> &TableName {
        (**self).destination()
    }

    fn options(&self) -> CopyOptions {
        (**self).options()
    }

    fn write_to_server(&mut self, rows: &StagingTable) -> StoreResult<()> {
        (**self).write_to_server(rows)
    }
}
