//! bulkcopy Inserter - Buffered Bulk Insertion of Typed Records
//!
//! [`BulkInserter`] takes records of any [`Record`] type, maps their fields
//! onto the columns of a destination table by name, and commits them in
//! fixed-size batches through a store's bulk-write protocol.
//!
//! ```text
//! insert_all(records) ──► Batches ──┐
//!                                   ├─► stage rows ─► PreCommit ─► write ─► PostCommit ─► count ─► clear
//! insert(record) ─► queue ─► flush ─┘
//! ```
//!
//! # Example
//!
//! ```
//! use bulkcopy_core::{impl_record, ColumnDescriptor, StoreType};
//! use bulkcopy_inserter::BulkInserter;
//! use bulkcopy_store::MemoryStore;
//!
//! struct Reading {
//!     sensor: String,
//!     celsius: f64,
//! }
//!
//! impl_record!(Reading { sensor, celsius });
//!
//! let store = MemoryStore::new();
//! let table = store
//!     .create_table(
//!         "readings",
//!         vec![
//!             ColumnDescriptor::new("sensor", StoreType::Text).not_null(),
//!             ColumnDescriptor::new("celsius", StoreType::Double),
//!         ],
//!     )
//!     .unwrap();
//!
//! let mut inserter: BulkInserter<Reading, _, _> =
//!     BulkInserter::for_table(store.connect(), "readings").unwrap();
//! inserter
//!     .insert_all((0..5).map(|i| Reading { sensor: format!("s{i}"), celsius: 20.5 }))
//!     .unwrap();
//!
//! assert_eq!(inserter.inserted_count(), 5);
//! assert_eq!(store.row_count(&table).unwrap(), 5);
//! ```
//!
//! [`Record`]: bulkcopy_core::Record

pub mod batch;
pub mod events;
pub mod inserter;
pub mod mapping;

pub use batch::{batches, Batches};
pub use events::{BatchEvent, CommitPhase, EventHub, ListenerId};
pub use inserter::BulkInserter;
pub use mapping::{resolve_schema, TableMapping};

// Re-export the types every caller needs alongside the inserter
pub use bulkcopy_core::{
    impl_record, BulkCopyError, BulkCopyResult, CopyOptions, InserterConfig, NameMatching,
    Record, ToValue, Value,
};
pub use bulkcopy_store::{BulkCopy, Connection, StagingTable};
