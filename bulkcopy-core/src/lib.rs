//! bulkcopy Core - Values, Schemas and Record Mappings
//!
//! Pure data types shared by every other bulkcopy crate:
//! - `Value` / `ToValue`: the cell values staged for a bulk write
//! - `DestinationSchema` / `ColumnDescriptor`: the shape of a destination table
//! - `TableName` / `Dialect`: destination identifiers and how they are quoted
//! - `FieldMap` / `Record`: declared field accessors on record types
//! - `InserterConfig` / `CopyOptions`: inserter configuration
//! - `BulkCopyError`: the master error type
//!
//! This crate performs no I/O.

pub mod config;
pub mod error;
pub mod identifier;
pub mod options;
pub mod record;
pub mod schema;
pub mod value;

pub use config::{InserterConfig, DEFAULT_BUFFER_SIZE};
pub use error::{
    ArgumentError, BulkCopyError, BulkCopyResult, ConfigError, StoreError, StoreResult,
};
pub use identifier::{Dialect, TableName};
pub use options::CopyOptions;
pub use record::{Accessor, FieldMap, NameMatching, Record};
pub use schema::{ColumnDescriptor, DestinationSchema, StoreType};
pub use value::{ToValue, Value};
