//! The buffered bulk inserter.

use crate::batch::batches;
use crate::events::{BatchEvent, CommitPhase, EventHub, ListenerId};
use crate::mapping::TableMapping;
use bulkcopy_core::{
    ArgumentError, BulkCopyResult, CopyOptions, DestinationSchema, InserterConfig, Record,
    TableName,
};
use bulkcopy_store::{BulkCopy, Connection, StagingTable};
use once_cell::unsync::OnceCell;
use std::fmt;

/// Buffered bulk inserter for records of type `T`.
///
/// Records are mapped onto the destination table's columns by name, staged
/// `buffer_size` rows at a time, and committed through the bulk-write handle
/// `B` in input order. The destination schema and the field-to-column
/// mapping are discovered on first use and then fixed for the inserter's
/// lifetime.
///
/// Every operation runs synchronously on the caller's thread and blocks until
/// the store has accepted or rejected the batch. Mutating operations take
/// `&mut self`; share an inserter across threads only behind a lock.
///
/// # Failure semantics
///
/// When a batch fails to commit, the error is returned unchanged (inside
/// [`BulkCopyError::Store`](bulkcopy_core::BulkCopyError::Store)) and:
/// - no post-commit notification fires for that batch,
/// - [`inserted_count`](Self::inserted_count) is not incremented,
/// - the uncommitted rows stay in the staging buffer (see
///   [`staged_rows`](Self::staged_rows)) until the next batch is staged,
/// - later batches of the same [`insert_all`](Self::insert_all) call are not
///   attempted,
/// - queued records stay queued, so [`flush`](Self::flush) can be retried.
pub struct BulkInserter<T, C, B> {
    connection: C,
    bulk_copy: B,
    config: InserterConfig,
    mapping: OnceCell<TableMapping<T>>,
    staging: Option<StagingTable>,
    queue: Vec<T>,
    events: EventHub<T>,
    inserted_count: u64,
    batches_committed: u64,
}

impl<T, C, B> BulkInserter<T, C, B>
where
    T: Record,
    C: Connection,
    B: BulkCopy,
{
    /// Create an inserter around a preconfigured bulk-write handle, with the
    /// default buffer size of 2000 rows.
    ///
    /// `connection` is used for schema discovery; rows are written through
    /// `bulk_copy` to its destination table.
    pub fn new(connection: C, bulk_copy: B) -> BulkCopyResult<Self> {
        Self::with_config(connection, bulk_copy, InserterConfig::default())
    }

    /// Like [`new`](Self::new) with an explicit configuration.
    ///
    /// `config.copy_options` is not used: the handle already carries its own.
    ///
    /// # Errors
    ///
    /// Returns an argument error for a zero `buffer_size`.
    pub fn with_config(connection: C, bulk_copy: B, config: InserterConfig) -> BulkCopyResult<Self> {
        check_buffer_size(config.buffer_size)?;
        Ok(Self {
            connection,
            bulk_copy,
            queue: Vec::with_capacity(config.buffer_size),
            config,
            mapping: OnceCell::new(),
            staging: None,
            events: EventHub::new(),
            inserted_count: 0,
            batches_committed: 0,
        })
    }

    // === Insertion ===

    /// Bulk insert every record of `records`, `buffer_size` at a time.
    ///
    /// The input may be any iterator, including an unbounded stream; it is
    /// pulled one batch at a time. On the first failing batch the error is
    /// returned and the rest of the input is left unread.
    pub fn insert_all<I>(&mut self, records: I) -> BulkCopyResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.ensure_mapping()?;
        for group in batches(records, self.config.buffer_size) {
            self.commit_group(&group)?;
        }
        Ok(())
    }

    /// Queue a single record. When the queue reaches `buffer_size` records
    /// it is flushed automatically.
    ///
    /// # Errors
    ///
    /// Returns the automatic flush's error; the record stays queued.
    pub fn insert(&mut self, record: T) -> BulkCopyResult<()> {
        self.queue.push(record);
        if self.queue.len() >= self.config.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Bulk insert the queued records.
    ///
    /// The queue is emptied only once its records are committed. If a commit
    /// fails, the uncommitted records remain queued in their original order.
    pub fn flush(&mut self) -> BulkCopyResult<()> {
        self.ensure_mapping()?;
        if self.queue.is_empty() {
            tracing::trace!(table = %self.bulk_copy.destination(), "Flush with empty queue");
            return Ok(());
        }

        // The queue only outgrows one batch when inserts continued after a
        // failed automatic flush.
        while !self.queue.is_empty() {
            let take = self.queue.len().min(self.config.buffer_size);
            let group: Vec<T> = self.queue.drain(..take).collect();
            if let Err(err) = self.commit_group(&group) {
                let rest = std::mem::replace(&mut self.queue, group);
                self.queue.extend(rest);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Flush the queue and consume the inserter, returning the final
    /// inserted count.
    ///
    /// On error the inserter, and any records still queued, are dropped.
    pub fn finish(mut self) -> BulkCopyResult<u64> {
        self.flush()?;
        Ok(self.inserted_count)
    }

    // === Counter ===

    /// Rows committed since creation or the last reset.
    pub fn inserted_count(&self) -> u64 {
        self.inserted_count
    }

    /// Set the inserted count to zero. The queue and staging buffer are
    /// not touched.
    pub fn reset_inserted_count(&mut self) {
        self.inserted_count = 0;
    }

    // === Events ===

    /// Register a listener called just before each batch is written.
    pub fn on_pre_commit<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BatchEvent<'_, T>) + Send + 'static,
    {
        self.events.subscribe(CommitPhase::PreCommit, listener)
    }

    /// Register a listener called just after each batch is committed.
    pub fn on_post_commit<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BatchEvent<'_, T>) + Send + 'static,
    {
        self.events.subscribe(CommitPhase::PostCommit, listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // === Inspection ===

    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    pub fn destination(&self) -> &TableName {
        self.bulk_copy.destination()
    }

    /// Options of the bulk-write handle. For a preconfigured handle these
    /// can differ from `config().copy_options`.
    pub fn copy_options(&self) -> CopyOptions {
        self.bulk_copy.options()
    }

    pub fn config(&self) -> &InserterConfig {
        &self.config
    }

    /// Records waiting in the queue.
    pub fn queued(&self) -> &[T] {
        &self.queue
    }

    /// Rows left in the staging buffer by a failed commit.
    ///
    /// Empty after every successful commit.
    pub fn staged_rows(&self) -> Option<&StagingTable> {
        self.staging.as_ref().filter(|s| !s.is_empty())
    }

    /// The destination schema, once it has been discovered.
    pub fn schema(&self) -> Option<&DestinationSchema> {
        self.mapping.get().map(|m| m.schema().as_ref())
    }

    /// Columns fed by record fields, once the schema has been discovered.
    pub fn mapped_columns(&self) -> Option<Vec<&str>> {
        self.mapping.get().map(TableMapping::mapped_columns)
    }

    /// Give back the connection and bulk-write handle.
    pub fn into_parts(self) -> (C, B) {
        (self.connection, self.bulk_copy)
    }

    // === Internals ===

    fn ensure_mapping(&mut self) -> BulkCopyResult<()> {
        mapping_for(
            &self.mapping,
            &mut self.connection,
            self.bulk_copy.destination(),
            &self.config,
        )?;
        Ok(())
    }

    /// Stage, announce, write and count one batch of at most `buffer_size`.
    fn commit_group(&mut self, group: &[T]) -> BulkCopyResult<()> {
        let mapping = mapping_for(
            &self.mapping,
            &mut self.connection,
            self.bulk_copy.destination(),
            &self.config,
        )?;
        let capacity = self.config.buffer_size;
        let staging = self
            .staging
            .get_or_insert_with(|| StagingTable::with_capacity(mapping.schema().clone(), capacity));

        if !staging.is_empty() {
            tracing::warn!(
                table = %self.bulk_copy.destination(),
                rows = staging.len(),
                "Discarding rows left staged by a failed commit"
            );
            staging.clear();
        }
        for record in group {
            mapping.stage(record, staging);
        }

        let sequence = self.batches_committed;
        self.events.emit(
            CommitPhase::PreCommit,
            &BatchEvent {
                destination: self.bulk_copy.destination(),
                sequence,
                records: group,
            },
        );

        if let Err(err) = self.bulk_copy.write_to_server(staging) {
            tracing::warn!(
                table = %self.bulk_copy.destination(),
                batch = sequence,
                rows = staging.len(),
                error = %err,
                "Bulk write failed"
            );
            return Err(err.into());
        }

        self.events.emit(
            CommitPhase::PostCommit,
            &BatchEvent {
                destination: self.bulk_copy.destination(),
                sequence,
                records: group,
            },
        );

        self.inserted_count += staging.len() as u64;
        self.batches_committed += 1;
        tracing::debug!(
            table = %self.bulk_copy.destination(),
            batch = sequence,
            rows = staging.len(),
            inserted = self.inserted_count,
            "Committed bulk insert batch"
        );
        staging.clear();
        Ok(())
    }
}

impl<T, C> BulkInserter<T, C, C::Copier>
where
    T: Record,
    C: Connection,
{
    /// Create an inserter for `table`, building the bulk-write handle on
    /// `connection` with default configuration and no transaction.
    pub fn for_table(connection: C, table: &str) -> BulkCopyResult<Self> {
        Self::for_table_with(connection, table, InserterConfig::default(), None)
    }

    /// Create an inserter for `table`, building the bulk-write handle on
    /// `connection` with `config.copy_options`, enlisted in `transaction`
    /// if one is given.
    ///
    /// # Errors
    ///
    /// Returns an argument error, before any I/O, when `table` is empty or
    /// malformed or `buffer_size` is zero.
    pub fn for_table_with(
        connection: C,
        table: &str,
        config: InserterConfig,
        transaction: Option<&C::Transaction>,
    ) -> BulkCopyResult<Self> {
        let destination = TableName::parse(table)?;
        check_buffer_size(config.buffer_size)?;
        let bulk_copy = connection.bulk_copy(destination, config.copy_options, transaction);
        Self::with_config(connection, bulk_copy, config)
    }
}

fn check_buffer_size(buffer_size: usize) -> Result<(), ArgumentError> {
    if buffer_size == 0 {
        return Err(ArgumentError::OutOfRange {
            parameter: "buffer_size".to_string(),
            value: buffer_size.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Resolve the mapping on first use. Takes fields separately so the caller
/// can keep using the rest of the inserter while holding the result.
fn mapping_for<'m, T, C>(
    cell: &'m OnceCell<TableMapping<T>>,
    connection: &mut C,
    destination: &TableName,
    config: &InserterConfig,
) -> BulkCopyResult<&'m TableMapping<T>>
where
    T: Record,
    C: Connection,
{
    cell.get_or_try_init(|| {
        TableMapping::resolve(connection, destination, config.dialect, config.name_matching)
    })
}

impl<T, C, B: BulkCopy> fmt::Debug for BulkInserter<T, C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkInserter")
            .field("destination", self.bulk_copy.destination())
            .field("buffer_size", &self.config.buffer_size)
            .field("copy_options", &self.bulk_copy.options())
            .field("queued", &self.queue.len())
            .field("inserted_count", &self.inserted_count)
            .field("schema_resolved", &self.mapping.get().is_some())
            .field("events", &self.events)
            .finish()
    }
}
