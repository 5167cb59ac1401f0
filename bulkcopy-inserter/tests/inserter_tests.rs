//! Behaviour tests for BulkInserter against the in-memory store.
//!
//! Covers batching, ordering, notifications, the insert queue, the inserted
//! count, schema discovery and failure handling.

use bulkcopy_core::{
    ArgumentError, BulkCopyError, ColumnDescriptor, CopyOptions, Dialect, InserterConfig,
    NameMatching, StoreError, StoreType, TableName, Value,
};
use bulkcopy_inserter::{BulkInserter, CommitPhase};
use bulkcopy_store::{Connection, MemoryBulkCopy, MemoryConnection, MemoryStore};
use bulkcopy_test_utils::assertions::{assert_batch_sizes, assert_table_rows};
use bulkcopy_test_utils::fixtures::{expected_row, order, orders, orders_store, Order, ORDERS_TABLE};
use std::sync::{Arc, Mutex};

type OrderInserter = BulkInserter<Order, MemoryConnection, MemoryBulkCopy>;

// ============================================================================
// HELPERS
// ============================================================================

fn inserter(store: &MemoryStore, buffer_size: usize) -> OrderInserter {
    BulkInserter::for_table_with(
        store.connect(),
        ORDERS_TABLE,
        InserterConfig::default().with_buffer_size(buffer_size),
        None,
    )
    .expect("valid inserter arguments")
}

/// (phase, batch sequence, order ids) for every notification received.
type EventLog = Arc<Mutex<Vec<(CommitPhase, u64, Vec<i32>)>>>;

fn record_events(inserter: &mut OrderInserter) -> EventLog {
    let log: EventLog = Arc::default();
    let pre = Arc::clone(&log);
    inserter.on_pre_commit(move |e| {
        let ids = e.records.iter().map(|o| o.id).collect();
        pre.lock().unwrap().push((CommitPhase::PreCommit, e.sequence, ids));
    });
    let post = Arc::clone(&log);
    inserter.on_post_commit(move |e| {
        let ids = e.records.iter().map(|o| o.id).collect();
        post.lock().unwrap().push((CommitPhase::PostCommit, e.sequence, ids));
    });
    log
}

fn events(log: &EventLog) -> Vec<(CommitPhase, u64, Vec<i32>)> {
    log.lock().unwrap().clone()
}

fn write_sizes(store: &MemoryStore) -> Vec<usize> {
    store.writes().unwrap().iter().map(|w| w.rows).collect()
}

use CommitPhase::{PostCommit as Post, PreCommit as Pre};

// ============================================================================
// BULK INSERT
// ============================================================================

#[test]
fn test_five_records_buffer_two_commits_three_groups_in_order() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 2);
    let log = record_events(&mut inserter);

    let input = orders(5);
    inserter.insert_all(input.clone()).unwrap();

    assert_eq!(write_sizes(&store), vec![2, 2, 1]);
    assert_eq!(
        events(&log),
        vec![
            (Pre, 0, vec![0, 1]),
            (Post, 0, vec![0, 1]),
            (Pre, 1, vec![2, 3]),
            (Post, 1, vec![2, 3]),
            (Pre, 2, vec![4]),
            (Post, 2, vec![4]),
        ]
    );
    assert_eq!(inserter.inserted_count(), 5);
    let expected: Vec<Vec<Value>> = input.iter().map(expected_row).collect();
    assert_table_rows(&store, &table, &expected);
    assert!(inserter.staged_rows().is_none());
}

#[test]
fn test_failed_second_group_stops_at_two() {
    let (store, table) = orders_store();
    store
        .fail_write_at(1, StoreError::Timeout { elapsed_ms: 30_000 })
        .unwrap();
    let mut inserter = inserter(&store, 2);
    let log = record_events(&mut inserter);

    let err = inserter.insert_all(orders(5)).unwrap_err();

    assert_eq!(err, BulkCopyError::Store(StoreError::Timeout { elapsed_ms: 30_000 }));
    assert_eq!(inserter.inserted_count(), 2);
    assert_eq!(
        events(&log),
        vec![(Pre, 0, vec![0, 1]), (Post, 0, vec![0, 1]), (Pre, 1, vec![2, 3])]
    );
    // Group [4] was never attempted.
    assert_eq!(store.write_attempts().unwrap(), 2);
    assert_eq!(store.row_count(&table).unwrap(), 2);

    let staged = inserter.staged_rows().expect("failed group stays staged");
    assert_eq!(staged.len(), 2);
    assert_eq!(staged.get(0, "id"), Some(&Value::Int(2)));
    assert_eq!(staged.get(1, "id"), Some(&Value::Int(3)));
}

#[test]
fn test_next_group_after_failure_discards_stale_rows() {
    let (store, table) = orders_store();
    store
        .fail_next_write(StoreError::Connectivity {
            reason: "reset by peer".to_string(),
        })
        .unwrap();
    let mut inserter = inserter(&store, 3);

    assert!(inserter.insert_all(orders(3)).is_err());
    assert_eq!(inserter.staged_rows().map(|s| s.len()), Some(3));

    inserter.insert_all(orders(3)).unwrap();
    assert_eq!(write_sizes(&store), vec![3]);
    assert_eq!(store.row_count(&table).unwrap(), 3);
    assert_eq!(inserter.inserted_count(), 3);
}

#[test]
fn test_empty_input_commits_nothing_but_resolves_schema() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 4);
    let log = record_events(&mut inserter);

    inserter.insert_all(Vec::new()).unwrap();

    assert!(store.writes().unwrap().is_empty());
    assert!(events(&log).is_empty());
    assert_eq!(inserter.inserted_count(), 0);
    assert_eq!(store.queries().unwrap().len(), 1);
    assert!(inserter.schema().is_some());
}

#[test]
fn test_streaming_input_stops_at_failure() {
    let (store, _) = orders_store();
    store
        .fail_write_at(2, StoreError::Other {
            reason: "disk full".to_string(),
        })
        .unwrap();
    let mut inserter = inserter(&store, 10);

    // Unbounded input: only the batches up to the failing one are pulled.
    let result = inserter.insert_all((0..).map(order));

    assert!(result.is_err());
    assert_eq!(inserter.inserted_count(), 20);
    assert_eq!(store.write_attempts().unwrap(), 3);
}

#[test]
fn test_unmapped_columns_keep_defaults_and_nulls_stay_null() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 10);
    inserter.insert_all(vec![order(3)]).unwrap();

    let rows = store.rows(&table).unwrap();
    // note is None for order 3
    assert_eq!(rows[0][3], Value::Null);
    // status and batch_ref have no matching field
    assert_eq!(rows[0][5], Value::Text("pending".to_string()));
    assert_eq!(rows[0][6], Value::Null);
    assert_eq!(
        inserter.mapped_columns().unwrap(),
        vec!["id", "customer", "total", "note", "placed_at"]
    );
}

// ============================================================================
// QUEUE
// ============================================================================

#[test]
fn test_queue_auto_flushes_at_capacity() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 3);
    let log = record_events(&mut inserter);

    inserter.insert(order(0)).unwrap();
    inserter.insert(order(1)).unwrap();
    assert!(store.writes().unwrap().is_empty());
    assert_eq!(inserter.queued().len(), 2);

    inserter.insert(order(2)).unwrap();
    assert_eq!(write_sizes(&store), vec![3]);
    assert!(inserter.queued().is_empty());
    assert_eq!(events(&log), vec![(Pre, 0, vec![0, 1, 2]), (Post, 0, vec![0, 1, 2])]);
}

#[test]
fn test_manual_flush_commits_partial_group() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 5);

    inserter.insert(order(0)).unwrap();
    inserter.insert(order(1)).unwrap();
    inserter.flush().unwrap();

    assert_eq!(write_sizes(&store), vec![2]);
    assert!(inserter.queued().is_empty());
    assert_eq!(inserter.inserted_count(), 2);
}

#[test]
fn test_flush_empty_queue_commits_nothing() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 5);
    let log = record_events(&mut inserter);

    inserter.flush().unwrap();

    assert!(store.writes().unwrap().is_empty());
    assert!(events(&log).is_empty());
}

#[test]
fn test_failed_flush_keeps_queue_for_retry() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 5);
    for n in 0..3 {
        inserter.insert(order(n)).unwrap();
    }
    store
        .fail_next_write(StoreError::PermissionDenied {
            table: ORDERS_TABLE.to_string(),
            reason: "INSERT denied".to_string(),
        })
        .unwrap();

    let err = inserter.flush().unwrap_err();
    assert!(matches!(
        err,
        BulkCopyError::Store(StoreError::PermissionDenied { .. })
    ));
    assert_eq!(
        inserter.queued().iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(inserter.inserted_count(), 0);

    inserter.flush().unwrap();
    assert!(inserter.queued().is_empty());
    assert_eq!(inserter.inserted_count(), 3);
    assert_eq!(store.row_count(&table).unwrap(), 3);
}

#[test]
fn test_inserts_after_failed_auto_flush_never_overfill_a_batch() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 2);
    store
        .fail_next_write(StoreError::Timeout { elapsed_ms: 100 })
        .unwrap();

    inserter.insert(order(0)).unwrap();
    assert!(inserter.insert(order(1)).is_err());
    assert_eq!(inserter.queued().len(), 2);

    // The queue is over capacity now; the next flush commits it in order,
    // one buffer at a time.
    inserter.insert(order(2)).unwrap();
    assert_eq!(write_sizes(&store), vec![2, 1]);
    assert!(inserter.queued().is_empty());
    assert_eq!(inserter.inserted_count(), 3);
    let expected: Vec<Vec<Value>> = orders(3).iter().map(expected_row).collect();
    assert_table_rows(&store, &table, &expected);
}

#[test]
fn test_finish_flushes_and_returns_count() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 10);
    inserter.insert_all(orders(4)).unwrap();
    inserter.insert(order(4)).unwrap();

    assert_eq!(inserter.finish().unwrap(), 5);
    assert_eq!(store.row_count(&table).unwrap(), 5);
}

// ============================================================================
// COUNTER
// ============================================================================

#[test]
fn test_reset_inserted_count() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 2);
    inserter.insert_all(orders(4)).unwrap();
    inserter.insert(order(9)).unwrap();
    assert_eq!(inserter.inserted_count(), 4);

    inserter.reset_inserted_count();
    assert_eq!(inserter.inserted_count(), 0);
    assert_eq!(inserter.queued().len(), 1);

    inserter.flush().unwrap();
    assert_eq!(inserter.inserted_count(), 1);
}

// ============================================================================
// EVENTS
// ============================================================================

#[test]
fn test_removed_listener_is_not_called() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 2);
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let id = inserter.on_pre_commit(move |_| *counter.lock().unwrap() += 1);

    inserter.insert_all(orders(2)).unwrap();
    assert!(inserter.remove_listener(id));
    inserter.insert_all(orders(2)).unwrap();

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn test_event_carries_destination() {
    let (store, table) = orders_store();
    let mut inserter = inserter(&store, 2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    inserter.on_post_commit(move |e| sink.lock().unwrap().push(e.destination.clone()));

    inserter.insert_all(orders(1)).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![table]);
}

// ============================================================================
// SCHEMA DISCOVERY
// ============================================================================

#[test]
fn test_schema_is_discovered_once() {
    let (store, _) = orders_store();
    let mut inserter = inserter(&store, 2);
    inserter.insert_all(orders(3)).unwrap();
    inserter.insert(order(3)).unwrap();
    inserter.flush().unwrap();
    inserter.insert_all(orders(2)).unwrap();

    assert_eq!(
        store.queries().unwrap(),
        vec!["SELECT TOP 0 * FROM [dbo].[Orders]".to_string()]
    );
}

#[test]
fn test_missing_table_error_propagates_and_is_not_cached() {
    let store = MemoryStore::new();
    let mut inserter = inserter(&store, 2);

    let err = inserter.insert_all(orders(2)).unwrap_err();
    assert_eq!(
        err,
        BulkCopyError::Store(StoreError::TableNotFound {
            table: ORDERS_TABLE.to_string()
        })
    );
    assert!(store.writes().unwrap().is_empty());
    assert!(inserter.schema().is_none());

    store
        .create_table(ORDERS_TABLE, bulkcopy_test_utils::fixtures::order_columns())
        .unwrap();
    inserter.insert_all(orders(2)).unwrap();
    assert_eq!(inserter.inserted_count(), 2);
}

#[test]
fn test_ansi_dialect_shape_query() {
    let (store, _) = orders_store();
    let mut inserter: OrderInserter = BulkInserter::for_table_with(
        store.connect(),
        ORDERS_TABLE,
        InserterConfig::default().with_dialect(Dialect::Ansi),
        None,
    )
    .unwrap();
    inserter.insert_all(orders(1)).unwrap();

    assert_eq!(
        store.queries().unwrap(),
        vec!["SELECT * FROM \"dbo\".\"Orders\" WHERE 1 = 0".to_string()]
    );
}

#[test]
fn test_table_name_with_special_characters() {
    let store = MemoryStore::new();
    let raw = "[Sales].[Order Lines; DROP TABLE x]]--]";
    let table = store
        .create_table(raw, bulkcopy_test_utils::fixtures::order_columns())
        .unwrap();
    let mut inserter: OrderInserter = BulkInserter::for_table(store.connect(), raw).unwrap();

    inserter.insert_all(orders(2)).unwrap();

    assert_eq!(table.parts(), ["Sales", "Order Lines; DROP TABLE x]--"]);
    assert_eq!(store.row_count(&table).unwrap(), 2);
    assert_eq!(
        store.queries().unwrap(),
        vec!["SELECT TOP 0 * FROM [Sales].[Order Lines; DROP TABLE x]]--]".to_string()]
    );
}

#[test]
fn test_name_matching_policy() {
    let store = MemoryStore::new();
    let columns = vec![
        ColumnDescriptor::new("ID", StoreType::Integer).not_null(),
        ColumnDescriptor::new("Customer", StoreType::Text),
    ];
    let table = store.create_table("Shouting", columns).unwrap();

    let mut exact: OrderInserter = BulkInserter::for_table(store.connect(), "Shouting").unwrap();
    let err = exact.insert_all(orders(1)).unwrap_err();
    assert!(matches!(
        err,
        BulkCopyError::Store(StoreError::ConstraintViolation { ref column, .. }) if column == "ID"
    ));
    assert_eq!(exact.mapped_columns().unwrap(), Vec::<&str>::new());

    let mut relaxed: OrderInserter = BulkInserter::for_table_with(
        store.connect(),
        "Shouting",
        InserterConfig::default().with_name_matching(NameMatching::CaseInsensitive),
        None,
    )
    .unwrap();
    relaxed.insert_all(orders(2)).unwrap();
    assert_eq!(relaxed.mapped_columns().unwrap(), vec!["ID", "Customer"]);
    assert_eq!(
        store.rows(&table).unwrap()[1],
        vec![Value::Int(1), Value::Text("customer-1".to_string())]
    );
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_invalid_arguments_are_rejected_before_io() {
    let (store, _) = orders_store();

    let err = OrderInserter::for_table(store.connect(), "  ").unwrap_err();
    assert!(matches!(err, BulkCopyError::Argument(ref e) if e.parameter() == "table_name"));

    let err = OrderInserter::for_table_with(
        store.connect(),
        ORDERS_TABLE,
        InserterConfig::default().with_buffer_size(0),
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BulkCopyError::Argument(ArgumentError::OutOfRange { ref parameter, .. }) if parameter == "buffer_size"
    ));

    assert!(store.queries().unwrap().is_empty());
}

#[test]
fn test_preconfigured_bulk_copy_handle() {
    let (store, table) = orders_store();
    let connection = store.connect();
    let copy = connection.bulk_copy(table.clone(), CopyOptions::TABLE_LOCK, None);

    let mut inserter: OrderInserter = BulkInserter::new(connection, copy).unwrap();
    assert_eq!(inserter.buffer_size(), 2000);
    assert_eq!(inserter.destination(), &table);
    // The handle's own options win over the (default) config.
    assert_eq!(inserter.copy_options(), CopyOptions::TABLE_LOCK);
    assert!(inserter.config().copy_options.is_empty());

    inserter.insert_all(orders(3)).unwrap();
    let writes = store.writes().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].options, CopyOptions::TABLE_LOCK);

    let (_connection, copy) = inserter.into_parts();
    assert_eq!(bulkcopy_store::BulkCopy::destination(&copy), &table);
}

#[test]
fn test_copy_options_and_transaction_from_config() {
    let (store, table) = orders_store();
    let txn = store.begin().unwrap();
    let mut inserter: OrderInserter = BulkInserter::for_table_with(
        store.connect(),
        ORDERS_TABLE,
        InserterConfig::default()
            .with_buffer_size(2)
            .with_copy_options(CopyOptions::KEEP_NULLS | CopyOptions::FIRE_TRIGGERS),
        Some(&txn),
    )
    .unwrap();
    assert_eq!(
        inserter.copy_options(),
        CopyOptions::KEEP_NULLS | CopyOptions::FIRE_TRIGGERS
    );

    inserter.insert_all(orders(3)).unwrap();
    assert_eq!(inserter.inserted_count(), 3);
    assert_eq!(store.row_count(&table).unwrap(), 0);

    txn.commit().unwrap();
    assert_eq!(store.row_count(&table).unwrap(), 3);
    for write in store.writes().unwrap() {
        assert_eq!(write.options, CopyOptions::KEEP_NULLS | CopyOptions::FIRE_TRIGGERS);
        assert_eq!(write.transaction, Some(txn.id()));
    }
    assert_batch_sizes(&store.writes().unwrap(), 3, 2);
}

#[test]
fn test_destination_is_parsed_from_table_argument() {
    let (store, _) = orders_store();
    let inserter = OrderInserter::for_table(store.connect(), "dbo.Orders").unwrap();
    assert_eq!(inserter.destination(), &TableName::parse("[dbo].[Orders]").unwrap());
}
