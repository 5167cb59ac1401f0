//! bulkcopy Test Utilities
//!
//! Shared test infrastructure for the bulkcopy workspace:
//! - Proptest generators for records, buffer sizes and identifiers
//! - Fixtures: a sample `Order` record and a matching in-memory table
//! - Assertions over what the in-memory store received

// Re-export the in-memory store from its source crate
pub use bulkcopy_store::{MemoryStore, WriteRecord};

pub use bulkcopy_core::{
    impl_record, ColumnDescriptor, StoreError, StoreType, TableName, Value,
};

use chrono::{DateTime, TimeZone, Utc};

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Sample record type and destination table.
    //!
    //! `Order` and the `dbo.Orders` table overlap on purpose but not fully:
    //! the record has a `picked` field with no column, and the table has
    //! `status` (not null, default `'pending'`) and `batch_ref` columns that
    //! no field feeds.

    use super::*;

    /// Destination table used by most tests.
    pub const ORDERS_TABLE: &str = "dbo.Orders";

    /// A record with one field per column kind the store supports.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Order {
        pub id: i32,
        pub customer: String,
        pub total: f64,
        pub note: Option<String>,
        pub placed_at: DateTime<Utc>,
        pub picked: bool,
    }

    impl_record!(Order { id, customer, total, note, placed_at, picked });

    /// Columns of `dbo.Orders`, in table order.
    pub fn order_columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", StoreType::Integer).not_null(),
            ColumnDescriptor::new("customer", StoreType::Text).not_null(),
            ColumnDescriptor::new("total", StoreType::Double).not_null(),
            ColumnDescriptor::new("note", StoreType::Text),
            ColumnDescriptor::new("placed_at", StoreType::Timestamp),
            ColumnDescriptor::new("status", StoreType::Text)
                .not_null()
                .with_default("pending"),
            ColumnDescriptor::new("batch_ref", StoreType::Text),
        ]
    }

    /// Fixed timestamp so fixtures compare deterministically.
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Deterministic order number `n`. Every third order has no note.
    pub fn order(n: i32) -> Order {
        Order {
            id: n,
            customer: format!("customer-{n}"),
            total: f64::from(n) * 1.5,
            note: (n % 3 != 0).then(|| format!("note {n}")),
            placed_at: base_time() + chrono::Duration::minutes(i64::from(n)),
            picked: n % 2 == 0,
        }
    }

    /// Orders `0..count`.
    pub fn orders(count: usize) -> Vec<Order> {
        (0..count as i32).map(order).collect()
    }

    /// A store holding an empty `dbo.Orders` table.
    pub fn orders_store() -> (MemoryStore, TableName) {
        let store = MemoryStore::new();
        let table = store
            .create_table(ORDERS_TABLE, order_columns())
            .expect("fixture table name is valid");
        (store, table)
    }

    /// The row the store should hold for `order` after a default-options write.
    pub fn expected_row(order: &Order) -> Vec<Value> {
        vec![
            Value::Int(i64::from(order.id)),
            Value::Text(order.customer.clone()),
            Value::Float(order.total),
            order.note.clone().map(Value::Text).unwrap_or(Value::Null),
            Value::Timestamp(order.placed_at),
            Value::Text("pending".to_string()),
            Value::Null,
        ]
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for bulkcopy inputs.

    use super::fixtures::{base_time, Order};
    use proptest::prelude::*;

    /// Generate an arbitrary `Order` with valid column values.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        (
            any::<i32>(),
            "[a-z]{1,12}",
            -1.0e6f64..1.0e6,
            proptest::option::of("[ -~]{0,40}"),
            0i64..525_600,
            any::<bool>(),
        )
            .prop_map(|(id, customer, total, note, minutes, picked)| Order {
                id,
                customer,
                total,
                note,
                placed_at: base_time() + chrono::Duration::minutes(minutes),
                picked,
            })
    }

    /// Generate up to `max_len` orders.
    pub fn arb_orders(max_len: usize) -> impl Strategy<Value = Vec<Order>> {
        proptest::collection::vec(arb_order(), 0..=max_len)
    }

    /// Generate a small, non-zero buffer size.
    pub fn arb_buffer_size() -> impl Strategy<Value = usize> {
        1usize..=16
    }

    /// Generate one identifier part, including characters that need quoting.
    pub fn arb_identifier_part() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z_][A-Za-z0-9_]{0,15}",
            "[A-Za-z .\\[\\]\"]{1,12}".prop_filter("non-blank", |s| !s.trim().is_empty()),
        ]
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over what a `MemoryStore` received.

    use super::*;

    /// Assert that `writes` split `total` rows into ceil(total / buffer_size)
    /// writes of `buffer_size`, with only the last one possibly shorter.
    pub fn assert_batch_sizes(writes: &[WriteRecord], total: usize, buffer_size: usize) {
        let expected: Vec<usize> = (0..total)
            .step_by(buffer_size)
            .map(|start| buffer_size.min(total - start))
            .collect();
        let actual: Vec<usize> = writes.iter().map(|w| w.rows).collect();
        assert_eq!(
            actual, expected,
            "batch sizes for {total} rows with buffer size {buffer_size}"
        );
    }

    /// Assert that `table` holds exactly `expected` rows, in order.
    pub fn assert_table_rows(store: &MemoryStore, table: &TableName, expected: &[Vec<Value>]) {
        let rows = store.rows(table).expect("table exists");
        assert_eq!(rows.len(), expected.len(), "row count of {table}");
        for (i, (actual, expected)) in rows.iter().zip(expected).enumerate() {
            assert_eq!(actual, expected, "row {i} of {table}");
        }
    }
}
