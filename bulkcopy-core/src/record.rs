//! Declared field accessors for record types.
//!
//! A record type lists its readable fields once, as `(name, accessor)` pairs,
//! either by hand with [`FieldMap::field`] or with the [`impl_record!`]
//! macro. The inserter matches these names against the destination table's
//! columns; fields without a column and columns without a field are skipped.
//!
//! [`impl_record!`]: crate::impl_record

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reads one field of a record as a staged value.
pub type Accessor<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// How field names are compared with column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    /// Byte-for-byte comparison.
    #[default]
    Exact,
    /// ASCII case-insensitive comparison.
    CaseInsensitive,
}

impl NameMatching {
    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            NameMatching::Exact => a == b,
            NameMatching::CaseInsensitive => a.eq_ignore_ascii_case(b),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exact" | "case_sensitive" => Some(NameMatching::Exact),
            "case_insensitive" | "ignore_case" => Some(NameMatching::CaseInsensitive),
            _ => None,
        }
    }
}

/// Ordered set of named field accessors for `T`.
pub struct FieldMap<T> {
    fields: Vec<(String, Accessor<T>)>,
}

impl<T> FieldMap<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a field. Declaring the same name twice replaces the earlier
    /// accessor in place.
    pub fn field<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let accessor: Accessor<T> = Arc::new(accessor);
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = accessor,
            None => self.fields.push((name, accessor)),
        }
        self
    }

    /// Accessor for the first field whose name matches `name`.
    pub fn get(&self, name: &str, matching: NameMatching) -> Option<&Accessor<T>> {
        self.fields
            .iter()
            .find(|(n, _)| matching.matches(n, name))
            .map(|(_, accessor)| accessor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FieldMap<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A type whose fields can be bulk inserted.
pub trait Record: Sized {
    /// The readable fields of this type. Called once per inserter.
    fn field_map() -> FieldMap<Self>;
}

/// Implement [`Record`] for a struct by listing its fields.
///
/// Each listed field must implement [`ToValue`](crate::ToValue); the field
/// name is used verbatim as the column name.
///
/// # Example
/// ```
/// use bulkcopy_core::{impl_record, Record};
///
/// struct Order {
///     id: i32,
///     customer: String,
///     note: Option<String>,
/// }
///
/// impl_record!(Order { id, customer, note });
///
/// let fields = Order::field_map();
/// assert_eq!(fields.names().collect::<Vec<_>>(), ["id", "customer", "note"]);
/// ```
#[macro_export]
macro_rules! impl_record {
    ($type:ident { $($field:ident),+ $(,)? }) => {
        impl $crate::Record for $type {
            fn field_map() -> $crate::FieldMap<Self> {
                $crate::FieldMap::new()
                    $(
                        .field(stringify!($field), |record: &$type| {
                            $crate::ToValue::to_value(&record.$field)
                        })
                    )+
            }
        }
    };
}
