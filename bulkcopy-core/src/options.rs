//! Bulk copy options.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Options handed to the store's bulk-write protocol.
    ///
    /// The empty set is the store's default behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CopyOptions: u8 {
        /// Keep identity values from the source instead of generating them
        const KEEP_IDENTITY = 0b0000_0001;
        /// Check constraints while rows are inserted
        const CHECK_CONSTRAINTS = 0b0000_0010;
        /// Hold a table-level lock for the duration of each write
        const TABLE_LOCK = 0b0000_0100;
        /// Write nulls as nulls, even where the column has a default
        const KEEP_NULLS = 0b0000_1000;
        /// Fire insert triggers on the destination table
        const FIRE_TRIGGERS = 0b0001_0000;
        /// Run each write in its own store transaction
        const USE_INTERNAL_TRANSACTION = 0b0010_0000;
    }
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions::empty()
    }
}

impl CopyOptions {
    /// Parse a comma-separated list of flag names, case-insensitively.
    ///
    /// `"keep_nulls, table_lock"` yields `KEEP_NULLS | TABLE_LOCK`. An empty
    /// list or `"default"` yields the empty set. Returns the first unknown
    /// name on failure.
    pub fn parse_list(raw: &str) -> Result<Self, String> {
        let mut options = CopyOptions::empty();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name.eq_ignore_ascii_case("default") {
                continue;
            }
            let flag = CopyOptions::from_name(&name.to_ascii_uppercase())
                .ok_or_else(|| name.to_string())?;
            options |= flag;
        }
        Ok(options)
    }
}
