//! Inserter configuration
//!
//! Configuration can be built in code or loaded from environment variables
//! with defaults for anything not set.

use crate::error::{BulkCopyResult, ConfigError};
use crate::identifier::Dialect;
use crate::options::CopyOptions;
use crate::record::NameMatching;
use serde::{Deserialize, Serialize};

/// Rows per bulk write when no buffer size is given.
pub const DEFAULT_BUFFER_SIZE: usize = 2000;

/// Settings for one bulk inserter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InserterConfig {
    /// Number of rows staged and committed per bulk write.
    pub buffer_size: usize,
    /// Options for a bulk-write handle the inserter builds itself.
    pub copy_options: CopyOptions,
    /// How record field names are matched to column names.
    pub name_matching: NameMatching,
    /// Quoting and shape-query flavour for schema discovery.
    pub dialect: Dialect,
}

impl Default for InserterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            copy_options: CopyOptions::empty(),
            name_matching: NameMatching::Exact,
            dialect: Dialect::SqlServer,
        }
    }
}

impl InserterConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_copy_options(mut self, copy_options: CopyOptions) -> Self {
        self.copy_options = copy_options;
        self
    }

    pub fn with_name_matching(mut self, name_matching: NameMatching) -> Self {
        self.name_matching = name_matching;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Create InserterConfig from environment variables.
    ///
    /// Environment variables:
    /// - `BULKCOPY_BUFFER_SIZE`: Rows per bulk write (default: 2000)
    /// - `BULKCOPY_COPY_OPTIONS`: Comma-separated flags, e.g. "keep_nulls,table_lock" (default: none)
    /// - `BULKCOPY_NAME_MATCHING`: "exact" or "case_insensitive" (default: exact)
    /// - `BULKCOPY_DIALECT`: "sql_server" or "ansi" (default: sql_server)
    ///
    /// Unset variables take their defaults; set but unparsable ones are an error.
    pub fn from_env() -> BulkCopyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment, a map, ...).
    pub fn from_lookup<F>(lookup: F) -> BulkCopyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("BULKCOPY_BUFFER_SIZE") {
            config.buffer_size = raw
                .trim()
                .parse()
                .map_err(|_| invalid("buffer_size", &raw, "must be a positive integer"))?;
        }

        if let Some(raw) = lookup("BULKCOPY_COPY_OPTIONS") {
            config.copy_options = CopyOptions::parse_list(&raw)
                .map_err(|name| invalid("copy_options", &raw, &format!("unknown option {name}")))?;
        }

        if let Some(raw) = lookup("BULKCOPY_NAME_MATCHING") {
            config.name_matching = NameMatching::parse(&raw).ok_or_else(|| {
                invalid("name_matching", &raw, "must be exact or case_insensitive")
            })?;
        }

        if let Some(raw) = lookup("BULKCOPY_DIALECT") {
            config.dialect = Dialect::parse(&raw)
                .ok_or_else(|| invalid("dialect", &raw, "must be sql_server or ansi"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - buffer_size > 0
    pub fn validate(&self) -> BulkCopyResult<()> {
        if self.buffer_size == 0 {
            return Err(invalid(
                "buffer_size",
                &self.buffer_size.to_string(),
                "buffer_size must be greater than 0",
            )
            .into());
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
