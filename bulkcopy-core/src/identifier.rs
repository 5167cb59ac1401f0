//! Destination table identifiers and dialect-specific quoting.
//!
//! Table names arrive as free text (`dbo.Orders`, `[Sales].[Order Lines]`,
//! `"audit"."events"`). They are parsed into their dot-separated parts once,
//! and every part is re-quoted when it is embedded in SQL, so names with
//! spaces, dots or closing brackets cannot break out of the identifier.

use crate::error::ArgumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of parts in a qualified name (server.database.schema.table).
const MAX_PARTS: usize = 4;

/// SQL flavour used for identifier quoting and the shape query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `[name]` quoting, `SELECT TOP 0 *` shape query.
    #[default]
    SqlServer,
    /// `"name"` quoting, `WHERE 1 = 0` shape query.
    Ansi,
}

impl Dialect {
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::SqlServer => format!("[{}]", ident.replace(']', "]]")),
            Dialect::Ansi => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Zero-row query returning every column of `table`.
    pub fn shape_query(&self, table: &TableName) -> String {
        match self {
            Dialect::SqlServer => format!("SELECT TOP 0 * FROM {}", table.quoted(*self)),
            Dialect::Ansi => format!("SELECT * FROM {} WHERE 1 = 0", table.quoted(*self)),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sql_server" | "sqlserver" | "mssql" => Some(Dialect::SqlServer),
            "ansi" | "postgres" | "sqlite" => Some(Dialect::Ansi),
            _ => None,
        }
    }
}

/// A parsed, possibly qualified, table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    parts: Vec<String>,
}

impl TableName {
    /// Parse a table name.
    ///
    /// Parts are separated by unquoted dots. A part may be wrapped in
    /// `[...]` (with `]]` as an escaped `]`) or `"..."` (with `""` as an
    /// escaped `"`); unquoted parts are trimmed.
    ///
    /// # Errors
    ///
    /// Returns an `ArgumentError` naming `table_name` when the name is
    /// empty, has an empty part, has an unterminated quote, or has more
    /// than four parts.
    pub fn parse(raw: &str) -> Result<Self, ArgumentError> {
        if raw.trim().is_empty() {
            return Err(ArgumentError::Empty {
                parameter: "table_name".to_string(),
            });
        }

        let mut parts = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '[' | '"' if !quoted && current.trim().is_empty() => {
                    let close = if c == '[' { ']' } else { '"' };
                    current.clear();
                    let mut terminated = false;
                    while let Some(q) = chars.next() {
                        if q == close {
                            if chars.peek() == Some(&close) {
                                chars.next();
                                current.push(close);
                            } else {
                                terminated = true;
                                break;
                            }
                        } else {
                            current.push(q);
                        }
                    }
                    if !terminated {
                        return Err(malformed(raw, "unterminated quoted identifier"));
                    }
                    quoted = true;
                }
                '.' => {
                    parts.push(finish_part(raw, &current, quoted)?);
                    current.clear();
                    quoted = false;
                }
                c if quoted => {
                    if !c.is_whitespace() {
                        return Err(malformed(raw, "unexpected text after quoted identifier"));
                    }
                }
                c => current.push(c),
            }
        }
        parts.push(finish_part(raw, &current, quoted)?);

        if parts.len() > MAX_PARTS {
            return Err(malformed(raw, "too many name parts"));
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The last part: the table itself.
    pub fn unqualified(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// The name with every part quoted for `dialect`.
    pub fn quoted(&self, dialect: Dialect) -> String {
        self.parts
            .iter()
            .map(|p| dialect.quote_ident(p))
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn finish_part(raw: &str, part: &str, quoted: bool) -> Result<String, ArgumentError> {
    let part = if quoted { part } else { part.trim() };
    if part.is_empty() {
        return Err(malformed(raw, "empty name part"));
    }
    Ok(part.to_string())
}

fn malformed(raw: &str, reason: &str) -> ArgumentError {
    ArgumentError::Malformed {
        parameter: "table_name".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl std::str::FromStr for TableName {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
