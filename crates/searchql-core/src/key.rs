//! Key references
//!
//! Match-style predicates are anchored on the row key of the table that owns
//! the searched field: `article.id @@@ paradedb.term(...)`.

use crate::error::{ResolutionError, Result};
use crate::schema::TableSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A table paired with the column that identifies its rows
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyReference {
    table: String,
    key_column: String,
}

impl KeyReference {
    /// Create a key reference from a table name and key column
    pub fn new(table: &str, key_column: &str) -> Self {
        Self {
            table: table.to_string(),
            key_column: key_column.to_string(),
        }
    }

    /// Derive the key of a schema table (honours a key field override)
    pub fn for_table(table: &TableSchema) -> Self {
        Self::new(&table.table, table.search_key())
    }

    /// Same as `for_table` but keeps an alias the query refers to the table by
    pub fn for_alias(alias: &str, table: &TableSchema) -> Self {
        Self::new(alias, table.search_key())
    }

    /// Parse a raw `table.column` string, double quotes are stripped
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = raw.replace('"', "");
        let mut parts = cleaned.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(table), Some(column), None) if !table.is_empty() && !column.is_empty() => {
                Ok(Self::new(table, column))
            }
            _ => Err(ResolutionError::InvalidKey(format!(
                "expected table.column, got '{}'",
                raw
            ))
            .into()),
        }
    }

    /// Table (or alias) name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key column name
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Qualified `table.column` text
    pub fn sql(&self) -> String {
        format!("{}.{}", self.table, self.key_column)
    }

    /// Check that the key column exists on the given table
    pub fn validate(&self, table: &TableSchema) -> Result<()> {
        if table.has_column(&self.key_column) {
            Ok(())
        } else {
            Err(ResolutionError::UnknownColumn {
                table: table.table.clone(),
                column: self.key_column.clone(),
            }
            .into())
        }
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.key_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::ColumnType;
    use proptest::prelude::*;

    #[test]
    fn test_key_sql() {
        let key = KeyReference::new("article", "id");
        assert_eq!(key.sql(), "article.id");
        assert_eq!(key.to_string(), "article.id");
    }

    #[test]
    fn test_parse() {
        let key = KeyReference::parse("\"auth_user\".\"id\"").unwrap();
        assert_eq!(key.table(), "auth_user");
        assert_eq!(key.key_column(), "id");

        assert!(matches!(
            KeyReference::parse("article"),
            Err(Error::Resolution(ResolutionError::InvalidKey(_)))
        ));
        assert!(KeyReference::parse("a.b.c").is_err());
        assert!(KeyReference::parse(".id").is_err());
    }

    #[test]
    fn test_for_table_uses_key_field() {
        let table = TableSchema::new("product", "product", "id")
            .column("sku", ColumnType::Text)
            .with_key_field("sku");
        let key = KeyReference::for_table(&table);
        assert_eq!(key.sql(), "product.sku");
        assert!(key.validate(&table).is_ok());
    }

    proptest! {
        #[test]
        fn prop_parse_round_trips(table in "[a-z_][a-z0-9_]{0,15}", column in "[a-z_][a-z0-9_]{0,15}") {
            let key = KeyReference::parse(&format!("\"{}\".\"{}\"", table, column)).unwrap();
            prop_assert_eq!(key.sql(), format!("{}.{}", table, column));
            prop_assert_eq!(KeyReference::parse(&key.sql()).unwrap(), key);
        }
    }

    #[test]
    fn test_validate_missing_column() {
        let table = TableSchema::new("article", "article", "id");
        let key = KeyReference::new("article", "uuid");
        assert!(key.validate(&table).unwrap_err().is_resolution());
    }
}
