//! Relational schema model consumed by the compiler
//!
//! The compiler never introspects a live catalog. Callers hand it a resolved
//! `Schema` (tables, primary keys, columns and relations) plus a
//! `SchemaContext` describing which relations the surrounding query has
//! already joined.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Character data
    #[default]
    Text,
    /// Whole numbers
    Integer,
    /// Floating point and numeric
    Float,
    /// Booleans
    Boolean,
    /// Calendar dates
    Date,
    /// Timestamps
    DateTime,
    /// JSON documents
    Json,
    /// Any of the range types
    Range,
    /// Anything the compiler does not need to coerce
    Other,
}

/// A column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Declared type
    #[serde(default)]
    pub column_type: ColumnType,
}

impl Column {
    /// Create a column
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
        }
    }
}

/// Kind of relation between two models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ForeignKey,
    OneToOne,
    ManyToMany,
}

/// A relation from one model to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation name as used in field paths
    pub name: String,

    /// Kind of relation
    pub kind: RelationKind,

    /// Target model name
    pub target: String,
}

/// A table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Model name (schema-level identity)
    pub model: String,

    /// Physical table name
    pub table: String,

    /// Primary key column
    pub primary_key: String,

    /// Column the search index is keyed on, when it differs from the primary key
    #[serde(default)]
    pub key_field: Option<String>,

    /// Columns on this table
    #[serde(default)]
    pub columns: Vec<Column>,

    /// Relations by name
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

impl TableSchema {
    /// Create a table whose primary key is already a known column
    pub fn new(model: &str, table: &str, primary_key: &str) -> Self {
        Self {
            model: model.to_string(),
            table: table.to_string(),
            primary_key: primary_key.to_string(),
            key_field: None,
            columns: vec![Column::new(primary_key, ColumnType::Integer)],
            relations: BTreeMap::new(),
        }
    }

    /// Builder: add a column
    pub fn column(mut self, name: &str, column_type: ColumnType) -> Self {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.column_type = column_type,
            None => self.columns.push(Column::new(name, column_type)),
        }
        self
    }

    /// Builder: add a relation to another model
    pub fn relation(mut self, name: &str, kind: RelationKind, target: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            Relation {
                name: name.to_string(),
                kind,
                target: target.to_string(),
            },
        );
        self
    }

    /// Builder: key the search index on a column other than the primary key
    pub fn with_key_field(mut self, column: &str) -> Self {
        self.key_field = Some(column.to_string());
        self
    }

    /// Column the search index is keyed on
    pub fn search_key(&self) -> &str {
        self.key_field.as_deref().unwrap_or(&self.primary_key)
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Get a relation by name
    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }
}

/// Collection of every model reachable from a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Tables by model name
    pub tables: BTreeMap<String, TableSchema>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, returns false if the model is already registered
    pub fn add_table(&mut self, table: TableSchema) -> bool {
        if self.tables.contains_key(&table.model) {
            return false;
        }
        self.tables.insert(table.model.clone(), table);
        true
    }

    /// Builder form of `add_table`
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.add_table(table);
        self
    }

    /// Get a table by model name
    pub fn model(&self, model: &str) -> Option<&TableSchema> {
        self.tables.get(model)
    }

    /// Get a table by physical table name
    ///
    /// When several models share one table, the first by model name wins.
    pub fn table(&self, table: &str) -> Option<&TableSchema> {
        self.tables.values().find(|t| t.table == table)
    }
}

/// What the surrounding query already provides: a root model, the relation
/// paths it has joined and any table aliases it introduced
#[derive(Debug, Clone)]
pub struct SchemaContext<'a> {
    schema: &'a Schema,
    root: String,
    joins: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
}

impl<'a> SchemaContext<'a> {
    /// Create a context rooted at the given model
    pub fn new(schema: &'a Schema, root: &str) -> Self {
        Self {
            schema,
            root: root.to_string(),
            joins: BTreeSet::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Builder: mark a relation path (`user`, `user.profile`) as joined
    pub fn with_join(mut self, path: &str) -> Self {
        self.joins.insert(path.to_string());
        self
    }

    /// Builder: register a table alias used by the surrounding query
    pub fn with_alias(mut self, alias: &str, table: &str) -> Self {
        self.aliases.insert(alias.to_string(), table.to_string());
        self
    }

    /// The schema this context reads from
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Root model name
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Check whether a relation path is joined
    pub fn is_joined(&self, path: &str) -> bool {
        self.joins.contains(path)
    }

    /// Map an alias back to its physical table, passing unknown names through
    pub fn unalias<'s>(&'s self, name: &'s str) -> &'s str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}
