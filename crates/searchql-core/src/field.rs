//! Field references and their resolution against a schema context
//!
//! A field can be named plainly (`title`), through joined relations
//! (`user.email`), as an already qualified `table.column` pair, as the key of a
//! related model, as a derived expression over a column, or directly as a key
//! reference. Resolution turns any of these into a concrete table and column.

use crate::error::{Error, ResolutionError, Result};
use crate::key::KeyReference;
use crate::schema::{ColumnType, SchemaContext, TableSchema};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Symbolic reference to a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSpecifier {
    /// Column on the root model
    Name(String),

    /// Column reached through one or more joined relations
    Path {
        relations: Vec<String>,
        column: String,
    },

    /// Pre-resolved table (or alias) and column
    Qualified { table: String, column: String },

    /// Key column of the model at the end of a relation path
    Related(Vec<String>),

    /// Expression over a column, emitted verbatim; the source column only
    /// determines the owning table and key
    Derived {
        text: String,
        source: Box<FieldSpecifier>,
    },

    /// A key reference used as a field
    Key(KeyReference),
}

impl FieldSpecifier {
    /// Parse a dotted path: `title` or `user.email`
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<String> = path.split('.').map(str::to_string).collect();
        let column = parts.pop().unwrap_or_default();
        if parts.is_empty() {
            FieldSpecifier::Name(column)
        } else {
            FieldSpecifier::Path {
                relations: parts,
                column,
            }
        }
    }

    /// Qualified table and column
    pub fn qualified(table: &str, column: &str) -> Self {
        FieldSpecifier::Qualified {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Key column of the model reached through a dotted relation path
    pub fn related(path: &str) -> Self {
        FieldSpecifier::Related(path.split('.').map(str::to_string).collect())
    }

    /// Expression text over a source column
    pub fn derived(text: &str, source: FieldSpecifier) -> Self {
        FieldSpecifier::Derived {
            text: text.to_string(),
            source: Box::new(source),
        }
    }

    /// Human readable form used in log lines and errors
    pub fn describe(&self) -> String {
        match self {
            FieldSpecifier::Name(name) => name.clone(),
            FieldSpecifier::Path { relations, column } => {
                format!("{}.{}", relations.join("."), column)
            }
            FieldSpecifier::Qualified { table, column } => format!("{}.{}", table, column),
            FieldSpecifier::Related(path) => format!("{}.<key>", path.join(".")),
            FieldSpecifier::Derived { text, .. } => text.clone(),
            FieldSpecifier::Key(key) => key.sql(),
        }
    }
}

impl From<&str> for FieldSpecifier {
    fn from(path: &str) -> Self {
        FieldSpecifier::parse(path)
    }
}

impl From<String> for FieldSpecifier {
    fn from(path: String) -> Self {
        FieldSpecifier::parse(&path)
    }
}

impl From<KeyReference> for FieldSpecifier {
    fn from(key: KeyReference) -> Self {
        FieldSpecifier::Key(key)
    }
}

/// A field mapped onto a concrete table and column
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Table (or alias) owning the column
    pub table: String,

    /// Column name
    pub column: String,

    /// Text used when the field appears as an operand
    pub sql: String,

    /// Key of the owning table
    pub key: KeyReference,

    /// Declared column type, `Other` when unknown
    pub column_type: ColumnType,
}

/// Outcome of resolving a field under the configured policy
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedField),
    /// Soft-fail sentinel: the caller may treat it as an empty result
    Unresolved(ResolutionError),
}

impl Resolution {
    /// The resolved field, if any
    pub fn resolved(self) -> Option<ResolvedField> {
        match self {
            Resolution::Resolved(field) => Some(field),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// What to do when a field cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Return the error to the caller
    Raise,
    /// Report an unresolved sentinel instead of failing
    SoftFail,
}

/// Resolves field specifiers against one schema context
#[derive(Debug, Clone)]
pub struct FieldResolver<'a> {
    ctx: &'a SchemaContext<'a>,
    policy: ResolutionPolicy,
}

impl<'a> FieldResolver<'a> {
    /// Create a resolver
    pub fn new(ctx: &'a SchemaContext<'a>, policy: ResolutionPolicy) -> Self {
        Self { ctx, policy }
    }

    /// The context this resolver reads
    pub fn context(&self) -> &'a SchemaContext<'a> {
        self.ctx
    }

    /// Configured policy
    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Resolve under the configured policy
    pub fn resolve(&self, spec: &FieldSpecifier) -> Result<Resolution> {
        match self.try_resolve(spec) {
            Ok(field) => Ok(Resolution::Resolved(field)),
            Err(Error::Resolution(err)) if self.policy == ResolutionPolicy::SoftFail => {
                warn!("Could not resolve field {}: {}", spec.describe(), err);
                Ok(Resolution::Unresolved(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve, always returning resolution failures as errors
    pub fn try_resolve(&self, spec: &FieldSpecifier) -> Result<ResolvedField> {
        let resolved = match spec {
            FieldSpecifier::Name(column) => {
                let table = self.root_table()?;
                self.column_on(table, &table.table, column)?
            }
            FieldSpecifier::Path { relations, column } => {
                let table = self.follow(relations)?;
                self.column_on(table, &table.table, column)?
            }
            FieldSpecifier::Qualified { table, column } => {
                let physical = self.ctx.unalias(table);
                let schema_table = self
                    .ctx
                    .schema()
                    .table(physical)
                    .ok_or_else(|| ResolutionError::UnknownTable(physical.to_string()))?;
                self.column_on(schema_table, table, column)?
            }
            FieldSpecifier::Related(relations) => {
                let table = self.follow(relations)?;
                self.column_on(table, &table.table, table.search_key())?
            }
            FieldSpecifier::Derived { text, source } => {
                let mut field = self.try_resolve(source)?;
                field.sql = text.clone();
                field
            }
            FieldSpecifier::Key(key) => {
                let column_type = self
                    .ctx
                    .schema()
                    .table(self.ctx.unalias(key.table()))
                    .and_then(|t| t.get_column(key.key_column()))
                    .map(|c| c.column_type)
                    .unwrap_or(ColumnType::Other);
                ResolvedField {
                    table: key.table().to_string(),
                    column: key.key_column().to_string(),
                    sql: key.sql(),
                    key: key.clone(),
                    column_type,
                }
            }
        };

        trace!("Resolved field {} to {}", spec.describe(), resolved.sql);
        Ok(resolved)
    }

    /// Key of the root model
    pub fn root_key(&self) -> Result<KeyReference> {
        Ok(KeyReference::for_table(self.root_table()?))
    }

    /// Key of the model owning a physical table (or alias)
    pub fn key_for_table(&self, table: &str) -> Result<KeyReference> {
        let physical = self.ctx.unalias(table);
        let schema_table = self
            .ctx
            .schema()
            .table(physical)
            .ok_or_else(|| ResolutionError::UnknownTable(physical.to_string()))?;
        Ok(KeyReference::for_alias(table, schema_table))
    }

    fn root_table(&self) -> Result<&'a TableSchema> {
        let root = self.ctx.root();
        self.ctx
            .schema()
            .model(root)
            .ok_or_else(|| ResolutionError::UnknownModel(root.to_string()).into())
    }

    fn follow(&self, relations: &[String]) -> Result<&'a TableSchema> {
        let schema = self.ctx.schema();
        let mut current = self.root_table()?;

        for (depth, name) in relations.iter().enumerate() {
            let relation =
                current
                    .get_relation(name)
                    .ok_or_else(|| ResolutionError::UnknownRelation {
                        model: current.model.clone(),
                        relation: name.clone(),
                    })?;

            let path = relations[..=depth].join(".");
            if !self.ctx.is_joined(&path) {
                return Err(ResolutionError::JoinRequired(path).into());
            }

            current = schema
                .model(&relation.target)
                .ok_or_else(|| ResolutionError::UnknownModel(relation.target.clone()))?;
        }

        Ok(current)
    }

    fn column_on(&self, table: &TableSchema, name: &str, column: &str) -> Result<ResolvedField> {
        let declared = table
            .get_column(column)
            .ok_or_else(|| ResolutionError::UnknownColumn {
                table: table.table.clone(),
                column: column.to_string(),
            })?;

        Ok(ResolvedField {
            table: name.to_string(),
            column: column.to_string(),
            sql: format!("{}.{}", name, column),
            key: KeyReference::for_alias(name, table),
            column_type: declared.column_type,
        })
    }
}
