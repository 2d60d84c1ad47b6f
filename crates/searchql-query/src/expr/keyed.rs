//! Nodes anchored on the key column: `all`, `empty`, `exists`, and the
//! `score` and `snippet` value expressions

use super::ExprOptions;
use crate::compiler::{Position, Session};
use crate::dialect;
use crate::fragment::CompiledFragment;
use searchql_core::{FieldSpecifier, Result};

/// Matches every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct All {
    pub(crate) options: ExprOptions,
}

impl All {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.keyed_call(&dialect::ALL, &self.options, position, |_| Ok(()))
    }
}

/// Matches no row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Empty {
    pub(crate) options: ExprOptions,
}

impl Empty {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.keyed_call(&dialect::EMPTY, &self.options, position, |_| Ok(()))
    }
}

/// Rows where a field holds any indexed value
#[derive(Debug, Clone, PartialEq)]
pub struct Exists {
    field: Option<FieldSpecifier>,
    pub(crate) options: ExprOptions,
}

impl Exists {
    /// Existence of a value in one field
    pub fn new(field: impl Into<FieldSpecifier>) -> Self {
        Self {
            field: Some(field.into()),
            options: ExprOptions::default(),
        }
    }

    /// Existence of any indexed value (v2 only)
    pub fn any() -> Self {
        Self {
            field: None,
            options: ExprOptions::default(),
        }
    }

    pub fn field(&self) -> Option<&FieldSpecifier> {
        self.field.as_ref()
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        match &self.field {
            Some(field) => {
                session.field_call(&dialect::EXISTS, field, &self.options, position, |_| Ok(()))
            }
            None => session.keyed_call(&dialect::EXISTS_ANY, &self.options, position, |_| Ok(())),
        }
    }
}

/// BM25 score of the row, used as a value rather than a predicate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub(crate) options: ExprOptions,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.keyed_call(&dialect::SCORE, &self.options, position, |_| Ok(()))
    }
}

/// Highlighted excerpt of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    field: FieldSpecifier,
    limit: Option<u32>,
    offset: Option<u32>,
    start_tag: Option<String>,
    end_tag: Option<String>,
    max_num_chars: Option<u32>,
    pub(crate) options: ExprOptions,
}

impl Snippet {
    pub fn new(field: impl Into<FieldSpecifier>) -> Self {
        Self {
            field: field.into(),
            limit: None,
            offset: None,
            start_tag: None,
            end_tag: None,
            max_num_chars: None,
            options: ExprOptions::default(),
        }
    }

    /// Maximum number of snippets
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Number of snippets to skip
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Markup placed around each highlighted term
    pub fn tags(mut self, start: &str, end: &str) -> Self {
        self.start_tag = Some(start.to_string());
        self.end_tag = Some(end.to_string());
        self
    }

    pub fn start_tag(mut self, tag: &str) -> Self {
        self.start_tag = Some(tag.to_string());
        self
    }

    pub fn end_tag(mut self, tag: &str) -> Self {
        self.end_tag = Some(tag.to_string());
        self
    }

    pub fn max_num_chars(mut self, max: u32) -> Self {
        self.max_num_chars = Some(max);
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::SNIPPET, &self.field, &self.options, position, |call| {
            // limit and offset are reserved words
            call.named_opt("\"limit\"", self.limit)
                .named_opt("\"offset\"", self.offset)
                .named_opt("start_tag", self.start_tag.clone())
                .named_opt("end_tag", self.end_tag.clone())
                .named_opt("max_num_chars", self.max_num_chars);
            Ok(())
        })
    }
}
