//! searchql - search expression compiler
//!
//! This is the main library crate that re-exports all searchql components.

pub use searchql_core as core;
pub use searchql_query as query;

// Re-export commonly used types
pub use searchql_core::{
    ColumnType, CompilerConfig, DialectMode, Error, FieldSpecifier, KeyReference, RelationKind,
    ResolutionError, Result, Schema, SchemaContext, SqlValue, TableSchema,
};

pub use searchql_query::expr;
pub use searchql_query::{
    Aggregation, Compiled, CompiledFragment, Compiler, ExprBuilder, Expression, Facet,
    LookupAdapter, LookupRequest, LookupValue, Proximity,
};
