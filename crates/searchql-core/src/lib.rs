//! searchql core library
//!
//! Fundamental types shared by the compiler crates.
//!
//! # Modules
//!
//! - `error` - Error taxonomy and result alias
//! - `value` - Bound parameter values
//! - `schema` - Relational schema model and join context
//! - `key` - Key references anchoring match predicates
//! - `field` - Field specifiers and their resolution
//! - `config` - Compiler configuration snapshots

pub mod config;
pub mod error;
pub mod field;
pub mod key;
pub mod schema;
pub mod value;

pub use config::{CompilerConfig, DialectConfig, DialectMode, SharedConfig};
pub use error::{Error, ResolutionError, Result};
pub use field::{FieldResolver, FieldSpecifier, Resolution, ResolutionPolicy, ResolvedField};
pub use key::KeyReference;
pub use schema::{Column, ColumnType, Relation, RelationKind, Schema, SchemaContext, TableSchema};
pub use value::SqlValue;
