//! Error types for searchql
//!
//! Construction problems surface as validation errors, schema problems as
//! resolution errors and dialect mismatches as dialect errors. Nothing here is
//! ever retried: compilation is deterministic.

use thiserror::Error;

/// Failure to map a field reference onto a concrete table and column
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Model not found: {0}")]
    UnknownModel(String),

    #[error("No model is registered for table {0}")]
    UnknownTable(String),

    #[error("Column {column} does not exist on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Relation {relation} does not exist on model {model}")]
    UnknownRelation { model: String, relation: String },

    #[error("Relation path {0} is not joined in the current query")]
    JoinRequired(String),

    #[error("Invalid key reference: {0}")]
    InvalidKey(String),
}

/// The main error type for searchql operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ========== Validation Errors ==========
    #[error("Invalid {node}: {reason}")]
    Validation { node: &'static str, reason: String },

    // ========== Resolution Errors ==========
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    // ========== Dialect Errors ==========
    #[error("Function {function} is not available in {mode} mode")]
    UnsupportedDialect { function: String, mode: String },

    #[error("{function} cannot be used inside a compound query")]
    NotNestable { function: String },

    // ========== Lookup Errors ==========
    #[error("Unknown lookup: {0}")]
    UnknownLookup(String),

    #[error("Lookup {lookup} is missing required argument {argument}")]
    MissingArgument { lookup: String, argument: String },

    #[error("Lookup {lookup} got unexpected argument {argument}")]
    UnexpectedArgument { lookup: String, argument: String },

    #[error("Argument {argument}: expected {expected}, found {found}")]
    ArgumentType {
        argument: String,
        expected: String,
        found: String,
    },

    // ========== Serialization Errors ==========
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for searchql operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a validation failure on the named node
    pub fn validation(node: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            node,
            reason: reason.into(),
        }
    }

    /// Returns true if the error was raised while constructing a node
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if a field or relation could not be resolved
    pub fn is_resolution(&self) -> bool {
        matches!(self, Error::Resolution(_))
    }

    /// Returns true if the requested function family is unavailable
    pub fn is_dialect(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedDialect { .. } | Error::NotNestable { .. }
        )
    }

    /// Returns true if a lookup could not be mapped onto an expression
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Error::UnknownLookup(_)
                | Error::MissingArgument { .. }
                | Error::UnexpectedArgument { .. }
                | Error::ArgumentType { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("Phrase", "expected at least 2 phrases, got 1");
        assert_eq!(
            err.to_string(),
            "Invalid Phrase: expected at least 2 phrases, got 1"
        );

        let err: Error = ResolutionError::JoinRequired("user".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Resolution error: Relation path user is not joined in the current query"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::validation("Term", "x").is_validation());
        assert!(Error::from(ResolutionError::UnknownModel("x".into())).is_resolution());
        assert!(
            Error::UnsupportedDialect {
                function: "empty".into(),
                mode: "legacy".into()
            }
            .is_dialect()
        );
        assert!(Error::NotNestable { function: "search".into() }.is_dialect());
        assert!(Error::UnknownLookup("nope".into()).is_lookup());
        assert!(!Error::Internal("x".into()).is_lookup());
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
