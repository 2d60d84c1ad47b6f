//! Literal helpers
//!
//! User data is never inlined into query text. The only text emitted
//! verbatim comes from closed enums or from type names checked here.

use crate::fragment::{CompiledFragment, PLACEHOLDER};
use searchql_core::{Error, Result, SqlValue};
use serde::{Deserialize, Serialize};

/// Characters with a meaning in the engine's query syntax
const QUERY_SYNTAX: &[char] = &[
    '+', '^', '`', ':', '{', '}', '"', '[', ']', '(', ')', '<', '>', '~', '!', '\\', '*', ',',
];

/// Backslash-escape query syntax characters and whitespace
pub fn escape_query(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if QUERY_SYNTAX.contains(&c) || c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Built-in types whose names contain spaces
const MULTI_WORD_TYPES: &[&str] = &[
    "double precision",
    "character varying",
    "bit varying",
    "time with time zone",
    "time without time zone",
    "timestamp with time zone",
    "timestamp without time zone",
];

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `name` is `ident(.ident)*` or a multi-word built-in, optionally followed
/// by a modifier list of integers: `numeric(10, 2)`
fn is_type_name(name: &str) -> bool {
    let (head, modifiers) = match name.find('(') {
        Some(open) => (name[..open].trim_end(), Some(&name[open + 1..])),
        None => (name, None),
    };

    let head_ok = MULTI_WORD_TYPES.iter().any(|t| head.eq_ignore_ascii_case(t))
        || head.split('.').all(is_identifier);
    if !head_ok {
        return false;
    }

    match modifiers {
        None => true,
        Some(rest) => match rest.strip_suffix(')') {
            Some(list) => list.split(',').all(|m| {
                let m = m.trim();
                !m.is_empty() && m.chars().all(|c| c.is_ascii_digit())
            }),
            None => false,
        },
    }
}

/// Check that a type name is safe to inline after `::`
///
/// Accepts names like `integer`, `public.mood`, `numeric(10, 2)` and
/// `double precision`.
pub fn validate_type_name(node: &'static str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(node, "type name cannot be empty"));
    }
    if !is_type_name(trimmed) {
        return Err(Error::validation(
            node,
            format!("type name '{}' is malformed", name),
        ));
    }
    Ok(())
}

/// A value with an explicit cast: `%s::<cast>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawValueCast")]
pub struct ValueCast {
    value: SqlValue,
    cast: String,
}

#[derive(Deserialize)]
struct RawValueCast {
    value: SqlValue,
    cast: String,
}

impl TryFrom<RawValueCast> for ValueCast {
    type Error = Error;

    fn try_from(raw: RawValueCast) -> Result<Self> {
        ValueCast::new(raw.value, &raw.cast)
    }
}

impl ValueCast {
    /// Create a cast, rejecting type names that are unsafe to inline
    pub fn new(value: impl Into<SqlValue>, cast: &str) -> Result<Self> {
        validate_type_name("ValueCast", cast)?;
        Ok(Self {
            value: value.into(),
            cast: cast.trim().to_string(),
        })
    }

    /// The bound value
    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// The cast type
    pub fn cast(&self) -> &str {
        &self.cast
    }

    /// Compile to `%s::<cast>`
    pub fn to_fragment(&self) -> CompiledFragment {
        CompiledFragment::new(
            format!("{}::{}", PLACEHOLDER, self.cast),
            vec![self.value.clone()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("plain"), "plain");
        assert_eq!(escape_query("a b"), "a\\ b");
        assert_eq!(escape_query("title:(shoes)"), "title\\:\\(shoes\\)");
        assert_eq!(escape_query("c:\\x"), "c\\:\\\\x");
        assert_eq!(escape_query("1,2*"), "1\\,2\\*");
    }

    #[test]
    fn test_type_names() {
        assert!(validate_type_name("t", "integer").is_ok());
        assert!(validate_type_name("t", "public.mood").is_ok());
        assert!(validate_type_name("t", "numeric(10, 2)").is_ok());
        assert!(validate_type_name("t", "double precision").is_ok());

        assert!(validate_type_name("t", "").is_err());
        assert!(validate_type_name("t", "int; DROP TABLE x").is_err());
        assert!(validate_type_name("t", "text'").is_err());
        assert!(validate_type_name("t", "numeric(10").is_err());
        assert!(validate_type_name("t", "(select 1)").is_err());
        assert!(validate_type_name("t", "mood OR true").is_err());
        assert!(validate_type_name("t", "mood) OR (true").is_err());
        assert!(validate_type_name("t", "numeric(1(2))").is_err());
        assert!(validate_type_name("t", "double precision OR true").is_err());
        assert!(validate_type_name("t", "pdb.boost(2)").is_ok());
        assert!(validate_type_name("t", "timestamp with time zone").is_ok());
    }

    #[test]
    fn test_deserialize_validates_cast() {
        let cast: ValueCast = serde_json::from_value(serde_json::json!({
            "value": {"type": "text", "value": "x"},
            "cast": "date"
        }))
        .unwrap();
        assert_eq!(cast.cast(), "date");

        let err = serde_json::from_value::<ValueCast>(serde_json::json!({
            "value": {"type": "text", "value": "x"},
            "cast": "date) OR (true"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_value_cast_fragment() {
        let cast = ValueCast::new("2024-01-01", "date").unwrap();
        let fragment = cast.to_fragment();
        assert_eq!(fragment.text, "%s::date");
        assert_eq!(fragment.params, vec![SqlValue::from("2024-01-01")]);

        assert!(ValueCast::new("x", "text--").unwrap_err().is_validation());
    }
}
