//! Bound parameter values
//!
//! Every literal a compiled fragment needs travels out-of-band as a
//! `SqlValue`, in the same order as the placeholders in the fragment text.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A value bound to a `%s` placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL NULL
    Null,

    /// Boolean value
    Boolean(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text
    Text(String),

    /// Array of values (homogeneous)
    Array(Vec<SqlValue>),

    /// JSON document
    Json(serde_json::Value),

    /// Calendar date
    Date(NaiveDate),

    /// Timestamp without time zone
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Try to get as text reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SqlValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Boolean(_) => "boolean",
            SqlValue::Integer(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Array(_) => "array",
            SqlValue::Json(_) => "json",
            SqlValue::Date(_) => "date",
            SqlValue::DateTime(_) => "datetime",
        }
    }

    /// Convert a JSON value into the closest bound value
    ///
    /// Objects stay JSON documents; arrays become SQL arrays.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                SqlValue::Array(items.iter().map(SqlValue::from_json).collect())
            }
            serde_json::Value::Object(_) => SqlValue::Json(value.clone()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Boolean(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        SqlValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(SqlValue::from(true).as_boolean(), Some(true));
        assert_eq!(SqlValue::from(42i64).as_integer(), Some(42));
        assert_eq!(SqlValue::from(42i32).as_float(), Some(42.0));
        assert_eq!(SqlValue::from("well").as_str(), Some("well"));
        assert!(SqlValue::from(None::<i64>).is_null());
        assert_eq!(
            SqlValue::from(vec!["a", "b"]),
            SqlValue::Array(vec![SqlValue::Text("a".into()), SqlValue::Text("b".into())])
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(SqlValue::Null.type_name(), "null");
        assert_eq!(SqlValue::Float(1.5).type_name(), "float");
        let date = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert_eq!(SqlValue::from(date).type_name(), "date");
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"title": "x"});
        assert_eq!(SqlValue::from_json(&json), SqlValue::Json(json.clone()));
        assert_eq!(
            SqlValue::from_json(&serde_json::json!([1, 2.5, null])),
            SqlValue::Array(vec![
                SqlValue::Integer(1),
                SqlValue::Float(2.5),
                SqlValue::Null
            ])
        );
    }

    #[test]
    fn test_serde_shape() {
        let encoded = serde_json::to_value(SqlValue::Integer(7)).unwrap();
        assert_eq!(encoded, serde_json::json!({"type": "integer", "value": 7}));
    }
}
