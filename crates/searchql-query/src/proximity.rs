//! Proximity clauses
//!
//! A clause is a flat sequence `term op distance op term ...` where `op` is
//! `##` (within, any order) or `##>` (within, in order). Term slots take a
//! literal, a `ProximityRegex` or a `ProximityArray`; distance slots take a
//! non-negative integer or a digit string. Arrays are opaque terms and never
//! carry operators of their own.

use crate::compiler::{Position, Session, MATCH_OPERATOR};
use crate::dialect;
use crate::expr::ExprOptions;
use crate::fragment::{CallBuilder, CompiledFragment};
use logos::Logos;
use searchql_core::{DialectMode, Error, FieldSpecifier, Result, SqlValue};
use serde_json::Value;
use std::fmt;

/// Tokens with a meaning inside a proximity sequence
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum ProximityToken {
    #[token("##>")]
    OrderedWithin,

    #[token("##")]
    Within,

    #[regex("[0-9]+")]
    Distance,
}

/// Classify a string that is exactly one proximity token
pub fn classify(text: &str) -> Option<ProximityToken> {
    let mut lexer = ProximityToken::lexer(text);
    let token = lexer.next()?.ok()?;
    if lexer.span() != (0..text.len()) || lexer.next().is_some() {
        return None;
    }
    Some(token)
}

/// Distance operator between two terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityOperator {
    /// `##`
    Within,
    /// `##>`
    OrderedWithin,
}

impl ProximityOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProximityOperator::Within => "##",
            ProximityOperator::OrderedWithin => "##>",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match classify(text)? {
            ProximityToken::Within => Some(ProximityOperator::Within),
            ProximityToken::OrderedWithin => Some(ProximityOperator::OrderedWithin),
            ProximityToken::Distance => None,
        }
    }
}

impl fmt::Display for ProximityOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regex term inside a proximity clause
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityRegex {
    regex: String,
    max_expansions: Option<u32>,
}

impl ProximityRegex {
    pub fn new(regex: &str) -> Self {
        Self {
            regex: regex.to_string(),
            max_expansions: None,
        }
    }

    /// Cap on the number of terms the regex may expand to
    pub fn max_expansions(mut self, max: u32) -> Self {
        self.max_expansions = Some(max);
        self
    }

    pub fn to_fragment(&self) -> CompiledFragment {
        let mut call = CallBuilder::new();
        call.bind(self.regex.clone());
        if let Some(max) = self.max_expansions.filter(|max| *max > 0) {
            call.bind(max);
        }
        call.call(dialect::schema_name(DialectMode::V2), "prox_regex")
    }
}

/// Element of a `ProximityArray`
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityItem {
    Text(String),
    Integer(i64),
    Regex(ProximityRegex),
}

/// Any of several terms, used as one term
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityArray {
    items: Vec<ProximityItem>,
}

impl ProximityArray {
    pub fn new(items: Vec<ProximityItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::validation("ProximityArray", "items cannot be empty"));
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[ProximityItem] {
        &self.items
    }

    pub fn to_fragment(&self) -> CompiledFragment {
        let mut call = CallBuilder::new();
        for item in &self.items {
            match item {
                ProximityItem::Text(text) => call.bind(text.clone()),
                ProximityItem::Integer(value) => call.bind(*value),
                ProximityItem::Regex(regex) => call.splice(regex.to_fragment()),
            };
        }
        call.call(dialect::schema_name(DialectMode::V2), "prox_array")
    }
}

/// One slot of a proximity sequence, as given by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityValue {
    Text(String),
    Integer(i64),
    Regex(ProximityRegex),
    Array(ProximityArray),
}

impl ProximityValue {
    /// Convert a JSON value: strings, integers, `{"regex", "max_expansions"}`
    /// objects and arrays of those
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(ProximityValue::Text(text.clone())),
            Value::Number(number) => number
                .as_i64()
                .map(ProximityValue::Integer)
                .ok_or_else(|| Error::validation("Proximity", format!("invalid number {}", number))),
            Value::Object(_) => Ok(ProximityValue::Regex(regex_from_json(value)?)),
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| match ProximityValue::from_json(item)? {
                        ProximityValue::Text(text) => Ok(ProximityItem::Text(text)),
                        ProximityValue::Integer(value) => Ok(ProximityItem::Integer(value)),
                        ProximityValue::Regex(regex) => Ok(ProximityItem::Regex(regex)),
                        ProximityValue::Array(_) => Err(Error::validation(
                            "ProximityArray",
                            "arrays cannot be nested",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ProximityValue::Array(ProximityArray::new(items)?))
            }
            other => Err(Error::validation(
                "Proximity",
                format!("unsupported value {}", other),
            )),
        }
    }
}

fn regex_from_json(value: &Value) -> Result<ProximityRegex> {
    let regex = value
        .get("regex")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("ProximityRegex", "missing 'regex'"))?;

    let mut proximity_regex = ProximityRegex::new(regex);
    if let Some(max) = value.get("max_expansions").filter(|max| !max.is_null()) {
        let max = max
            .as_u64()
            .and_then(|max| u32::try_from(max).ok())
            .ok_or_else(|| {
                Error::validation("ProximityRegex", "max_expansions must be a non-negative integer")
            })?;
        proximity_regex = proximity_regex.max_expansions(max);
    }
    Ok(proximity_regex)
}

impl From<&str> for ProximityValue {
    fn from(text: &str) -> Self {
        ProximityValue::Text(text.to_string())
    }
}

impl From<String> for ProximityValue {
    fn from(text: String) -> Self {
        ProximityValue::Text(text)
    }
}

impl From<i64> for ProximityValue {
    fn from(value: i64) -> Self {
        ProximityValue::Integer(value)
    }
}

impl From<i32> for ProximityValue {
    fn from(value: i32) -> Self {
        ProximityValue::Integer(i64::from(value))
    }
}

impl From<ProximityRegex> for ProximityValue {
    fn from(regex: ProximityRegex) -> Self {
        ProximityValue::Regex(regex)
    }
}

impl From<ProximityArray> for ProximityValue {
    fn from(array: ProximityArray) -> Self {
        ProximityValue::Array(array)
    }
}

/// A validated slot
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityPart<'a> {
    Term(&'a ProximityValue),
    Operator(ProximityOperator),
    Distance(i64),
}

fn position_error(position: usize, expected: &str, found: &ProximityValue) -> Error {
    Error::validation(
        "Proximity",
        format!("expected {} at position {}, got {:?}", expected, position, found),
    )
}

/// Check the alternation of a sequence
pub fn validate(values: &[ProximityValue]) -> Result<Vec<ProximityPart<'_>>> {
    if values.len() < 3 {
        return Err(Error::validation(
            "Proximity",
            format!("expected at least 3 values, got {}", values.len()),
        ));
    }

    let mut parts = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        let position = idx + 1;
        let part = if idx % 2 == 1 {
            match value {
                ProximityValue::Text(text) => ProximityOperator::parse(text)
                    .map(ProximityPart::Operator)
                    .ok_or_else(|| position_error(position, "one of ##, ##>", value))?,
                _ => return Err(position_error(position, "one of ##, ##>", value)),
            }
        } else if idx % 4 == 0 {
            match value {
                ProximityValue::Text(text) if ProximityOperator::parse(text).is_some() => {
                    return Err(position_error(position, "a term", value));
                }
                _ => ProximityPart::Term(value),
            }
        } else {
            let distance = match value {
                ProximityValue::Integer(distance) => Some(*distance).filter(|d| *d >= 0),
                ProximityValue::Text(text) if classify(text) == Some(ProximityToken::Distance) => {
                    text.parse::<i64>().ok()
                }
                _ => None,
            };
            distance
                .map(ProximityPart::Distance)
                .ok_or_else(|| position_error(position, "a non-negative integer distance", value))?
        };
        parts.push(part);
    }

    if values.len() % 4 != 1 {
        return Err(Error::validation(
            "Proximity",
            "sequence must end on a term",
        ));
    }
    Ok(parts)
}

/// Render validated slots as `(term op distance op term ...)`
pub fn serialize(parts: &[ProximityPart<'_>]) -> CompiledFragment {
    let mut texts = Vec::with_capacity(parts.len());
    let mut params = Vec::new();

    for part in parts {
        let fragment = match part {
            ProximityPart::Term(ProximityValue::Text(text)) => CompiledFragment::bound(text.clone()),
            ProximityPart::Term(ProximityValue::Integer(value)) => CompiledFragment::bound(*value),
            ProximityPart::Term(ProximityValue::Regex(regex)) => regex.to_fragment(),
            ProximityPart::Term(ProximityValue::Array(array)) => array.to_fragment(),
            ProximityPart::Operator(op) => CompiledFragment::text(op.as_str()),
            ProximityPart::Distance(distance) => CompiledFragment::bound(SqlValue::Integer(*distance)),
        };
        texts.push(fragment.text);
        params.extend(fragment.params);
    }

    CompiledFragment::new(format!("({})", texts.join(" ")), params)
}

pub fn validate_and_serialize(values: &[ProximityValue]) -> Result<CompiledFragment> {
    Ok(serialize(&validate(values)?))
}

/// Proximity search, optionally scoped to a field
#[derive(Debug, Clone, PartialEq)]
pub struct Proximity {
    values: Vec<ProximityValue>,
    field: Option<FieldSpecifier>,
    pub(crate) options: ExprOptions,
}

impl Proximity {
    pub fn new<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ProximityValue>,
    {
        let values: Vec<ProximityValue> = values.into_iter().map(Into::into).collect();
        validate(&values)?;
        Ok(Self {
            values,
            field: None,
            options: ExprOptions::default(),
        })
    }

    /// Apply the clause to one field
    pub fn field(mut self, field: impl Into<FieldSpecifier>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn values(&self) -> &[ProximityValue] {
        &self.values
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        // A bare clause carries no field, so it stays valid when nested
        let selection = session.select(&dialect::PROXIMITY, &self.options, Position::Top)?;
        let clause = validate_and_serialize(&self.values)?;

        let fragment = match &self.field {
            Some(field) => {
                let resolved = session.resolve(field)?;
                clause.with_operand(&resolved.sql, MATCH_OPERATOR)
            }
            None if self.options.match_op && position == Position::Top => {
                let key = session.key(&self.options, None)?;
                clause.with_operand(&key.sql(), MATCH_OPERATOR)
            }
            None => clause,
        };

        session.log(&dialect::PROXIMITY, selection, &fragment);
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{compile_with, legacy};
    use crate::expr::{Boolean, ExprBuilder};
    use searchql_core::CompilerConfig;
    use serde_json::json;

    #[test]
    fn test_classify() {
        assert_eq!(classify("##"), Some(ProximityToken::Within));
        assert_eq!(classify("##>"), Some(ProximityToken::OrderedWithin));
        assert_eq!(classify("12"), Some(ProximityToken::Distance));
        assert_eq!(classify("##x"), None);
        assert_eq!(classify("1 2"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("shoes"), None);
    }

    #[test]
    fn test_too_short() {
        let err = Proximity::new(["a", "b"]).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("at least 3"));
    }

    #[test]
    fn test_two_operators_in_order() {
        let proximity = Proximity::new(["a", "##", "1", "##>", "b"]).unwrap();
        let fragment = validate_and_serialize(proximity.values()).unwrap();
        assert_eq!(fragment.text, "(%s ## %s ##> %s)");
        assert_eq!(
            fragment.params,
            vec![SqlValue::from("a"), SqlValue::Integer(1), SqlValue::from("b")]
        );
    }

    #[test]
    fn test_alternation_errors() {
        // operator slot holding a term
        assert!(Proximity::new(["a", "b", "1", "##", "c"]).is_err());
        // term slot holding an operator
        assert!(Proximity::new(["##", "##", "1", "##", "c"]).is_err());
        // distance slot holding text
        assert!(Proximity::new(["a", "##", "far", "##", "c"]).is_err());
        // ends on a distance
        assert!(Proximity::new(["a", "##", "1"]).is_err());
        assert!(Proximity::new(vec![
            ProximityValue::from("a"),
            "##".into(),
            (-1i64).into(),
            "##".into(),
            "b".into()
        ])
        .is_err());
    }

    #[test]
    fn test_regex_and_array_terms() {
        let array = ProximityArray::new(vec![
            ProximityItem::Text("wow".into()),
            ProximityItem::Regex(ProximityRegex::new("wow.*").max_expansions(10)),
        ])
        .unwrap();
        let values: Vec<ProximityValue> = vec![
            "rust".into(),
            "##".into(),
            "1".into(),
            "##>".into(),
            ProximityRegex::new("m.*").into(),
            "##".into(),
            100i64.into(),
            "##>".into(),
            array.into(),
        ];
        let fragment = legacy(Proximity::new(values).unwrap().field("title"));
        assert_eq!(
            fragment.text,
            "article.title @@@ (%s ## %s ##> pdb.prox_regex(%s) ## %s ##> pdb.prox_array(%s, pdb.prox_regex(%s, %s)))"
        );
        assert_eq!(fragment.params.len(), 7);
        assert_eq!(fragment.params[3], SqlValue::Integer(100));
        assert_eq!(fragment.params[6], SqlValue::Integer(10));
    }

    #[test]
    fn test_keyed_and_nested() {
        let proximity = Proximity::new(["a", "##", "2", "##", "b"]).unwrap();
        assert_eq!(
            legacy(proximity.clone().match_op(true)).text,
            "article.id @@@ (%s ## %s ## %s)"
        );

        let boolean = Boolean::must(vec![proximity.clone().match_op(true).into()]).unwrap();
        assert_eq!(
            legacy(boolean).text,
            "paradedb.boolean(must:=ARRAY[(%s ## %s ## %s)])"
        );

        let err = compile_with(&CompilerConfig::default(), proximity.force_legacy()).unwrap_err();
        assert!(err.is_dialect());
    }

    #[test]
    fn test_from_json() {
        let values = json!(["a", "##", 3, "##>", {"regex": "b.*", "max_expansions": 5}, "##", "1", "##", ["x", 2]]);
        let values: Vec<ProximityValue> = values
            .as_array()
            .unwrap()
            .iter()
            .map(|value| ProximityValue::from_json(value).unwrap())
            .collect();
        assert!(validate(&values).is_ok());
        assert!(matches!(values[8], ProximityValue::Array(_)));

        assert!(ProximityValue::from_json(&json!({"pattern": "x"})).is_err());
        assert!(ProximityValue::from_json(&json!([["nested"]])).is_err());
        assert!(ProximityValue::from_json(&json!([])).is_err());
    }
}
