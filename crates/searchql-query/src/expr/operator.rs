//! Operator forms: a field on the left of a search operator

use super::{ExprOptions, Expression};
use crate::compiler::{Position, Session};
use crate::dialect::{self, FunctionSpec};
use crate::fragment::{CompiledFragment, PLACEHOLDER};
use crate::literal::{escape_query, ValueCast};
use searchql_core::{Error, FieldSpecifier, Result, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search operators understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchOperator {
    /// Parsed query string
    #[default]
    #[serde(rename = "@@@")]
    Search,
    /// Any token matches
    #[serde(rename = "|||")]
    MatchDisjunction,
    /// Every token matches
    #[serde(rename = "&&&")]
    MatchConjunction,
    #[serde(rename = "###")]
    Phrase,
    #[serde(rename = "===")]
    Term,
}

impl SearchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOperator::Search => "@@@",
            SearchOperator::MatchDisjunction => "|||",
            SearchOperator::MatchConjunction => "&&&",
            SearchOperator::Phrase => "###",
            SearchOperator::Term => "===",
        }
    }

    /// Function table entry governing the operator's availability
    pub fn spec(&self) -> &'static FunctionSpec {
        match self {
            SearchOperator::Search => &dialect::SEARCH,
            SearchOperator::MatchDisjunction => &dialect::MATCH_DISJUNCTION,
            SearchOperator::MatchConjunction => &dialect::MATCH_CONJUNCTION,
            SearchOperator::Phrase => &dialect::PHRASE_OPERATOR,
            SearchOperator::Term => &dialect::TERM_OPERATOR,
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "@@@" => Ok(SearchOperator::Search),
            "|||" => Ok(SearchOperator::MatchDisjunction),
            "&&&" => Ok(SearchOperator::MatchConjunction),
            "###" => Ok(SearchOperator::Phrase),
            "===" => Ok(SearchOperator::Term),
            other => Err(Error::validation(
                "Search",
                format!("op must be one of @@@, |||, &&&, ###, ===, got '{}'", other),
            )),
        }
    }
}

/// Right-hand side of a search operator
#[derive(Debug, Clone, PartialEq)]
pub enum SearchValue {
    Text(String),
    Array(Vec<String>),
    Cast(ValueCast),
    Query(Box<Expression>),
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        SearchValue::Text(value.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        SearchValue::Text(value)
    }
}

impl From<Vec<String>> for SearchValue {
    fn from(values: Vec<String>) -> Self {
        SearchValue::Array(values)
    }
}

impl From<ValueCast> for SearchValue {
    fn from(cast: ValueCast) -> Self {
        SearchValue::Cast(cast)
    }
}

impl From<Expression> for SearchValue {
    fn from(expr: Expression) -> Self {
        SearchValue::Query(Box::new(expr))
    }
}

/// `table.column <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    field: FieldSpecifier,
    value: SearchValue,
    op: SearchOperator,
    escaped: bool,
    pub(crate) options: ExprOptions,
}

impl Search {
    pub fn new(field: impl Into<FieldSpecifier>, value: impl Into<SearchValue>) -> Result<Self> {
        let value = value.into();
        if let SearchValue::Array(values) = &value {
            if values.is_empty() {
                return Err(Error::validation("Search", "value array cannot be empty"));
            }
        }

        Ok(Self {
            field: field.into(),
            value,
            op: SearchOperator::default(),
            escaped: false,
            options: ExprOptions::default(),
        })
    }

    pub fn operator(mut self, op: SearchOperator) -> Self {
        self.op = op;
        self
    }

    /// Escape query syntax in text values
    pub fn escaped(mut self, enabled: bool) -> Self {
        self.escaped = enabled;
        self
    }

    pub fn op(&self) -> SearchOperator {
        self.op
    }

    fn text(&self, value: &str) -> String {
        if self.escaped {
            escape_query(value)
        } else {
            value.to_string()
        }
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let spec = self.op.spec();
        let resolved = session.resolve(&self.field)?;
        let selection = session.select(spec, &self.options, position)?;

        let value = match &self.value {
            SearchValue::Text(text) => CompiledFragment::bound(self.text(text)),
            SearchValue::Array(values) => {
                CompiledFragment::bound_array(values.iter().map(|value| self.text(value)))
            }
            SearchValue::Cast(cast) => cast.to_fragment(),
            SearchValue::Query(expr) => session.nested(expr)?,
        };

        let fragment = value.with_operand(&resolved.sql, self.op.as_str());
        session.log(spec, selection, &fragment);
        Ok(fragment)
    }
}

/// Search inside a JSON column: `table.column[key]... @@@ value`
#[derive(Debug, Clone, PartialEq)]
pub struct JsonOp {
    field: FieldSpecifier,
    keys: Vec<String>,
    value: SqlValue,
    pub(crate) options: ExprOptions,
}

impl JsonOp {
    pub fn new<I, S>(field: impl Into<FieldSpecifier>, keys: I, value: impl Into<SqlValue>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::validation("JsonOp", "at least one key is required"));
        }
        if keys.iter().any(|key| key.is_empty()) {
            return Err(Error::validation("JsonOp", "keys cannot be empty"));
        }

        Ok(Self {
            field: field.into(),
            keys,
            value: value.into(),
            options: ExprOptions::default(),
        })
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let resolved = session.resolve(&self.field)?;
        let selection = session.select(&dialect::JSON_OP, &self.options, position)?;

        let mut text = resolved.sql.clone();
        let mut params = Vec::with_capacity(self.keys.len() + 1);
        for key in &self.keys {
            text.push('[');
            text.push_str(PLACEHOLDER);
            text.push(']');
            params.push(SqlValue::from(key.as_str()));
        }
        params.push(self.value.clone());

        let fragment = CompiledFragment::new(format!("{} @@@ {}", text, PLACEHOLDER), params);
        session.log(&dialect::JSON_OP, selection, &fragment);
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{compile_with, legacy, v2};
    use crate::expr::{Boolean, ExprBuilder, Term};
    use searchql_core::CompilerConfig;

    #[test]
    fn test_search_text() {
        let fragment = legacy(Search::new("title", "running shoes").unwrap());
        assert_eq!(fragment.text, "article.title @@@ %s");
        assert_eq!(fragment.params, vec![SqlValue::from("running shoes")]);
    }

    #[test]
    fn test_search_match_op_does_not_wrap() {
        let fragment = legacy(Search::new("title", "x").unwrap().match_op(true));
        assert_eq!(fragment.text, "article.title @@@ %s");
    }

    #[test]
    fn test_search_operators() {
        let fragment = v2(Search::new("title", "shoes").unwrap().operator(SearchOperator::MatchConjunction));
        assert_eq!(fragment.text, "article.title &&& %s");

        let values = vec!["running".to_string(), "shoes".to_string()];
        let fragment = v2(Search::new("title", values).unwrap().operator(SearchOperator::Phrase));
        assert_eq!(fragment.text, "article.title ### ARRAY[%s, %s]");
        assert_eq!(fragment.params.len(), 2);
    }

    #[test]
    fn test_v2_operators_rejected_under_forced_legacy() {
        let search = Search::new("title", "x").unwrap().operator(SearchOperator::Term).force_legacy();
        let err = compile_with(&CompilerConfig::v2(), search).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDialect { .. }));

        let search = Search::new("title", "x").unwrap().force_legacy();
        assert!(compile_with(&CompilerConfig::v2(), search).is_ok());
    }

    #[test]
    fn test_search_cast_and_escape() {
        let cast = ValueCast::new("shoes", "pdb.boost(2)").unwrap();
        let fragment = v2(Search::new("title", cast).unwrap().operator(SearchOperator::MatchDisjunction));
        assert_eq!(fragment.text, "article.title ||| %s::pdb.boost(2)");

        let fragment = legacy(Search::new("title", "a:b c").unwrap().escaped(true));
        assert_eq!(fragment.params, vec![SqlValue::from("a\\:b\\ c")]);
    }

    #[test]
    fn test_search_nested_query_value() {
        let fragment = legacy(Search::new("title", Expression::from(Term::new("title", "x"))).unwrap());
        assert_eq!(fragment.text, "article.title @@@ paradedb.term(%s, %s)");
    }

    #[test]
    fn test_search_validation() {
        assert!(Search::new("title", Vec::<String>::new()).unwrap_err().is_validation());
        assert!("~~~".parse::<SearchOperator>().is_err());
        assert_eq!("===".parse::<SearchOperator>().unwrap(), SearchOperator::Term);
    }

    #[test]
    fn test_json_op() {
        let fragment = legacy(JsonOp::new("metadata", ["color", "name"], "red").unwrap());
        assert_eq!(fragment.text, "article.metadata[%s][%s] @@@ %s");
        assert_eq!(
            fragment.params,
            vec![SqlValue::from("color"), SqlValue::from("name"), SqlValue::from("red")]
        );
        assert!(JsonOp::new("metadata", Vec::<String>::new(), "x").is_err());
        assert!(JsonOp::new("metadata", [""], "x").is_err());
    }

    #[test]
    fn test_json_op_is_not_nestable() {
        let boolean = Boolean::must(vec![JsonOp::new("metadata", ["a"], 1i64).unwrap().into()]).unwrap();
        let err = compile_with(&CompilerConfig::default(), boolean).unwrap_err();
        assert!(matches!(err, Error::NotNestable { .. }));
    }
}
