//! Lookup adapter
//!
//! A lookup is a named shorthand: the `term` lookup on `title` with `"shoes"`
//! on its right-hand side builds `Term::new("title", "shoes")`. The right-hand
//! side arrives as a scalar, a positional list, a named map or an explicit
//! args/kwargs pair and is bound onto the declared parameters of the lookup
//! before the matching expression node is built.
//!
//! Three keyword arguments are consumed by the adapter itself rather than the
//! node: `match_op` (defaults to true), `key`/`key_field` and `legacy`.

use crate::compiler::Compiler;
use crate::expr::{
    All, Boolean, Boost, ConstScore, DisjunctionMax, Empty, ExprBuilder, ExprOptions, Exists,
    Expression, FuzzyTerm, Match, MoreLikeThis, Parse, ParseWithField, Phrase, PhrasePrefix, Range,
    RangeBounds, RangeCast, RangeRelation, RangeTerm, RangeType, Regex, Score, Search, SearchOperator,
    SearchValue, Snippet, Term, TermSet, Tokenizer,
};
use crate::fragment::Compiled;
use crate::literal::ValueCast;
use crate::proximity::{Proximity, ProximityValue};
use chrono::{NaiveDate, NaiveDateTime};
use searchql_core::{
    ColumnType, Error, FieldSpecifier, KeyReference, ResolutionPolicy, ResolvedField, Result,
    SqlValue,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Every registered lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    All,
    Empty,
    PdbSearch,
    Match,
    PdbExists,
    PdbRange,
    RangeTerm,
    PdbRegex,
    Term,
    TermSet,
    FuzzyTerm,
    Phrase,
    PhrasePrefix,
    ConstScore,
    Boost,
    Bm25Score,
    DisjunctionMax,
    Boolean,
    MoreLikeThis,
    ParseWithField,
    Parse,
    Snippet,
    Proximity,
    MatchV2,
    MatchV2Conjunction,
    PhraseV2,
    TermV2,
}

impl LookupKind {
    pub const ALL: [LookupKind; 27] = [
        LookupKind::All,
        LookupKind::Empty,
        LookupKind::PdbSearch,
        LookupKind::Match,
        LookupKind::PdbExists,
        LookupKind::PdbRange,
        LookupKind::RangeTerm,
        LookupKind::PdbRegex,
        LookupKind::Term,
        LookupKind::TermSet,
        LookupKind::FuzzyTerm,
        LookupKind::Phrase,
        LookupKind::PhrasePrefix,
        LookupKind::ConstScore,
        LookupKind::Boost,
        LookupKind::Bm25Score,
        LookupKind::DisjunctionMax,
        LookupKind::Boolean,
        LookupKind::MoreLikeThis,
        LookupKind::ParseWithField,
        LookupKind::Parse,
        LookupKind::Snippet,
        LookupKind::Proximity,
        LookupKind::MatchV2,
        LookupKind::MatchV2Conjunction,
        LookupKind::PhraseV2,
        LookupKind::TermV2,
    ];

    /// Registered lookup name
    pub fn name(&self) -> &'static str {
        match self {
            LookupKind::All => "all",
            LookupKind::Empty => "empty",
            LookupKind::PdbSearch => "pdb_search",
            LookupKind::Match => "match",
            LookupKind::PdbExists => "pdb_exists",
            LookupKind::PdbRange => "pdb_range",
            LookupKind::RangeTerm => "range_term",
            LookupKind::PdbRegex => "pdb_regex",
            LookupKind::Term => "term",
            LookupKind::TermSet => "term_set",
            LookupKind::FuzzyTerm => "fuzzy_term",
            LookupKind::Phrase => "phrase",
            LookupKind::PhrasePrefix => "phrase_prefix",
            LookupKind::ConstScore => "const_score",
            LookupKind::Boost => "boost",
            LookupKind::Bm25Score => "bm25_score",
            LookupKind::DisjunctionMax => "disjunction_max",
            LookupKind::Boolean => "boolean",
            LookupKind::MoreLikeThis => "more_like_this",
            LookupKind::ParseWithField => "parse_with_field",
            LookupKind::Parse => "parse",
            LookupKind::Snippet => "snippet",
            LookupKind::Proximity => "proximity",
            LookupKind::MatchV2 => "match_v2",
            LookupKind::MatchV2Conjunction => "match_v2_conjunction",
            LookupKind::PhraseV2 => "phrase_v2",
            LookupKind::TermV2 => "term_v2",
        }
    }

    /// Find a lookup by its registered name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::UnknownLookup(name.to_string()))
    }

    /// Declared parameters, in positional order, not counting the field
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            LookupKind::All | LookupKind::Empty | LookupKind::PdbExists | LookupKind::Bm25Score => &[],
            LookupKind::PdbSearch
            | LookupKind::MatchV2
            | LookupKind::MatchV2Conjunction
            | LookupKind::PhraseV2
            | LookupKind::TermV2 => &["value", "escaped"],
            LookupKind::Match => &[
                "value",
                "distance",
                "conjunction_mode",
                "tokenizer",
                "transposition_cost_one",
                "prefix",
                "escaped",
            ],
            LookupKind::PdbRange => &["range_type", "start", "end", "bounds"],
            LookupKind::RangeTerm => &["term_or_range", "cast", "relation"],
            LookupKind::PdbRegex => &["pattern"],
            LookupKind::Term => &["value", "enum_cast"],
            LookupKind::TermSet => &["terms"],
            LookupKind::FuzzyTerm => &["value", "distance", "transposition_cost_one", "prefix"],
            LookupKind::Phrase => &["phrases", "slop"],
            LookupKind::PhrasePrefix => &["phrases", "max_expansion"],
            LookupKind::ConstScore => &["score", "query"],
            LookupKind::Boost => &["factor", "query"],
            LookupKind::DisjunctionMax => &["disjuncts", "tie_breaker"],
            LookupKind::Boolean => &["must", "must_not", "should"],
            LookupKind::MoreLikeThis => &[
                "document_id",
                "document",
                "fields",
                "min_doc_frequency",
                "max_doc_frequency",
                "min_term_frequency",
                "max_query_terms",
                "min_word_length",
                "max_word_length",
                "boost_factor",
                "stop_words",
            ],
            LookupKind::ParseWithField | LookupKind::Parse => &["query", "lenient", "conjunction_mode"],
            LookupKind::Snippet => &["limit", "offset", "start_tag", "end_tag", "max_num_chars"],
            LookupKind::Proximity => &["values"],
        }
    }

    /// Whether the left-hand side becomes the node's field
    pub fn takes_field(&self) -> bool {
        !matches!(
            self,
            LookupKind::All
                | LookupKind::Empty
                | LookupKind::TermSet
                | LookupKind::ConstScore
                | LookupKind::Boost
                | LookupKind::Bm25Score
                | LookupKind::DisjunctionMax
                | LookupKind::Boolean
                | LookupKind::MoreLikeThis
                | LookupKind::Parse
        )
    }

    /// Lookups that accept and discard their right-hand side
    fn ignores_args(&self) -> bool {
        matches!(
            self,
            LookupKind::All | LookupKind::Empty | LookupKind::PdbExists | LookupKind::Bm25Score
        )
    }

    /// Whether the first argument is prepared against the field's column type
    pub fn prepares_rhs(&self) -> bool {
        matches!(
            self,
            LookupKind::Match
                | LookupKind::PdbRegex
                | LookupKind::Term
                | LookupKind::FuzzyTerm
                | LookupKind::Phrase
                | LookupKind::PhrasePrefix
        )
    }

    fn operator(&self) -> Option<SearchOperator> {
        match self {
            LookupKind::PdbSearch => Some(SearchOperator::Search),
            LookupKind::MatchV2 => Some(SearchOperator::MatchDisjunction),
            LookupKind::MatchV2Conjunction => Some(SearchOperator::MatchConjunction),
            LookupKind::PhraseV2 => Some(SearchOperator::Phrase),
            LookupKind::TermV2 => Some(SearchOperator::Term),
            _ => None,
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One argument of a lookup's right-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(SqlValue),
    List(Vec<Arg>),
    Cast(ValueCast),
    Expr(Box<Expression>),
    /// A lookup still to be adapted into an expression
    Lookup(Box<LookupRequest>),
}

impl Arg {
    /// Build a list argument
    pub fn list<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Arg::List(items.into_iter().map(Into::into).collect())
    }

    /// Short description used in argument type errors
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Value(value) => value.type_name(),
            Arg::List(_) => "list",
            Arg::Cast(_) => "cast",
            Arg::Expr(_) => "expression",
            Arg::Lookup(_) => "lookup",
        }
    }

    /// Convert a JSON value
    ///
    /// Objects carrying a `lookup` key become nested lookups, `{value, cast}`
    /// pairs become casts and arrays become lists. Anything else is a plain
    /// bound value.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) if map.contains_key("lookup") => {
                let request: LookupRequest = serde_json::from_value(value.clone())?;
                Ok(Arg::Lookup(Box::new(request)))
            }
            Value::Object(map) if is_cast(map) => {
                let cast = map
                    .get("cast")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::validation("ValueCast", "cast must be a string"))?;
                let inner = map.get("value").map(SqlValue::from_json).unwrap_or(SqlValue::Null);
                Ok(Arg::Cast(ValueCast::new(inner, cast)?))
            }
            Value::Array(items) => Ok(Arg::List(
                items.iter().map(Arg::from_json).collect::<Result<Vec<_>>>()?,
            )),
            other => Ok(Arg::Value(SqlValue::from_json(other))),
        }
    }

    fn to_json(&self) -> Option<Value> {
        match self {
            Arg::Value(value) => sql_json(value),
            Arg::List(items) => items.iter().map(Arg::to_json).collect::<Option<Vec<_>>>().map(Value::Array),
            Arg::Cast(_) | Arg::Expr(_) | Arg::Lookup(_) => None,
        }
    }
}

fn is_cast(map: &serde_json::Map<String, Value>) -> bool {
    map.len() == 2 && map.contains_key("value") && map.contains_key("cast")
}

fn sql_json(value: &SqlValue) -> Option<Value> {
    match value {
        SqlValue::Null => Some(Value::Null),
        SqlValue::Boolean(b) => Some(Value::Bool(*b)),
        SqlValue::Integer(i) => Some(Value::from(*i)),
        SqlValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        SqlValue::Text(s) => Some(Value::String(s.clone())),
        SqlValue::Json(json) => Some(json.clone()),
        SqlValue::Array(items) => items.iter().map(sql_json).collect::<Option<Vec<_>>>().map(Value::Array),
        SqlValue::Date(_) | SqlValue::DateTime(_) => None,
    }
}

impl From<SqlValue> for Arg {
    fn from(value: SqlValue) -> Self {
        Arg::Value(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Value(value.into())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Value(value.into())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Value(value.into())
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Value(value.into())
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Value(value.into())
    }
}

impl From<ValueCast> for Arg {
    fn from(cast: ValueCast) -> Self {
        Arg::Cast(cast)
    }
}

impl From<Expression> for Arg {
    fn from(expr: Expression) -> Self {
        Arg::Expr(Box::new(expr))
    }
}

impl From<LookupRequest> for Arg {
    fn from(request: LookupRequest) -> Self {
        Arg::Lookup(Box::new(request))
    }
}

/// Explicit positional and named arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupParameter {
    pub args: Vec<Arg>,
    pub kwargs: BTreeMap<String, Arg>,
}

impl LookupParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn kwarg(mut self, name: &str, arg: impl Into<Arg>) -> Self {
        self.kwargs.insert(name.to_string(), arg.into());
        self
    }
}

/// Shape of a lookup's right-hand side
#[derive(Debug, Clone, PartialEq)]
pub enum LookupValue {
    /// A single value, bound to the first parameter
    Scalar(Arg),
    /// Bound in declared parameter order
    Positional(Vec<Arg>),
    /// Bound by parameter name
    Named(BTreeMap<String, Arg>),
    Structured(LookupParameter),
}

impl LookupValue {
    pub fn positional<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        LookupValue::Positional(args.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, A>(kwargs: I) -> Self
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<Arg>,
    {
        LookupValue::Named(
            kwargs
                .into_iter()
                .map(|(name, arg)| (name.into(), arg.into()))
                .collect(),
        )
    }

    /// Normalize into explicit args and kwargs
    pub fn into_parameter(self) -> LookupParameter {
        match self {
            LookupValue::Scalar(arg) => LookupParameter {
                args: vec![arg],
                kwargs: BTreeMap::new(),
            },
            LookupValue::Positional(args) => LookupParameter {
                args,
                kwargs: BTreeMap::new(),
            },
            LookupValue::Named(kwargs) => LookupParameter {
                args: Vec::new(),
                kwargs,
            },
            LookupValue::Structured(parameter) => parameter,
        }
    }

    /// Convert a JSON right-hand side
    ///
    /// Arrays are positional, objects are named unless they only hold `args`
    /// and `kwargs` (structured) or are themselves a nested lookup or a cast.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(LookupValue::Positional(
                items.iter().map(Arg::from_json).collect::<Result<Vec<_>>>()?,
            )),
            Value::Object(map) if map.contains_key("lookup") || is_cast(map) => {
                Ok(LookupValue::Scalar(Arg::from_json(value)?))
            }
            Value::Object(map)
                if !map.is_empty() && map.keys().all(|key| key == "args" || key == "kwargs") =>
            {
                let mut parameter = LookupParameter::new();
                if let Some(args) = map.get("args") {
                    let args = args.as_array().ok_or_else(|| Error::ArgumentType {
                        argument: "args".to_string(),
                        expected: "list".to_string(),
                        found: json_kind(args).to_string(),
                    })?;
                    parameter.args = args.iter().map(Arg::from_json).collect::<Result<Vec<_>>>()?;
                }
                if let Some(kwargs) = map.get("kwargs") {
                    let kwargs = kwargs.as_object().ok_or_else(|| Error::ArgumentType {
                        argument: "kwargs".to_string(),
                        expected: "object".to_string(),
                        found: json_kind(kwargs).to_string(),
                    })?;
                    for (name, arg) in kwargs {
                        parameter.kwargs.insert(name.clone(), Arg::from_json(arg)?);
                    }
                }
                Ok(LookupValue::Structured(parameter))
            }
            Value::Object(map) => {
                let mut kwargs = BTreeMap::new();
                for (name, arg) in map {
                    kwargs.insert(name.clone(), Arg::from_json(arg)?);
                }
                Ok(LookupValue::Named(kwargs))
            }
            other => Ok(LookupValue::Scalar(Arg::from_json(other)?)),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Scalars become a single positional argument
macro_rules! scalar_lookup_value {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for LookupValue {
                fn from(value: $source) -> Self {
                    LookupValue::Scalar(Arg::from(value))
                }
            }
        )+
    };
}

scalar_lookup_value!(Arg, SqlValue, &str, String, i64, f64, bool, ValueCast, Expression);

impl From<LookupParameter> for LookupValue {
    fn from(parameter: LookupParameter) -> Self {
        LookupValue::Structured(parameter)
    }
}

/// A lookup as it arrives over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// Registered lookup name
    pub lookup: String,

    /// Left-hand side as a dotted path; the root key is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Right-hand side
    #[serde(default)]
    pub value: Value,
}

impl LookupRequest {
    pub fn new(lookup: &str, field: Option<&str>, value: Value) -> Self {
        Self {
            lookup: lookup.to_string(),
            field: field.map(str::to_string),
            value,
        }
    }
}

/// Arguments bound to a lookup's declared parameters
struct Bound {
    lookup: &'static str,
    values: BTreeMap<&'static str, Arg>,
}

impl Bound {
    fn bind(kind: LookupKind, parameter: LookupParameter) -> Result<Self> {
        let mut bound = Self {
            lookup: kind.name(),
            values: BTreeMap::new(),
        };
        let declared = kind.parameters();
        let LookupParameter { args, kwargs } = parameter;

        if kind == LookupKind::Proximity && !args.is_empty() {
            // The sequence itself is the argument list
            bound.values.insert("values", Arg::List(args));
        } else if !kind.ignores_args() {
            if args.len() > declared.len() {
                return Err(Error::UnexpectedArgument {
                    lookup: kind.name().to_string(),
                    argument: format!("positional argument {}", declared.len() + 1),
                });
            }
            for (name, arg) in declared.iter().zip(args) {
                bound.values.insert(*name, arg);
            }
        }

        for (name, arg) in kwargs {
            let declared_name = declared
                .iter()
                .find(|declared| **declared == name)
                .ok_or_else(|| Error::UnexpectedArgument {
                    lookup: kind.name().to_string(),
                    argument: name.clone(),
                })?;
            if bound.values.insert(*declared_name, arg).is_some() {
                return Err(Error::UnexpectedArgument {
                    lookup: kind.name().to_string(),
                    argument: format!("{} (given twice)", name),
                });
            }
        }

        Ok(bound)
    }

    fn take(&mut self, name: &'static str) -> Option<Arg> {
        self.values
            .remove(name)
            .filter(|arg| !matches!(arg, Arg::Value(SqlValue::Null)))
    }

    fn require(&mut self, name: &'static str) -> Result<Arg> {
        self.take(name).ok_or_else(|| Error::MissingArgument {
            lookup: self.lookup.to_string(),
            argument: name.to_string(),
        })
    }

    fn value(&mut self, name: &'static str) -> Result<SqlValue> {
        match self.require(name)? {
            Arg::Value(value) => Ok(value),
            other => Err(mismatch(name, "value", &other)),
        }
    }

    fn opt_value(&mut self, name: &'static str) -> Result<Option<SqlValue>> {
        match self.take(name) {
            None => Ok(None),
            Some(Arg::Value(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(name, "value", &other)),
        }
    }

    fn text(&mut self, name: &'static str) -> Result<String> {
        let arg = self.require(name)?;
        into_text(name, arg)
    }

    fn opt_text(&mut self, name: &'static str) -> Result<Option<String>> {
        self.take(name).map(|arg| into_text(name, arg)).transpose()
    }

    fn opt_bool(&mut self, name: &'static str) -> Result<Option<bool>> {
        match self.take(name) {
            None => Ok(None),
            Some(Arg::Value(SqlValue::Boolean(b))) => Ok(Some(b)),
            Some(other) => Err(mismatch(name, "boolean", &other)),
        }
    }

    fn opt_u32(&mut self, name: &'static str) -> Result<Option<u32>> {
        match self.take(name) {
            None => Ok(None),
            Some(Arg::Value(SqlValue::Integer(i))) if i >= 0 && i <= i64::from(u32::MAX) => {
                Ok(Some(i as u32))
            }
            Some(other) => Err(mismatch(name, "non-negative integer", &other)),
        }
    }

    fn number(&mut self, name: &'static str) -> Result<f64> {
        let arg = self.require(name)?;
        into_number(name, arg)
    }

    fn opt_number(&mut self, name: &'static str) -> Result<Option<f64>> {
        self.take(name).map(|arg| into_number(name, arg)).transpose()
    }

    fn expr(&mut self, name: &'static str) -> Result<Expression> {
        match self.require(name)? {
            Arg::Expr(expr) => Ok(*expr),
            other => Err(mismatch(name, "expression", &other)),
        }
    }

    fn exprs(&mut self, name: &'static str) -> Result<Option<Vec<Expression>>> {
        match self.take(name) {
            None => Ok(None),
            Some(Arg::Expr(expr)) => Ok(Some(vec![*expr])),
            Some(Arg::List(items)) => items
                .into_iter()
                .map(|item| match item {
                    Arg::Expr(expr) => Ok(*expr),
                    other => Err(mismatch(name, "expression", &other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(mismatch(name, "list of expressions", &other)),
        }
    }

    fn texts(&mut self, name: &'static str) -> Result<Option<Vec<String>>> {
        match self.take(name) {
            None => Ok(None),
            Some(Arg::List(items)) => items
                .into_iter()
                .map(|item| into_text(name, item))
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(Arg::Value(SqlValue::Array(items))) => items
                .into_iter()
                .map(|item| into_text(name, Arg::Value(item)))
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(mismatch(name, "list of text", &other)),
        }
    }
}

fn into_text(name: &str, arg: Arg) -> Result<String> {
    match arg {
        Arg::Value(SqlValue::Text(text)) => Ok(text),
        other => Err(mismatch(name, "text", &other)),
    }
}

fn into_number(name: &str, arg: Arg) -> Result<f64> {
    match arg {
        Arg::Value(value) => match value.as_float() {
            Some(number) => Ok(number),
            None => Err(mismatch(name, "number", &Arg::Value(value))),
        },
        other => Err(mismatch(name, "number", &other)),
    }
}

fn mismatch(argument: &str, expected: &str, found: &Arg) -> Error {
    Error::ArgumentType {
        argument: argument.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
}

fn column_type_name(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "text",
        ColumnType::Integer => "integer",
        ColumnType::Float => "float",
        ColumnType::Boolean => "boolean",
        ColumnType::Date => "date",
        ColumnType::DateTime => "datetime",
        ColumnType::Json => "json",
        ColumnType::Range => "range",
        ColumnType::Other => "other",
    }
}

/// Render a scalar as text, leaving anything else untouched
fn stringify(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Integer(i) => SqlValue::Text(i.to_string()),
        SqlValue::Float(f) => SqlValue::Text(f.to_string()),
        SqlValue::Boolean(b) => SqlValue::Text(b.to_string()),
        SqlValue::Date(d) => SqlValue::Text(d.to_string()),
        SqlValue::DateTime(dt) => SqlValue::Text(dt.to_string()),
        SqlValue::Array(items) => SqlValue::Array(items.into_iter().map(stringify).collect()),
        other => other,
    }
}

/// Coerce a value to the declared type of the column it is compared with
fn coerce(argument: &str, value: SqlValue, column_type: ColumnType) -> Result<SqlValue> {
    let failed = |value: &SqlValue| Error::ArgumentType {
        argument: argument.to_string(),
        expected: column_type_name(column_type).to_string(),
        found: value.type_name().to_string(),
    };

    match (column_type, value) {
        (_, SqlValue::Null) => Ok(SqlValue::Null),
        (ColumnType::Text, value) => Ok(stringify(value)),
        (ColumnType::Integer, SqlValue::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| failed(&SqlValue::Text(text))),
        (ColumnType::Integer, SqlValue::Float(f)) if f.fract() == 0.0 => Ok(SqlValue::Integer(f as i64)),
        (ColumnType::Float, SqlValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(SqlValue::Float)
            .map_err(|_| failed(&SqlValue::Text(text))),
        (ColumnType::Float, SqlValue::Integer(i)) => Ok(SqlValue::Float(i as f64)),
        (ColumnType::Boolean, SqlValue::Text(text)) => match text.trim() {
            "true" | "t" | "1" => Ok(SqlValue::Boolean(true)),
            "false" | "f" | "0" => Ok(SqlValue::Boolean(false)),
            _ => Err(failed(&SqlValue::Text(text))),
        },
        (ColumnType::Date, SqlValue::Text(text)) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|_| failed(&SqlValue::Text(text))),
        (ColumnType::DateTime, SqlValue::Text(text)) => {
            let trimmed = text.trim();
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                .map(SqlValue::DateTime)
                .map_err(|_| failed(&SqlValue::Text(text)))
        }
        (ColumnType::DateTime, SqlValue::Date(date)) => date
            .and_hms_opt(0, 0, 0)
            .map(SqlValue::DateTime)
            .ok_or_else(|| failed(&SqlValue::Date(date))),
        (_, value) => Ok(value),
    }
}

/// Builds expressions from lookups against one compiler's schema context
#[derive(Debug, Clone, Copy)]
pub struct LookupAdapter<'c> {
    compiler: &'c Compiler<'c>,
}

impl<'c> LookupAdapter<'c> {
    pub fn new(compiler: &'c Compiler<'c>) -> Self {
        Self { compiler }
    }

    /// Adapt a named lookup with `lhs` as its left-hand side
    pub fn adapt(&self, lookup: &str, rhs: LookupValue, lhs: &FieldSpecifier) -> Result<Expression> {
        let kind = LookupKind::from_name(lookup)?;
        self.adapt_kind(kind, rhs, Some(lhs))
    }

    /// Adapt a lookup that has no left-hand side of its own, as happens
    /// inside compound lookups
    pub fn adapt_nested(&self, lookup: &str, rhs: LookupValue) -> Result<Expression> {
        let kind = LookupKind::from_name(lookup)?;
        self.adapt_kind(kind, rhs, None)
    }

    /// Adapt a wire request, nested lookups included
    pub fn adapt_request(&self, request: &LookupRequest) -> Result<Expression> {
        let rhs = LookupValue::from_json(&request.value)?;
        match &request.field {
            Some(field) => self.adapt(&request.lookup, rhs, &FieldSpecifier::parse(field)),
            None => self.adapt_nested(&request.lookup, rhs),
        }
    }

    /// Adapt and compile a wire request under the configured resolution policy
    pub fn compile_request(&self, request: &LookupRequest) -> Result<Compiled> {
        match self.adapt_request(request) {
            Ok(expr) => self.compiler.compile(&expr),
            Err(Error::Resolution(err)) if self.soft_fail() => {
                warn!("Lookup {} matched nothing: {}", request.lookup, err);
                Ok(Compiled::Unresolved(err))
            }
            Err(err) => Err(err),
        }
    }

    fn soft_fail(&self) -> bool {
        self.compiler.resolver().policy() == ResolutionPolicy::SoftFail
    }

    fn adapt_kind(&self, kind: LookupKind, rhs: LookupValue, lhs: Option<&FieldSpecifier>) -> Result<Expression> {
        let mut parameter = rhs.into_parameter();
        let resolved = match lhs {
            Some(lhs) => self.resolve_lhs(lhs)?,
            None => None,
        };
        let options = self.options(&mut parameter.kwargs, resolved.as_ref())?;

        parameter.args = parameter
            .args
            .into_iter()
            .map(|arg| self.expand(arg))
            .collect::<Result<Vec<_>>>()?;
        let mut kwargs = BTreeMap::new();
        for (name, arg) in parameter.kwargs {
            kwargs.insert(name, self.expand(arg)?);
        }
        parameter.kwargs = kwargs;

        let mut bound = Bound::bind(kind, parameter)?;
        if kind.prepares_rhs() && self.compiler.config().prepares_rhs(kind.name()) {
            if let Some(field) = &resolved {
                prepare(kind, &mut bound, field)?;
            }
        }

        let field = if kind.takes_field() {
            Some(lhs.cloned().ok_or_else(|| Error::MissingArgument {
                lookup: kind.name().to_string(),
                argument: "field".to_string(),
            })?)
        } else {
            None
        };

        let expr = build(kind, field, &mut bound)?.with_options(options);
        debug!(
            "Adapted lookup {} on {}",
            kind,
            lhs.map(FieldSpecifier::describe).unwrap_or_else(|| "<root>".to_string())
        );
        Ok(expr)
    }

    /// Resolve the left-hand side; under soft-fail an unresolvable field
    /// falls back to the root model's key
    fn resolve_lhs(&self, lhs: &FieldSpecifier) -> Result<Option<ResolvedField>> {
        match self.compiler.resolver().try_resolve(lhs) {
            Ok(field) => Ok(Some(field)),
            Err(Error::Resolution(err)) if self.soft_fail() => {
                warn!(
                    "Could not resolve lookup field {}, keying on the root model: {}",
                    lhs.describe(),
                    err
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn options(&self, kwargs: &mut BTreeMap<String, Arg>, lhs: Option<&ResolvedField>) -> Result<ExprOptions> {
        let match_op = match kwargs.remove("match_op") {
            None => true,
            Some(Arg::Value(SqlValue::Boolean(b))) => b,
            Some(other) => return Err(mismatch("match_op", "boolean", &other)),
        };
        let force_legacy = match kwargs.remove("legacy") {
            None => false,
            Some(Arg::Value(SqlValue::Boolean(b))) => b,
            Some(other) => return Err(mismatch("legacy", "boolean", &other)),
        };

        let explicit = match (kwargs.remove("key"), kwargs.remove("key_field")) {
            (Some(_), Some(_)) => {
                return Err(Error::UnexpectedArgument {
                    lookup: "key".to_string(),
                    argument: "key_field".to_string(),
                });
            }
            (Some(arg), None) => Some(into_text("key", arg)?),
            (None, Some(arg)) => Some(into_text("key_field", arg)?),
            (None, None) => None,
        };

        let key = match (explicit, lhs) {
            (Some(raw), _) if raw.contains('.') => KeyReference::parse(&raw)?,
            (Some(column), Some(field)) => KeyReference::new(&field.table, &column),
            (Some(column), None) => {
                let root = self.compiler.resolver().root_key()?;
                KeyReference::new(root.table(), &column)
            }
            (None, Some(field)) => field.key.clone(),
            (None, None) => self.compiler.resolver().root_key()?,
        };

        Ok(ExprOptions {
            match_op,
            force_legacy,
            key: Some(key),
        })
    }

    /// Turn nested lookups into expressions
    fn expand(&self, arg: Arg) -> Result<Arg> {
        match arg {
            Arg::Lookup(request) => Ok(Arg::Expr(Box::new(self.adapt_request(&request)?))),
            Arg::List(items) => Ok(Arg::List(
                items
                    .into_iter()
                    .map(|item| self.expand(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Ok(other),
        }
    }
}

/// Prepare the first argument against the field: terms take the column's
/// type, every other lookup compares text
fn prepare(kind: LookupKind, bound: &mut Bound, field: &ResolvedField) -> Result<()> {
    let Some(name) = kind.parameters().first() else {
        return Ok(());
    };
    let Some(arg) = bound.values.get_mut(name) else {
        return Ok(());
    };

    let prepared = match arg {
        Arg::Value(value) if kind == LookupKind::Term => coerce(name, value.clone(), field.column_type)?,
        Arg::Value(value) => stringify(value.clone()),
        Arg::List(items) => {
            for item in items.iter_mut() {
                if let Arg::Value(value) = item {
                    *value = stringify(value.clone());
                }
            }
            return Ok(());
        }
        _ => return Ok(()),
    };
    *arg = Arg::Value(prepared);
    Ok(())
}

fn search_value(arg: Arg) -> Result<SearchValue> {
    match arg {
        Arg::Value(SqlValue::Text(text)) => Ok(SearchValue::Text(text)),
        Arg::Value(SqlValue::Array(items)) => items
            .into_iter()
            .map(|item| into_text("value", Arg::Value(item)))
            .collect::<Result<Vec<_>>>()
            .map(SearchValue::Array),
        Arg::List(items) => items
            .into_iter()
            .map(|item| into_text("value", item))
            .collect::<Result<Vec<_>>>()
            .map(SearchValue::Array),
        Arg::Cast(cast) => Ok(SearchValue::Cast(cast)),
        Arg::Expr(expr) => Ok(SearchValue::Query(expr)),
        other => Err(mismatch("value", "text, list, cast or expression", &other)),
    }
}

fn proximity_values(arg: Arg) -> Result<Vec<ProximityValue>> {
    let items = match arg {
        Arg::List(items) => items,
        other => return Err(mismatch("values", "list", &other)),
    };
    items
        .iter()
        .map(|item| {
            let json = item
                .to_json()
                .ok_or_else(|| mismatch("values", "text, integer, regex or list", item))?;
            ProximityValue::from_json(&json)
        })
        .collect()
}

fn build(kind: LookupKind, field: Option<FieldSpecifier>, bound: &mut Bound) -> Result<Expression> {
    // `takes_field` guarantees a field for every arm that reads one
    let lhs = || {
        field.clone().ok_or_else(|| Error::MissingArgument {
            lookup: kind.name().to_string(),
            argument: "field".to_string(),
        })
    };

    let expr: Expression = match kind {
        LookupKind::All => All::new().into(),
        LookupKind::Empty => Empty::new().into(),
        LookupKind::Bm25Score => Score::new().into(),
        LookupKind::PdbExists => Exists::new(lhs()?).into(),
        LookupKind::PdbSearch
        | LookupKind::MatchV2
        | LookupKind::MatchV2Conjunction
        | LookupKind::PhraseV2
        | LookupKind::TermV2 => {
            let value = search_value(bound.require("value")?)?;
            let mut search = Search::new(lhs()?, value)?;
            if let Some(op) = kind.operator() {
                search = search.operator(op);
            }
            if let Some(escaped) = bound.opt_bool("escaped")? {
                search = search.escaped(escaped);
            }
            search.into()
        }
        LookupKind::Match => {
            let mut node = Match::new(lhs()?, &bound.text("value")?);
            if let Some(distance) = bound.opt_u32("distance")? {
                node = node.distance(distance);
            }
            if let Some(enabled) = bound.opt_bool("conjunction_mode")? {
                node = node.conjunction_mode(enabled);
            }
            if let Some(tokenizer) = bound.opt_text("tokenizer")? {
                node = node.tokenizer(tokenizer.parse::<Tokenizer>()?);
            }
            if let Some(enabled) = bound.opt_bool("transposition_cost_one")? {
                node = node.transposition_cost_one(enabled);
            }
            if let Some(enabled) = bound.opt_bool("prefix")? {
                node = node.prefix(enabled);
            }
            if let Some(enabled) = bound.opt_bool("escaped")? {
                node = node.escaped(enabled);
            }
            node.into()
        }
        LookupKind::PdbRange => {
            let range_type = bound.text("range_type")?.parse::<RangeType>()?;
            let start = bound.value("start")?;
            let end = bound.opt_value("end")?;
            let mut node = Range::new(lhs()?, range_type, start, end)?;
            if let Some(bounds) = bound.opt_text("bounds")? {
                node = node.bounds(bounds.parse::<RangeBounds>()?);
            }
            node.into()
        }
        LookupKind::RangeTerm => {
            let value = bound.value("term_or_range")?;
            let cast = bound.text("cast")?.parse::<RangeCast>()?;
            let mut node = RangeTerm::new(lhs()?, value, cast)?;
            if let Some(relation) = bound.opt_text("relation")? {
                node = node.relation(relation.parse::<RangeRelation>()?);
            }
            node.into()
        }
        LookupKind::PdbRegex => Regex::new(lhs()?, &bound.text("pattern")?).into(),
        LookupKind::Term => {
            let mut node = Term::new(lhs()?, bound.value("value")?);
            if let Some(type_name) = bound.opt_text("enum_cast")? {
                node = node.enum_cast(&type_name)?;
            }
            node.into()
        }
        LookupKind::TermSet => {
            let terms = bound
                .exprs("terms")?
                .ok_or_else(|| Error::MissingArgument {
                    lookup: kind.name().to_string(),
                    argument: "terms".to_string(),
                })?
                .into_iter()
                .map(|expr| match expr {
                    Expression::Term(term) => Ok(term),
                    other => Err(Error::ArgumentType {
                        argument: "terms".to_string(),
                        expected: "term".to_string(),
                        found: other.function().to_string(),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            TermSet::new(terms)?.into()
        }
        LookupKind::FuzzyTerm => {
            let mut node = FuzzyTerm::new(lhs()?, &bound.text("value")?);
            if let Some(distance) = bound.opt_u32("distance")? {
                node = node.distance(distance);
            }
            if let Some(enabled) = bound.opt_bool("transposition_cost_one")? {
                node = node.transposition_cost_one(enabled);
            }
            if let Some(enabled) = bound.opt_bool("prefix")? {
                node = node.prefix(enabled);
            }
            node.into()
        }
        LookupKind::Phrase => {
            let phrases = required_texts(bound, kind, "phrases")?;
            let mut node = Phrase::new(lhs()?, phrases)?;
            if let Some(slop) = bound.opt_u32("slop")? {
                node = node.slop(slop);
            }
            node.into()
        }
        LookupKind::PhrasePrefix => {
            let phrases = required_texts(bound, kind, "phrases")?;
            let mut node = PhrasePrefix::new(lhs()?, phrases)?;
            if let Some(max) = bound.opt_u32("max_expansion")? {
                node = node.max_expansion(max);
            }
            node.into()
        }
        LookupKind::ConstScore => {
            let score = bound.number("score")?;
            ConstScore::new(score, bound.expr("query")?)?.into()
        }
        LookupKind::Boost => {
            let factor = bound.number("factor")?;
            Boost::new(factor, bound.expr("query")?)?.into()
        }
        LookupKind::DisjunctionMax => {
            let disjuncts = bound.exprs("disjuncts")?.unwrap_or_default();
            let mut node = DisjunctionMax::new(disjuncts)?;
            if let Some(tie_breaker) = bound.opt_number("tie_breaker")? {
                node = node.tie_breaker(tie_breaker)?;
            }
            node.into()
        }
        LookupKind::Boolean => Boolean::new(
            bound.exprs("must")?.unwrap_or_default(),
            bound.exprs("must_not")?.unwrap_or_default(),
            bound.exprs("should")?.unwrap_or_default(),
        )?
        .into(),
        LookupKind::MoreLikeThis => more_like_this(bound)?.into(),
        LookupKind::ParseWithField => {
            let mut node = ParseWithField::new(lhs()?, &bound.text("query")?);
            if let Some(enabled) = bound.opt_bool("lenient")? {
                node = node.lenient(enabled);
            }
            if let Some(enabled) = bound.opt_bool("conjunction_mode")? {
                node = node.conjunction_mode(enabled);
            }
            node.into()
        }
        LookupKind::Parse => {
            let mut node = Parse::new(&bound.text("query")?);
            if let Some(enabled) = bound.opt_bool("lenient")? {
                node = node.lenient(enabled);
            }
            if let Some(enabled) = bound.opt_bool("conjunction_mode")? {
                node = node.conjunction_mode(enabled);
            }
            node.into()
        }
        LookupKind::Snippet => {
            let mut node = Snippet::new(lhs()?);
            if let Some(limit) = bound.opt_u32("limit")? {
                node = node.limit(limit);
            }
            if let Some(offset) = bound.opt_u32("offset")? {
                node = node.offset(offset);
            }
            if let Some(tag) = bound.opt_text("start_tag")? {
                node = node.start_tag(&tag);
            }
            if let Some(tag) = bound.opt_text("end_tag")? {
                node = node.end_tag(&tag);
            }
            if let Some(max) = bound.opt_u32("max_num_chars")? {
                node = node.max_num_chars(max);
            }
            node.into()
        }
        LookupKind::Proximity => {
            let values = proximity_values(bound.require("values")?)?;
            Proximity::new(values)?.field(lhs()?).into()
        }
    };

    Ok(expr)
}

fn required_texts(bound: &mut Bound, kind: LookupKind, name: &'static str) -> Result<Vec<String>> {
    bound.texts(name)?.ok_or_else(|| Error::MissingArgument {
        lookup: kind.name().to_string(),
        argument: name.to_string(),
    })
}

fn more_like_this(bound: &mut Bound) -> Result<MoreLikeThis> {
    let document = match bound.take("document") {
        None => None,
        Some(Arg::Value(SqlValue::Json(Value::Object(map)))) => Some(map),
        Some(other) => return Err(mismatch("document", "object", &other)),
    };
    let mut node = MoreLikeThis::new(bound.opt_value("document_id")?, document)?;

    if let Some(fields) = bound.texts("fields")? {
        node = node.fields(fields)?;
    }
    if let Some(value) = bound.opt_u32("min_doc_frequency")? {
        node = node.min_doc_frequency(value);
    }
    if let Some(value) = bound.opt_u32("max_doc_frequency")? {
        node = node.max_doc_frequency(value);
    }
    if let Some(value) = bound.opt_u32("min_term_frequency")? {
        node = node.min_term_frequency(value);
    }
    if let Some(value) = bound.opt_u32("max_query_terms")? {
        node = node.max_query_terms(value);
    }
    if let Some(value) = bound.opt_u32("min_word_length")? {
        node = node.min_word_length(value);
    }
    if let Some(value) = bound.opt_u32("max_word_length")? {
        node = node.max_word_length(value);
    }
    if let Some(value) = bound.opt_number("boost_factor")? {
        node = node.boost_factor(value)?;
    }
    if let Some(words) = bound.texts("stop_words")? {
        node = node.stop_words(words);
    }
    Ok(node)
}
