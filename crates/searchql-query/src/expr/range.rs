//! Range queries over scalar and range-typed columns

use super::ExprOptions;
use crate::compiler::{Position, Session};
use crate::dialect;
use crate::fragment::{CompiledFragment, PLACEHOLDER};
use searchql_core::{Error, FieldSpecifier, Result, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Range constructor used to build the queried interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    Int4Range,
    Int8Range,
    DateRange,
    TsRange,
    TstzRange,
}

impl RangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeType::Int4Range => "int4range",
            RangeType::Int8Range => "int8range",
            RangeType::DateRange => "daterange",
            RangeType::TsRange => "tsrange",
            RangeType::TstzRange => "tstzrange",
        }
    }

    /// Whether a bound value fits this range type
    fn accepts(&self, value: &SqlValue) -> bool {
        match self {
            RangeType::Int4Range | RangeType::Int8Range => matches!(value, SqlValue::Integer(_)),
            RangeType::DateRange => matches!(value, SqlValue::Date(_) | SqlValue::Text(_)),
            RangeType::TsRange | RangeType::TstzRange => matches!(
                value,
                SqlValue::DateTime(_) | SqlValue::Date(_) | SqlValue::Text(_)
            ),
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int4range" => Ok(RangeType::Int4Range),
            "int8range" => Ok(RangeType::Int8Range),
            "daterange" => Ok(RangeType::DateRange),
            "tsrange" => Ok(RangeType::TsRange),
            "tstzrange" => Ok(RangeType::TstzRange),
            other => Err(Error::validation("Range", format!("invalid range type '{}'", other))),
        }
    }
}

/// Interval bracket notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangeBounds {
    #[default]
    #[serde(rename = "[)")]
    InclusiveLowerExclusiveUpper,
    #[serde(rename = "(]")]
    ExclusiveLowerInclusiveUpper,
    #[serde(rename = "[]")]
    InclusiveBoth,
    #[serde(rename = "()")]
    ExclusiveBoth,
}

impl RangeBounds {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeBounds::InclusiveLowerExclusiveUpper => "[)",
            RangeBounds::ExclusiveLowerInclusiveUpper => "(]",
            RangeBounds::InclusiveBoth => "[]",
            RangeBounds::ExclusiveBoth => "()",
        }
    }
}

impl FromStr for RangeBounds {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "[)" => Ok(RangeBounds::InclusiveLowerExclusiveUpper),
            "(]" => Ok(RangeBounds::ExclusiveLowerInclusiveUpper),
            "[]" => Ok(RangeBounds::InclusiveBoth),
            "()" => Ok(RangeBounds::ExclusiveBoth),
            other => Err(Error::validation("Range", format!("invalid bounds '{}'", other))),
        }
    }
}

/// Values inside an interval
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    field: FieldSpecifier,
    range_type: RangeType,
    start: SqlValue,
    end: Option<SqlValue>,
    bounds: RangeBounds,
    pub(crate) options: ExprOptions,
}

impl Range {
    /// Create a range; a missing end leaves the interval unbounded above
    pub fn new(
        field: impl Into<FieldSpecifier>,
        range_type: RangeType,
        start: impl Into<SqlValue>,
        end: Option<SqlValue>,
    ) -> Result<Self> {
        let start = start.into();
        let end = end.filter(|value| !value.is_null());

        if !range_type.accepts(&start) {
            return Err(Error::validation(
                "Range",
                format!("{} start cannot be {}", range_type, start.type_name()),
            ));
        }
        if let Some(end) = &end {
            if !range_type.accepts(end) {
                return Err(Error::validation(
                    "Range",
                    format!("{} end cannot be {}", range_type, end.type_name()),
                ));
            }
        }

        Ok(Self {
            field: field.into(),
            range_type,
            start,
            end,
            bounds: RangeBounds::default(),
            options: ExprOptions::default(),
        })
    }

    pub fn bounds(mut self, bounds: RangeBounds) -> Self {
        self.bounds = bounds;
        self
    }

    fn interval(&self) -> CompiledFragment {
        let mut params = vec![self.start.clone()];
        let end = match &self.end {
            Some(end) => {
                params.push(end.clone());
                PLACEHOLDER
            }
            None => "NULL",
        };
        CompiledFragment::new(
            format!(
                "{}({}, {}, '{}')",
                self.range_type,
                PLACEHOLDER,
                end,
                self.bounds.as_str()
            ),
            params,
        )
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::RANGE, &self.field, &self.options, position, |call| {
            call.named_splice("range", self.interval());
            Ok(())
        })
    }
}

/// Casts a `RangeTerm` value may be compared as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeCast {
    #[serde(rename = "int4range")]
    Int4Range,
    #[serde(rename = "int8range")]
    Int8Range,
    #[serde(rename = "numrange")]
    NumRange,
    #[serde(rename = "daterange")]
    DateRange,
    #[serde(rename = "tsrange")]
    TsRange,
    #[serde(rename = "tstzrange")]
    TstzRange,
    #[serde(rename = "\"char\"")]
    Char,
    #[serde(rename = "smallint")]
    SmallInt,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "bigint")]
    BigInt,
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "real")]
    Real,
    #[serde(rename = "double precision")]
    DoublePrecision,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "timestamp with time zone")]
    TimestampTz,
    #[serde(rename = "timestamp without time zone")]
    Timestamp,
}

impl RangeCast {
    pub const ALL: [RangeCast; 16] = [
        RangeCast::Int4Range,
        RangeCast::Int8Range,
        RangeCast::NumRange,
        RangeCast::DateRange,
        RangeCast::TsRange,
        RangeCast::TstzRange,
        RangeCast::Char,
        RangeCast::SmallInt,
        RangeCast::Integer,
        RangeCast::BigInt,
        RangeCast::Numeric,
        RangeCast::Real,
        RangeCast::DoublePrecision,
        RangeCast::Date,
        RangeCast::TimestampTz,
        RangeCast::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeCast::Int4Range => "int4range",
            RangeCast::Int8Range => "int8range",
            RangeCast::NumRange => "numrange",
            RangeCast::DateRange => "daterange",
            RangeCast::TsRange => "tsrange",
            RangeCast::TstzRange => "tstzrange",
            RangeCast::Char => "\"char\"",
            RangeCast::SmallInt => "smallint",
            RangeCast::Integer => "integer",
            RangeCast::BigInt => "bigint",
            RangeCast::Numeric => "numeric",
            RangeCast::Real => "real",
            RangeCast::DoublePrecision => "double precision",
            RangeCast::Date => "date",
            RangeCast::TimestampTz => "timestamp with time zone",
            RangeCast::Timestamp => "timestamp without time zone",
        }
    }

    /// Whether the cast produces a range rather than a scalar
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            RangeCast::Int4Range
                | RangeCast::Int8Range
                | RangeCast::NumRange
                | RangeCast::DateRange
                | RangeCast::TsRange
                | RangeCast::TstzRange
        )
    }
}

impl fmt::Display for RangeCast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeCast {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RangeCast::ALL
            .into_iter()
            .find(|cast| cast.as_str() == s || (*cast == RangeCast::Char && s == "char"))
            .ok_or_else(|| Error::validation("RangeTerm", format!("invalid cast '{}'", s)))
    }
}

/// How a queried range relates to the indexed range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeRelation {
    Intersects,
    Within,
    Contains,
}

impl RangeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeRelation::Intersects => "Intersects",
            RangeRelation::Within => "Within",
            RangeRelation::Contains => "Contains",
        }
    }
}

impl FromStr for RangeRelation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Intersects" => Ok(RangeRelation::Intersects),
            "Within" => Ok(RangeRelation::Within),
            "Contains" => Ok(RangeRelation::Contains),
            other => Err(Error::validation("RangeTerm", format!("invalid relation '{}'", other))),
        }
    }
}

/// A term or range compared against a range-typed column
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTerm {
    field: FieldSpecifier,
    value: SqlValue,
    cast: RangeCast,
    relation: Option<RangeRelation>,
    pub(crate) options: ExprOptions,
}

impl RangeTerm {
    pub fn new(field: impl Into<FieldSpecifier>, value: impl Into<SqlValue>, cast: RangeCast) -> Result<Self> {
        let value = match value.into() {
            SqlValue::Text(text) => SqlValue::Text(strip_quotes(&text).to_string()),
            other => other,
        };

        if value.is_null() {
            return Err(Error::validation("RangeTerm", "value cannot be null"));
        }
        if cast.is_range() {
            let shaped = value.as_str().is_some_and(is_range_literal);
            if !shaped {
                return Err(Error::validation(
                    "RangeTerm",
                    format!("{} expects a range literal such as '[1,5)'", cast),
                ));
            }
        }

        Ok(Self {
            field: field.into(),
            value,
            cast,
            relation: None,
            options: ExprOptions::default(),
        })
    }

    pub fn relation(mut self, relation: RangeRelation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::RANGE_TERM, &self.field, &self.options, position, |call| {
            call.bind_cast(self.value.clone(), self.cast.as_str());
            if let Some(relation) = self.relation {
                call.inline(format!("'{}'", relation.as_str()));
            }
            Ok(())
        })
    }
}

/// Drop one pair of surrounding single quotes
fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .unwrap_or(text)
}

fn is_range_literal(text: &str) -> bool {
    let text = text.trim();
    (text.starts_with('[') || text.starts_with('('))
        && (text.ends_with(']') || text.ends_with(')'))
        && text.contains(',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{legacy, v2};
    use crate::expr::ExprBuilder;
    use chrono::NaiveDate;

    #[test]
    fn test_range_legacy() {
        let range = Range::new("rank", RangeType::Int4Range, 1i64, Some(10i64.into())).unwrap();
        let fragment = legacy(range);
        assert_eq!(fragment.text, "paradedb.range(%s, range:=int4range(%s, %s, '[)'))");
        assert_eq!(
            fragment.params,
            vec![SqlValue::from("rank"), SqlValue::Integer(1), SqlValue::Integer(10)]
        );
    }

    #[test]
    fn test_range_v2_unbounded() {
        let range = Range::new("rank", RangeType::Int8Range, 5i64, None)
            .unwrap()
            .bounds(RangeBounds::ExclusiveBoth);
        let fragment = v2(range.match_op(true));
        assert_eq!(
            fragment.text,
            "article.rank @@@ pdb.range(range:=int8range(%s, NULL, '()'))"
        );
        assert_eq!(fragment.params, vec![SqlValue::Integer(5)]);
    }

    #[test]
    fn test_range_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let range = Range::new("published", RangeType::DateRange, start, Some(end.into()))
            .unwrap()
            .bounds(RangeBounds::InclusiveBoth);
        let fragment = legacy(range);
        assert!(fragment.text.ends_with("daterange(%s, %s, '[]'))"));
        assert_eq!(fragment.params[1], SqlValue::Date(start));
    }

    #[test]
    fn test_range_type_mismatch() {
        let err = Range::new("rank", RangeType::Int4Range, "soon", None).unwrap_err();
        assert!(err.is_validation());
        assert!(Range::new("rank", RangeType::DateRange, 3i64, None).is_err());
    }

    #[test]
    fn test_bounds_and_types_parse() {
        assert_eq!("(]".parse::<RangeBounds>().unwrap(), RangeBounds::ExclusiveLowerInclusiveUpper);
        assert!("<>".parse::<RangeBounds>().is_err());
        assert_eq!("tstzrange".parse::<RangeType>().unwrap(), RangeType::TstzRange);
        assert!("intrange".parse::<RangeType>().is_err());
        assert_eq!(RangeBounds::default().as_str(), "[)");
    }

    #[test]
    fn test_range_term() {
        let term = RangeTerm::new("weight_range", "'[1,5)'", RangeCast::Int4Range)
            .unwrap()
            .relation(RangeRelation::Within);
        let fragment = legacy(term);
        assert_eq!(
            fragment.text,
            "paradedb.range_term(%s, %s::int4range, 'Within')"
        );
        assert_eq!(fragment.params[1], SqlValue::from("[1,5)"));

        let fragment = v2(RangeTerm::new("weight_range", 3i64, RangeCast::Integer).unwrap());
        assert_eq!(fragment.text, "article.weight_range @@@ pdb.range_term(%s::integer)");
    }

    #[test]
    fn test_range_term_validation() {
        assert!(RangeTerm::new("weight_range", "five", RangeCast::Int4Range).is_err());
        assert!(RangeTerm::new("weight_range", 5i64, RangeCast::DateRange).is_err());
        assert!(RangeTerm::new("weight_range", SqlValue::Null, RangeCast::Integer).is_err());
    }

    #[test]
    fn test_range_cast_names() {
        assert_eq!("\"char\"".parse::<RangeCast>().unwrap(), RangeCast::Char);
        assert_eq!("double precision".parse::<RangeCast>().unwrap(), RangeCast::DoublePrecision);
        assert!("varchar".parse::<RangeCast>().is_err());
        assert_eq!(
            serde_json::to_string(&RangeCast::TimestampTz).unwrap(),
            "\"timestamp with time zone\""
        );
    }
}
