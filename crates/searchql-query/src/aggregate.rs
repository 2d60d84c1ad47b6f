//! Aggregation nodes
//!
//! Aggregations never compile to predicates. Each node becomes a JSON
//! request bound as the single parameter of `pdb.agg(%s)`; bucket
//! aggregations carry sub-aggregations keyed by caller-supplied alias.

use chrono::{NaiveDate, NaiveDateTime};
use searchql_core::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Resolves an aggregation field name to the indexed column name
pub type FieldMapper<'a> = &'a dyn Fn(&str) -> Result<String>;

fn default_true() -> bool {
    true
}

fn default_count_field() -> String {
    "id".to_string()
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// `missing` must be a plain scalar
fn check_missing(node: &'static str, missing: &Option<Value>) -> Result<()> {
    match missing {
        None | Some(Value::Number(_)) | Some(Value::String(_)) | Some(Value::Bool(_)) => Ok(()),
        Some(other) => Err(Error::validation(
            node,
            format!("missing must be a scalar, got {}", other),
        )),
    }
}

fn check_field(node: &'static str, field: &str) -> Result<()> {
    if field.trim().is_empty() {
        return Err(Error::validation(node, "field cannot be empty"));
    }
    Ok(())
}

// ===== Sub-aggregations =====

/// Named child aggregations, aliases unique
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SubAggregations(BTreeMap<String, Aggregation>);

impl SubAggregations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child; a repeated alias is an error
    pub fn insert(&mut self, alias: &str, aggregation: Aggregation) -> Result<()> {
        if alias.is_empty() {
            return Err(Error::validation("Aggregation", "alias cannot be empty"));
        }
        if self.0.contains_key(alias) {
            return Err(Error::validation(
                "Aggregation",
                format!("duplicate alias '{}'", alias),
            ));
        }
        self.0.insert(alias.to_string(), aggregation);
        Ok(())
    }

    /// Builder form of `insert`
    pub fn with(mut self, alias: &str, aggregation: impl Into<Aggregation>) -> Result<Self> {
        self.insert(alias, aggregation.into())?;
        Ok(self)
    }

    pub fn get(&self, alias: &str) -> Option<&Aggregation> {
        self.0.get(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Aggregation)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(&self) -> Result<()> {
        self.0.values().try_for_each(Aggregation::validate)
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let mut aggs = Map::new();
        for (alias, aggregation) in &self.0 {
            aggs.insert(alias.clone(), aggregation.to_json(field)?);
        }
        Ok(Value::Object(aggs))
    }
}

impl<'de> Deserialize<'de> for SubAggregations {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AliasVisitor;

        impl<'de> Visitor<'de> for AliasVisitor {
            type Value = SubAggregations;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of aggregation aliases")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut aggs = SubAggregations::new();
                while let Some((alias, aggregation)) = access.next_entry::<String, Aggregation>()? {
                    aggs.insert(&alias, aggregation)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(aggs)
            }
        }

        deserializer.deserialize_map(AliasVisitor)
    }
}

fn with_aggs(mut request: Value, aggs: &SubAggregations, field: FieldMapper<'_>) -> Result<Value> {
    if !aggs.is_empty() {
        if let Value::Object(map) = &mut request {
            map.insert("aggs".to_string(), aggs.to_json(field)?);
        }
    }
    Ok(request)
}

// ===== Bucket aggregations =====

/// `value_count` over a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Count {
    #[serde(default = "default_count_field")]
    field: String,
}

impl Count {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

impl Default for Count {
    fn default() -> Self {
        Self {
            field: default_count_field(),
        }
    }
}

/// Ordering of term buckets by `_count`, `_key` or a sub-aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsOrder {
    pub target: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl TermsOrder {
    pub fn new(target: &str, order: SortOrder) -> Self {
        Self {
            target: target.to_string(),
            order,
        }
    }
}

/// One bucket per distinct term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    field: String,
    #[serde(default)]
    order: Option<TermsOrder>,
    #[serde(default)]
    size: u32,
    #[serde(default)]
    segment_size: u32,
    #[serde(default)]
    min_doc_count: u64,
    #[serde(default)]
    missing: Option<Value>,
    #[serde(default)]
    show_term_doc_count_error: bool,
    #[serde(default)]
    aggs: SubAggregations,
}

impl Terms {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: None,
            size: 0,
            segment_size: 0,
            min_doc_count: 0,
            missing: None,
            show_term_doc_count_error: false,
            aggs: SubAggregations::new(),
        }
    }

    pub fn order(mut self, order: TermsOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Number of buckets returned, zero keeps the engine default
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn segment_size(mut self, size: u32) -> Self {
        self.segment_size = size;
        self
    }

    pub fn min_doc_count(mut self, count: u64) -> Self {
        self.min_doc_count = count;
        self
    }

    pub fn missing(mut self, missing: impl Into<Value>) -> Result<Self> {
        self.missing = Some(missing.into());
        check_missing("Terms", &self.missing)?;
        Ok(self)
    }

    pub fn show_term_doc_count_error(mut self, enabled: bool) -> Self {
        self.show_term_doc_count_error = enabled;
        self
    }

    pub fn aggs(mut self, aggs: SubAggregations) -> Self {
        self.aggs = aggs;
        self
    }

    fn validate(&self) -> Result<()> {
        check_field("Terms", &self.field)?;
        check_missing("Terms", &self.missing)?;
        if let Some(order) = &self.order {
            if order.target.is_empty() {
                return Err(Error::validation("Terms", "order target cannot be empty"));
            }
        }
        self.aggs.validate()
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let mut terms = Map::new();
        terms.insert("field".into(), Value::String(field(&self.field)?));
        if let Some(order) = &self.order {
            terms.insert("order".into(), json!({ order.target.clone(): order.order.as_str() }));
        }
        if self.size > 0 {
            terms.insert("size".into(), json!(self.size));
        }
        if self.segment_size > 0 {
            terms.insert("segment_size".into(), json!(self.segment_size));
        }
        if self.min_doc_count > 0 {
            terms.insert("min_doc_count".into(), json!(self.min_doc_count));
        }
        if let Some(missing) = &self.missing {
            terms.insert("missing".into(), missing.clone());
        }
        if self.show_term_doc_count_error {
            terms.insert("show_term_doc_count_error".into(), Value::Bool(true));
        }
        with_aggs(json!({ "terms": terms }), &self.aggs, field)
    }
}

/// Closed interval used for histogram bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBounds {
    pub min: f64,
    pub max: f64,
}

impl HistogramBounds {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::validation(
                "HistogramBounds",
                format!("invalid bounds [{}, {}]", self.min, self.max),
            ));
        }
        Ok(())
    }

    fn to_json(self) -> Value {
        json!({ "min": self.min, "max": self.max })
    }
}

/// Options shared by numeric and date histograms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HistogramOptions {
    #[serde(default)]
    min_doc_count: Option<u64>,
    #[serde(default)]
    hard_bounds: Option<HistogramBounds>,
    #[serde(default)]
    extended_bounds: Option<HistogramBounds>,
    #[serde(default = "default_true")]
    keyed: bool,
    #[serde(default)]
    aggs: SubAggregations,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            min_doc_count: None,
            hard_bounds: None,
            extended_bounds: None,
            keyed: true,
            aggs: SubAggregations::new(),
        }
    }
}

impl HistogramOptions {
    fn validate(&self, node: &'static str) -> Result<()> {
        if self.min_doc_count.is_some() && self.extended_bounds.is_some() {
            return Err(Error::validation(
                node,
                "cannot set both min_doc_count and extended_bounds",
            ));
        }
        if self.extended_bounds.is_some() && self.hard_bounds.is_none() {
            return Err(Error::validation(
                node,
                "cannot set extended_bounds without hard_bounds",
            ));
        }
        for bounds in self.hard_bounds.iter().chain(self.extended_bounds.iter()) {
            bounds.validate()?;
        }
        self.aggs.validate()
    }

    fn extend(&self, body: &mut Map<String, Value>) {
        if let Some(count) = self.min_doc_count {
            body.insert("min_doc_count".into(), json!(count));
        }
        if let Some(bounds) = self.hard_bounds {
            body.insert("hard_bounds".into(), bounds.to_json());
        }
        if let Some(bounds) = self.extended_bounds {
            body.insert("extended_bounds".into(), bounds.to_json());
        }
        body.insert("keyed".into(), Value::Bool(self.keyed));
    }
}

macro_rules! histogram_builders {
    ($node:ident) => {
        impl $node {
            pub fn min_doc_count(mut self, count: u64) -> Result<Self> {
                self.options.min_doc_count = Some(count);
                self.options.validate(stringify!($node))?;
                Ok(self)
            }

            pub fn hard_bounds(mut self, bounds: HistogramBounds) -> Self {
                self.options.hard_bounds = Some(bounds);
                self
            }

            /// Requires `hard_bounds` to be set first
            pub fn extended_bounds(mut self, bounds: HistogramBounds) -> Result<Self> {
                self.options.extended_bounds = Some(bounds);
                self.options.validate(stringify!($node))?;
                Ok(self)
            }

            pub fn keyed(mut self, keyed: bool) -> Self {
                self.options.keyed = keyed;
                self
            }

            pub fn aggs(mut self, aggs: SubAggregations) -> Self {
                self.options.aggs = aggs;
                self
            }
        }
    };
}

/// Fixed-width numeric buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    field: String,
    interval: f64,
    #[serde(default)]
    offset: Option<f64>,
    #[serde(default)]
    is_normalized_to_ns: bool,
    #[serde(flatten)]
    options: HistogramOptions,
}

impl Histogram {
    pub fn new(field: &str, interval: f64) -> Result<Self> {
        let histogram = Self {
            field: field.to_string(),
            interval,
            offset: None,
            is_normalized_to_ns: false,
            options: HistogramOptions::default(),
        };
        histogram.validate()?;
        Ok(histogram)
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_normalized_to_ns(mut self, enabled: bool) -> Self {
        self.is_normalized_to_ns = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        check_field("Histogram", &self.field)?;
        if !self.interval.is_finite() || self.interval <= 0.0 {
            return Err(Error::validation("Histogram", "interval must be positive"));
        }
        self.options.validate("Histogram")
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let mut body = Map::new();
        body.insert("field".into(), Value::String(field(&self.field)?));
        body.insert("interval".into(), json!(self.interval));
        if let Some(offset) = self.offset {
            body.insert("offset".into(), json!(offset));
        }
        self.options.extend(&mut body);
        body.insert("is_normalized_to_ns".into(), Value::Bool(self.is_normalized_to_ns));
        with_aggs(json!({ "histogram": body }), &self.options.aggs, field)
    }
}

histogram_builders!(Histogram);

/// Fixed-interval date buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateHistogram {
    field: String,
    fixed_interval: String,
    #[serde(default)]
    offset: Option<String>,
    #[serde(flatten)]
    options: HistogramOptions,
}

impl DateHistogram {
    /// `fixed_interval` uses engine units, e.g. `30d` or `1h`
    pub fn new(field: &str, fixed_interval: &str) -> Result<Self> {
        let histogram = Self {
            field: field.to_string(),
            fixed_interval: fixed_interval.to_string(),
            offset: None,
            options: HistogramOptions::default(),
        };
        histogram.validate()?;
        Ok(histogram)
    }

    pub fn offset(mut self, offset: &str) -> Self {
        self.offset = Some(offset.to_string());
        self
    }

    fn validate(&self) -> Result<()> {
        check_field("DateHistogram", &self.field)?;
        if self.fixed_interval.trim().is_empty() {
            return Err(Error::validation("DateHistogram", "fixed_interval cannot be empty"));
        }
        self.options.validate("DateHistogram")
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let mut body = Map::new();
        body.insert("field".into(), Value::String(field(&self.field)?));
        body.insert("fixed_interval".into(), Value::String(self.fixed_interval.clone()));
        if let Some(offset) = &self.offset {
            body.insert("offset".into(), Value::String(offset.clone()));
        }
        self.options.extend(&mut body);
        with_aggs(json!({ "date_histogram": body }), &self.options.aggs, field)
    }
}

histogram_builders!(DateHistogram);

/// Edge of a range bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketBound {
    Number(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl BucketBound {
    /// Dates become UTC epoch seconds
    fn to_json(self) -> Value {
        match self {
            BucketBound::Number(value) => json!(value),
            BucketBound::DateTime(value) => json!(value.and_utc().timestamp() as f64),
            BucketBound::Date(value) => json!(value
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc().timestamp() as f64)),
        }
    }
}

impl From<f64> for BucketBound {
    fn from(value: f64) -> Self {
        BucketBound::Number(value)
    }
}

impl From<i64> for BucketBound {
    fn from(value: i64) -> Self {
        BucketBound::Number(value as f64)
    }
}

impl From<NaiveDate> for BucketBound {
    fn from(value: NaiveDate) -> Self {
        BucketBound::Date(value)
    }
}

impl From<NaiveDateTime> for BucketBound {
    fn from(value: NaiveDateTime) -> Self {
        BucketBound::DateTime(value)
    }
}

/// One bucket of a range aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBucket {
    #[serde(default)]
    pub from: Option<BucketBound>,
    #[serde(default)]
    pub to: Option<BucketBound>,
    #[serde(default)]
    pub key: Option<String>,
}

impl RangeBucket {
    pub fn new(from: Option<BucketBound>, to: Option<BucketBound>) -> Self {
        Self { from, to, key: None }
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    fn to_json(&self) -> Value {
        let mut bucket = Map::new();
        if let Some(from) = self.from {
            bucket.insert("from".into(), from.to_json());
        }
        if let Some(to) = self.to {
            bucket.insert("to".into(), to.to_json());
        }
        if let Some(key) = &self.key {
            bucket.insert("key".into(), Value::String(key.clone()));
        }
        Value::Object(bucket)
    }
}

/// Buckets over explicit ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeAggregation {
    field: String,
    ranges: Vec<RangeBucket>,
    #[serde(default = "default_true")]
    keyed: bool,
    #[serde(default)]
    aggs: SubAggregations,
}

impl RangeAggregation {
    pub fn new(field: &str, ranges: Vec<RangeBucket>) -> Result<Self> {
        let aggregation = Self {
            field: field.to_string(),
            ranges,
            keyed: true,
            aggs: SubAggregations::new(),
        };
        aggregation.validate()?;
        Ok(aggregation)
    }

    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = keyed;
        self
    }

    pub fn aggs(mut self, aggs: SubAggregations) -> Self {
        self.aggs = aggs;
        self
    }

    fn validate(&self) -> Result<()> {
        check_field("Range", &self.field)?;
        if self.ranges.is_empty() {
            return Err(Error::validation("Range", "ranges cannot be empty"));
        }
        if let Some(idx) = self.ranges.iter().position(|r| r.from.is_none() && r.to.is_none()) {
            return Err(Error::validation(
                "Range",
                format!("range {} needs from or to", idx),
            ));
        }
        self.aggs.validate()
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let ranges: Vec<Value> = self.ranges.iter().map(RangeBucket::to_json).collect();
        let body = json!({
            "field": field(&self.field)?,
            "ranges": ranges,
            "keyed": self.keyed,
        });
        with_aggs(json!({ "range": body }), &self.aggs, field)
    }
}

// ===== Metric aggregations =====

/// Single-field metric with an optional value for missing documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    field: String,
    #[serde(default)]
    missing: Option<Value>,
}

impl Metric {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            missing: None,
        }
    }

    pub fn missing(mut self, missing: impl Into<Value>) -> Result<Self> {
        self.missing = Some(missing.into());
        check_missing("Metric", &self.missing)?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        check_field("Metric", &self.field)?;
        check_missing("Metric", &self.missing)
    }

    fn to_json(&self, name: &str, field: FieldMapper<'_>) -> Result<Value> {
        let mut body = Map::new();
        body.insert("field".into(), Value::String(field(&self.field)?));
        if let Some(missing) = &self.missing {
            body.insert("missing".into(), missing.clone());
        }
        Ok(json!({ name: body }))
    }
}

/// Percentile estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    field: String,
    #[serde(default)]
    percents: Vec<f64>,
    #[serde(default = "default_true")]
    keyed: bool,
    #[serde(default)]
    missing: Option<Value>,
}

impl Percentiles {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            percents: Vec::new(),
            keyed: true,
            missing: None,
        }
    }

    pub fn percents(mut self, percents: Vec<f64>) -> Result<Self> {
        self.percents = percents;
        self.validate()?;
        Ok(self)
    }

    pub fn keyed(mut self, keyed: bool) -> Self {
        self.keyed = keyed;
        self
    }

    pub fn missing(mut self, missing: impl Into<Value>) -> Result<Self> {
        self.missing = Some(missing.into());
        check_missing("Percentiles", &self.missing)?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        check_field("Percentiles", &self.field)?;
        if let Some(bad) = self.percents.iter().find(|p| !(0.0..=100.0).contains(*p)) {
            return Err(Error::validation(
                "Percentiles",
                format!("percent {} is outside 0..=100", bad),
            ));
        }
        check_missing("Percentiles", &self.missing)
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let mut body = Map::new();
        body.insert("field".into(), Value::String(field(&self.field)?));
        if !self.percents.is_empty() {
            body.insert("percents".into(), json!(self.percents));
        }
        body.insert("keyed".into(), Value::Bool(self.keyed));
        if let Some(missing) = &self.missing {
            body.insert("missing".into(), missing.clone());
        }
        Ok(json!({ "percentiles": body }))
    }
}

/// Sort key of a top hits aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopHitsSort {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl TopHitsSort {
    pub fn new(field: &str, order: SortOrder) -> Self {
        Self {
            field: field.to_string(),
            order,
        }
    }
}

/// Best matching documents per bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopHits {
    sort: Vec<TopHitsSort>,
    size: u32,
    #[serde(default)]
    from: Option<u32>,
    #[serde(default)]
    docvalue_fields: Vec<String>,
}

impl TopHits {
    pub fn new(sort: Vec<TopHitsSort>, size: u32) -> Result<Self> {
        let top_hits = Self {
            sort,
            size,
            from: None,
            docvalue_fields: Vec::new(),
        };
        top_hits.validate()?;
        Ok(top_hits)
    }

    /// Number of hits to skip
    pub fn from_index(mut self, from: u32) -> Self {
        self.from = Some(from);
        self
    }

    pub fn docvalue_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.docvalue_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.sort.is_empty() {
            return Err(Error::validation("TopHits", "sort cannot be empty"));
        }
        Ok(())
    }

    fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        let sort = self
            .sort
            .iter()
            .map(|s| Ok(json!({ field(&s.field)?: s.order.as_str() })))
            .collect::<Result<Vec<Value>>>()?;

        let mut body = Map::new();
        body.insert("sort".into(), Value::Array(sort));
        body.insert("size".into(), json!(self.size));
        if let Some(from) = self.from {
            body.insert("from".into(), json!(from));
        }
        if !self.docvalue_fields.is_empty() {
            let fields = self
                .docvalue_fields
                .iter()
                .map(|name| field(name).map(Value::String))
                .collect::<Result<Vec<Value>>>()?;
            body.insert("docvalue_fields".into(), Value::Array(fields));
        }
        Ok(json!({ "top_hits": body }))
    }
}

// ===== Aggregation =====

/// An aggregation request node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregation {
    Count(Count),
    Terms(Terms),
    Histogram(Histogram),
    DateHistogram(DateHistogram),
    Range(RangeAggregation),
    Avg(Metric),
    Cardinality(Metric),
    Min(Metric),
    Max(Metric),
    Stats(Metric),
    Sum(Metric),
    Percentiles(Percentiles),
    TopHits(TopHits),
}

impl Aggregation {
    pub fn avg(field: &str) -> Self {
        Aggregation::Avg(Metric::new(field))
    }

    pub fn cardinality(field: &str) -> Self {
        Aggregation::Cardinality(Metric::new(field))
    }

    pub fn min(field: &str) -> Self {
        Aggregation::Min(Metric::new(field))
    }

    pub fn max(field: &str) -> Self {
        Aggregation::Max(Metric::new(field))
    }

    pub fn stats(field: &str) -> Self {
        Aggregation::Stats(Metric::new(field))
    }

    pub fn sum(field: &str) -> Self {
        Aggregation::Sum(Metric::new(field))
    }

    /// Request key of the node
    pub fn kind(&self) -> &'static str {
        match self {
            Aggregation::Count(_) => "value_count",
            Aggregation::Terms(_) => "terms",
            Aggregation::Histogram(_) => "histogram",
            Aggregation::DateHistogram(_) => "date_histogram",
            Aggregation::Range(_) => "range",
            Aggregation::Avg(_) => "avg",
            Aggregation::Cardinality(_) => "cardinality",
            Aggregation::Min(_) => "min",
            Aggregation::Max(_) => "max",
            Aggregation::Stats(_) => "stats",
            Aggregation::Sum(_) => "sum",
            Aggregation::Percentiles(_) => "percentiles",
            Aggregation::TopHits(_) => "top_hits",
        }
    }

    /// Check a node and all of its children
    pub fn validate(&self) -> Result<()> {
        match self {
            Aggregation::Count(count) => check_field("Count", &count.field),
            Aggregation::Terms(terms) => terms.validate(),
            Aggregation::Histogram(histogram) => histogram.validate(),
            Aggregation::DateHistogram(histogram) => histogram.validate(),
            Aggregation::Range(range) => range.validate(),
            Aggregation::Avg(metric)
            | Aggregation::Cardinality(metric)
            | Aggregation::Min(metric)
            | Aggregation::Max(metric)
            | Aggregation::Stats(metric)
            | Aggregation::Sum(metric) => metric.validate(),
            Aggregation::Percentiles(percentiles) => percentiles.validate(),
            Aggregation::TopHits(top_hits) => top_hits.validate(),
        }
    }

    /// Build the JSON request, mapping every field name through `field`
    pub fn to_json(&self, field: FieldMapper<'_>) -> Result<Value> {
        self.validate()?;
        match self {
            Aggregation::Count(count) => Ok(json!({ "value_count": { "field": field(&count.field)? } })),
            Aggregation::Terms(terms) => terms.to_json(field),
            Aggregation::Histogram(histogram) => histogram.to_json(field),
            Aggregation::DateHistogram(histogram) => histogram.to_json(field),
            Aggregation::Range(range) => range.to_json(field),
            Aggregation::Avg(metric)
            | Aggregation::Cardinality(metric)
            | Aggregation::Min(metric)
            | Aggregation::Max(metric)
            | Aggregation::Stats(metric)
            | Aggregation::Sum(metric) => metric.to_json(self.kind(), field),
            Aggregation::Percentiles(percentiles) => percentiles.to_json(field),
            Aggregation::TopHits(top_hits) => top_hits.to_json(field),
        }
    }
}

macro_rules! aggregation_node {
    ($($node:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$node> for Aggregation {
                fn from(node: $node) -> Self {
                    Aggregation::$variant(node)
                }
            }
        )+
    };
}

aggregation_node!(
    Count => Count,
    Terms => Terms,
    Histogram => Histogram,
    DateHistogram => DateHistogram,
    RangeAggregation => Range,
    Percentiles => Percentiles,
    TopHits => TopHits,
);

/// An aggregation evaluated as a window over the whole result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    aggregation: Aggregation,
}

impl Facet {
    pub fn new(aggregation: impl Into<Aggregation>) -> Self {
        Self {
            aggregation: aggregation.into(),
        }
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }
}
