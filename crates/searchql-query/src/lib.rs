//! searchql query compiler
//!
//! Turns search expression trees into parameterized SQL fragments for a
//! BM25 search engine.
//!
//! # Overview
//!
//! The compiler implements:
//! - A closed expression AST covering term, phrase, range, compound and
//!   operator queries
//! - Dialect selection between the legacy `paradedb.*` and v2 `pdb.*`
//!   function families, table driven per function
//! - Proximity clause validation with a logos token classifier
//! - Aggregation requests bound as JSON
//! - A lookup adapter mapping named shorthands onto expression nodes
//!
//! Every literal travels out-of-band as a bound parameter; compiled text only
//! ever contains identifiers, function names and placeholders.

pub mod aggregate;
pub mod compiler;
pub mod dialect;
pub mod expr;
pub mod fragment;
pub mod literal;
pub mod lookup;
pub mod proximity;

pub use aggregate::{
    Aggregation, BucketBound, Count, DateHistogram, Facet, Histogram, HistogramBounds, Metric,
    Percentiles, RangeAggregation, RangeBucket, SortOrder, SubAggregations, Terms, TermsOrder,
    TopHits, TopHitsSort,
};
pub use compiler::{Compiler, Position, MATCH_OPERATOR};
pub use dialect::{DialectSelector, FieldSlot, FunctionSpec, Selection};
pub use expr::{ExprBuilder, ExprOptions, Expression};
pub use fragment::{Compiled, CompiledFragment, PLACEHOLDER};
pub use literal::{escape_query, ValueCast};
pub use lookup::{Arg, LookupAdapter, LookupKind, LookupParameter, LookupRequest, LookupValue};
pub use proximity::{
    validate_and_serialize, Proximity, ProximityArray, ProximityItem, ProximityRegex, ProximityValue,
};

/// Lexer over proximity operator tokens
pub type ProximityLexer<'a> = logos::Lexer<'a, proximity::ProximityToken>;

#[cfg(test)]
mod tests {
    use super::expr::{Expression, Match, Phrase, Regex, Term};
    use super::expr::testing::{legacy, v2};
    use proptest::prelude::*;
    use searchql_core::SqlValue;

    proptest! {
        #[test]
        fn prop_term_values_stay_out_of_text(value in "'[a-zA-Z0-9 ;-]{0,24}") {
            for fragment in [legacy(Term::new("title", value.as_str())), v2(Term::new("title", value.as_str()))] {
                prop_assert!(!fragment.text.contains(&value));
                prop_assert!(fragment.params.contains(&SqlValue::from(value.as_str())));
            }
        }

        #[test]
        fn prop_regex_and_phrase_values_are_bound(a in "'[^%]{1,16}", b in "'[^%]{1,16}") {
            let regex = legacy(Regex::new("title", &a));
            prop_assert!(!regex.text.contains(&a));

            let phrase = v2(Phrase::new("title", [a.clone(), b.clone()]).unwrap());
            prop_assert!(!phrase.text.contains(&a) && !phrase.text.contains(&b));
            prop_assert_eq!(phrase.placeholder_count(), phrase.params.len());
        }

        #[test]
        fn prop_compile_is_deterministic(value in ".{0,32}", distance in 0u32..3) {
            let expr = Expression::from(Match::new("body", &value).distance(distance));
            let first = legacy(expr.clone());
            let second = legacy(expr);
            prop_assert_eq!(first, second);
        }
    }
}
