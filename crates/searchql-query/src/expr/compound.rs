//! Compound queries built from nested sub-expressions
//!
//! All of these exist only in the legacy family. Their children compile in
//! nested position, where they take their legacy signature as well.

use super::{ExprOptions, Expression, Term};
use crate::compiler::{Position, Session};
use crate::dialect;
use crate::fragment::CompiledFragment;
use searchql_core::{Error, Result};

/// Matches any of a set of terms
#[derive(Debug, Clone, PartialEq)]
pub struct TermSet {
    terms: Vec<Term>,
    pub(crate) options: ExprOptions,
}

impl TermSet {
    pub fn new(terms: Vec<Term>) -> Result<Self> {
        if terms.is_empty() {
            return Err(Error::validation("TermSet", "terms cannot be empty"));
        }
        Ok(Self {
            terms,
            options: ExprOptions::default(),
        })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let terms = self
            .terms
            .iter()
            .map(|term| term.compile_in(session, Position::Nested))
            .collect::<Result<Vec<_>>>()?;

        session.keyed_call(&dialect::TERM_SET, &self.options, position, |call| {
            call.named_splice("terms", CompiledFragment::array(terms));
            Ok(())
        })
    }
}

fn finite(node: &'static str, name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::validation(node, format!("{} must be finite", name)))
    }
}

/// Gives every match of the inner query the same score
#[derive(Debug, Clone, PartialEq)]
pub struct ConstScore {
    score: f64,
    query: Box<Expression>,
    pub(crate) options: ExprOptions,
}

impl ConstScore {
    pub fn new(score: f64, query: impl Into<Expression>) -> Result<Self> {
        Ok(Self {
            score: finite("ConstScore", "score", score)?,
            query: Box::new(query.into()),
            options: ExprOptions::default(),
        })
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let query = session.nested(&self.query)?;
        session.keyed_call(&dialect::CONST_SCORE, &self.options, position, |call| {
            call.bind_cast(self.score, "real").splice(query);
            Ok(())
        })
    }
}

/// Scales the score of the inner query
#[derive(Debug, Clone, PartialEq)]
pub struct Boost {
    factor: f64,
    query: Box<Expression>,
    pub(crate) options: ExprOptions,
}

impl Boost {
    pub fn new(factor: f64, query: impl Into<Expression>) -> Result<Self> {
        Ok(Self {
            factor: finite("Boost", "factor", factor)?,
            query: Box::new(query.into()),
            options: ExprOptions::default(),
        })
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let query = session.nested(&self.query)?;
        session.keyed_call(&dialect::BOOST, &self.options, position, |call| {
            call.bind(self.factor).splice(query);
            Ok(())
        })
    }
}

/// Best-scoring of several disjuncts
#[derive(Debug, Clone, PartialEq)]
pub struct DisjunctionMax {
    disjuncts: Vec<Expression>,
    tie_breaker: f64,
    pub(crate) options: ExprOptions,
}

impl DisjunctionMax {
    pub fn new(disjuncts: Vec<Expression>) -> Result<Self> {
        if disjuncts.is_empty() {
            return Err(Error::validation("DisjunctionMax", "disjuncts cannot be empty"));
        }
        Ok(Self {
            disjuncts,
            tie_breaker: 0.0,
            options: ExprOptions::default(),
        })
    }

    /// Weight given to the non-best disjuncts
    pub fn tie_breaker(mut self, tie_breaker: f64) -> Result<Self> {
        self.tie_breaker = finite("DisjunctionMax", "tie_breaker", tie_breaker)?;
        Ok(self)
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let disjuncts = session.nested_all(&self.disjuncts)?;
        session.keyed_call(&dialect::DISJUNCTION_MAX, &self.options, position, |call| {
            call.splice(CompiledFragment::array(disjuncts))
                .named("tie_breaker", self.tie_breaker);
            Ok(())
        })
    }
}

/// Boolean combination of sub-queries
#[derive(Debug, Clone, PartialEq)]
pub struct Boolean {
    must: Vec<Expression>,
    must_not: Vec<Expression>,
    should: Vec<Expression>,
    pub(crate) options: ExprOptions,
}

impl Boolean {
    pub fn new(must: Vec<Expression>, must_not: Vec<Expression>, should: Vec<Expression>) -> Result<Self> {
        if must.is_empty() && must_not.is_empty() && should.is_empty() {
            return Err(Error::validation(
                "Boolean",
                "at least one of must, must_not or should is required",
            ));
        }
        Ok(Self {
            must,
            must_not,
            should,
            options: ExprOptions::default(),
        })
    }

    pub fn must(queries: Vec<Expression>) -> Result<Self> {
        Self::new(queries, Vec::new(), Vec::new())
    }

    pub fn should(queries: Vec<Expression>) -> Result<Self> {
        Self::new(Vec::new(), Vec::new(), queries)
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        let clauses = [
            ("must", &self.must),
            ("must_not", &self.must_not),
            ("should", &self.should),
        ];

        let mut compiled = Vec::new();
        for (name, queries) in clauses {
            if !queries.is_empty() {
                compiled.push((name, CompiledFragment::array(session.nested_all(queries)?)));
            }
        }

        session.keyed_call(&dialect::BOOLEAN, &self.options, position, |call| {
            for (name, array) in compiled {
                call.named_splice(name, array);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{compile_with, legacy, v2};
    use crate::expr::{All, Empty, ExprBuilder, Exists, Match, Parse, Regex, Search};
    use searchql_core::{CompilerConfig, SqlValue};

    #[test]
    fn test_term_set() {
        assert!(TermSet::new(Vec::new()).unwrap_err().is_validation());

        let set = TermSet::new(vec![Term::new("rank", 1i64), Term::new("rank", 200i64)]).unwrap();
        let fragment = legacy(set.match_op(true));
        assert_eq!(
            fragment.text,
            "article.id @@@ paradedb.term_set(terms:=ARRAY[paradedb.term(%s, %s), paradedb.term(%s, %s)])"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::from("rank"),
                SqlValue::Integer(1),
                SqlValue::from("rank"),
                SqlValue::Integer(200)
            ]
        );
    }

    #[test]
    fn test_nested_terms_keep_their_field_under_v2() {
        let set = TermSet::new(vec![Term::new("title", "a")]).unwrap();
        assert_eq!(v2(set).text, "paradedb.term_set(terms:=ARRAY[paradedb.term(%s, %s)])");
    }

    #[test]
    fn test_const_score_and_boost() {
        let fragment = legacy(ConstScore::new(2.0, Term::new("title", "shoes")).unwrap());
        assert_eq!(fragment.text, "paradedb.const_score(%s::real, paradedb.term(%s, %s))");
        assert_eq!(fragment.params[0], SqlValue::Float(2.0));

        let fragment = legacy(Boost::new(1.5, All::new()).unwrap().match_op(true));
        assert_eq!(fragment.text, "article.id @@@ paradedb.boost(%s, paradedb.all())");

        assert!(Boost::new(f64::NAN, All::new()).is_err());
        assert!(ConstScore::new(f64::INFINITY, All::new()).is_err());
    }

    #[test]
    fn test_nested_match_op_is_ignored() {
        let fragment = legacy(Boost::new(2.0, Term::new("title", "x").match_op(true)).unwrap());
        assert_eq!(fragment.text, "paradedb.boost(%s, paradedb.term(%s, %s))");
    }

    #[test]
    fn test_disjunction_max() {
        assert!(DisjunctionMax::new(Vec::new()).is_err());

        let dismax = DisjunctionMax::new(vec![
            Term::new("title", "a").into(),
            Regex::new("body", "b.*").into(),
        ])
        .unwrap()
        .tie_breaker(0.3)
        .unwrap();
        let fragment = v2(dismax);
        assert_eq!(
            fragment.text,
            "paradedb.disjunction_max(ARRAY[paradedb.term(%s, %s), paradedb.regex(%s, %s)], tie_breaker:=%s)"
        );
        assert_eq!(fragment.params.last(), Some(&SqlValue::Float(0.3)));
    }

    #[test]
    fn test_boolean() {
        assert!(Boolean::new(Vec::new(), Vec::new(), Vec::new()).unwrap_err().is_validation());

        let boolean = Boolean::new(
            vec![Term::new("title", "a").into()],
            Vec::new(),
            vec![Match::new("body", "b").into(), All::new().into()],
        )
        .unwrap();
        let fragment = legacy(boolean.match_op(true));
        assert!(fragment.text.starts_with("article.id @@@ paradedb.boolean(must:=ARRAY[paradedb.term(%s, %s)], should:=ARRAY[paradedb.match("));
        assert!(!fragment.text.contains("must_not"));
        assert_eq!(fragment.params[0], SqlValue::from("title"));
        assert_eq!(fragment.params[2], SqlValue::from("body"));
        assert_eq!(fragment.placeholder_count(), fragment.params.len());
    }

    #[test]
    fn test_search_is_not_nestable() {
        let boolean = Boolean::must(vec![Search::new("title", "shoes").unwrap().into()]).unwrap();
        let err = compile_with(&CompilerConfig::default(), boolean).unwrap_err();
        assert!(matches!(err, Error::NotNestable { .. }));
    }

    #[test]
    fn test_compound_under_forced_legacy() {
        let config = CompilerConfig::v2().force_legacy(true);
        let boolean = Boolean::should(vec![Regex::new("title", "x").into()]).unwrap();
        let fragment = compile_with(&config, boolean).unwrap();
        assert_eq!(fragment.text, "paradedb.boolean(should:=ARRAY[paradedb.regex(%s, %s)])");
    }

    #[test]
    fn test_field_less_children_follow_the_legacy_parent() {
        let boolean = Boolean::must(vec![All::new().into(), Parse::new("title:shoes").into()]).unwrap();
        assert_eq!(
            v2(boolean).text,
            "paradedb.boolean(must:=ARRAY[paradedb.all(), paradedb.parse(%s, lenient:=%s, conjunction_mode:=%s)])"
        );

        let boost = Boost::new(2.0, Exists::new("title")).unwrap();
        assert_eq!(v2(boost).text, "paradedb.boost(%s, paradedb.exists(%s))");

        let dismax = DisjunctionMax::new(vec![All::new().into()]).unwrap();
        assert_eq!(v2(dismax).text, "paradedb.disjunction_max(ARRAY[paradedb.all()], tie_breaker:=%s)");
    }

    #[test]
    fn test_v2_only_children_are_rejected() {
        let config = CompilerConfig::v2();
        for child in [Expression::from(Empty::new()), Exists::any().into()] {
            let boolean = Boolean::should(vec![child]).unwrap();
            let err = compile_with(&config, boolean).unwrap_err();
            assert!(matches!(err, Error::UnsupportedDialect { .. }), "{:?}", err);
        }
    }
}
