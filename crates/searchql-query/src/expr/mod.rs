//! Expression AST
//!
//! A closed set of query nodes. Every node validates its arguments when it is
//! built and compiles through one exhaustive match, so a node kind without a
//! dialect mapping fails to build rather than at runtime.

mod compound;
mod keyed;
mod operator;
mod range;
mod similar;
mod text;

pub use compound::{Boolean, Boost, ConstScore, DisjunctionMax, TermSet};
pub use keyed::{All, Empty, Exists, Score, Snippet};
pub use operator::{JsonOp, Search, SearchOperator, SearchValue};
pub use range::{Range, RangeBounds, RangeCast, RangeRelation, RangeTerm, RangeType};
pub use similar::{MoreLikeThis, MoreLikeThisSource};
pub use text::{FuzzyTerm, Match, Parse, ParseWithField, Phrase, PhrasePrefix, Regex, Term, Tokenizer};

use crate::compiler::{Compiler, Position, Session};
use crate::dialect::{self, FunctionSpec};
use crate::fragment::CompiledFragment;
use crate::proximity::Proximity;
use searchql_core::{KeyReference, Result};

/// Per-expression flags, frozen at construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprOptions {
    /// Anchor the call on the key column with the match operator
    pub match_op: bool,

    /// Use the legacy convention for this node regardless of configuration
    pub force_legacy: bool,

    /// Key column to anchor on; derived from the field's table when absent
    pub key: Option<KeyReference>,
}

impl ExprOptions {
    /// Options with the match operator enabled
    pub fn matching() -> Self {
        Self {
            match_op: true,
            ..Self::default()
        }
    }
}

/// Builder methods shared by every node
pub trait ExprBuilder: Sized {
    /// Mutable access to the node's options
    fn options_mut(&mut self) -> &mut ExprOptions;

    /// Wrap the compiled call as `key @@@ call`
    fn match_op(mut self, enabled: bool) -> Self {
        self.options_mut().match_op = enabled;
        self
    }

    /// Require the legacy convention
    fn force_legacy(mut self) -> Self {
        self.options_mut().force_legacy = true;
        self
    }

    /// Anchor on an explicit key
    fn key(mut self, key: KeyReference) -> Self {
        self.options_mut().key = Some(key);
        self
    }

    /// Replace all options at once
    fn with_options(mut self, options: ExprOptions) -> Self {
        *self.options_mut() = options;
        self
    }
}

/// A compilable query node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    All(All),
    Empty(Empty),
    Exists(Exists),
    Search(Search),
    Match(Match),
    Range(Range),
    RangeTerm(RangeTerm),
    Regex(Regex),
    Term(Term),
    TermSet(TermSet),
    FuzzyTerm(FuzzyTerm),
    Phrase(Phrase),
    PhrasePrefix(PhrasePrefix),
    ConstScore(ConstScore),
    Boost(Boost),
    DisjunctionMax(DisjunctionMax),
    Boolean(Boolean),
    MoreLikeThis(MoreLikeThis),
    Parse(Parse),
    ParseWithField(ParseWithField),
    Score(Score),
    Snippet(Snippet),
    Proximity(Proximity),
    JsonOp(JsonOp),
}

impl Expression {
    /// Function table entry this node compiles through
    pub fn spec(&self) -> &'static FunctionSpec {
        match self {
            Expression::All(_) => &dialect::ALL,
            Expression::Empty(_) => &dialect::EMPTY,
            Expression::Exists(e) if e.field().is_none() => &dialect::EXISTS_ANY,
            Expression::Exists(_) => &dialect::EXISTS,
            Expression::Search(e) => e.op().spec(),
            Expression::Match(_) => &dialect::MATCH,
            Expression::Range(_) => &dialect::RANGE,
            Expression::RangeTerm(_) => &dialect::RANGE_TERM,
            Expression::Regex(_) => &dialect::REGEX,
            Expression::Term(_) => &dialect::TERM,
            Expression::TermSet(_) => &dialect::TERM_SET,
            Expression::FuzzyTerm(_) => &dialect::FUZZY_TERM,
            Expression::Phrase(_) => &dialect::PHRASE,
            Expression::PhrasePrefix(_) => &dialect::PHRASE_PREFIX,
            Expression::ConstScore(_) => &dialect::CONST_SCORE,
            Expression::Boost(_) => &dialect::BOOST,
            Expression::DisjunctionMax(_) => &dialect::DISJUNCTION_MAX,
            Expression::Boolean(_) => &dialect::BOOLEAN,
            Expression::MoreLikeThis(_) => &dialect::MORE_LIKE_THIS,
            Expression::Parse(_) => &dialect::PARSE,
            Expression::ParseWithField(_) => &dialect::PARSE_WITH_FIELD,
            Expression::Score(_) => &dialect::SCORE,
            Expression::Snippet(_) => &dialect::SNIPPET,
            Expression::Proximity(_) => &dialect::PROXIMITY,
            Expression::JsonOp(_) => &dialect::JSON_OP,
        }
    }

    /// Logical function name
    pub fn function(&self) -> &'static str {
        self.spec().name
    }

    /// Node options
    pub fn options(&self) -> &ExprOptions {
        match self {
            Expression::All(e) => &e.options,
            Expression::Empty(e) => &e.options,
            Expression::Exists(e) => &e.options,
            Expression::Search(e) => &e.options,
            Expression::Match(e) => &e.options,
            Expression::Range(e) => &e.options,
            Expression::RangeTerm(e) => &e.options,
            Expression::Regex(e) => &e.options,
            Expression::Term(e) => &e.options,
            Expression::TermSet(e) => &e.options,
            Expression::FuzzyTerm(e) => &e.options,
            Expression::Phrase(e) => &e.options,
            Expression::PhrasePrefix(e) => &e.options,
            Expression::ConstScore(e) => &e.options,
            Expression::Boost(e) => &e.options,
            Expression::DisjunctionMax(e) => &e.options,
            Expression::Boolean(e) => &e.options,
            Expression::MoreLikeThis(e) => &e.options,
            Expression::Parse(e) => &e.options,
            Expression::ParseWithField(e) => &e.options,
            Expression::Score(e) => &e.options,
            Expression::Snippet(e) => &e.options,
            Expression::Proximity(e) => &e.options,
            Expression::JsonOp(e) => &e.options,
        }
    }

    /// Compile, raising on resolution failures
    pub fn compile(&self, compiler: &Compiler<'_>) -> Result<CompiledFragment> {
        compiler.compile_fragment(self)
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        match self {
            Expression::All(e) => e.compile_in(session, position),
            Expression::Empty(e) => e.compile_in(session, position),
            Expression::Exists(e) => e.compile_in(session, position),
            Expression::Search(e) => e.compile_in(session, position),
            Expression::Match(e) => e.compile_in(session, position),
            Expression::Range(e) => e.compile_in(session, position),
            Expression::RangeTerm(e) => e.compile_in(session, position),
            Expression::Regex(e) => e.compile_in(session, position),
            Expression::Term(e) => e.compile_in(session, position),
            Expression::TermSet(e) => e.compile_in(session, position),
            Expression::FuzzyTerm(e) => e.compile_in(session, position),
            Expression::Phrase(e) => e.compile_in(session, position),
            Expression::PhrasePrefix(e) => e.compile_in(session, position),
            Expression::ConstScore(e) => e.compile_in(session, position),
            Expression::Boost(e) => e.compile_in(session, position),
            Expression::DisjunctionMax(e) => e.compile_in(session, position),
            Expression::Boolean(e) => e.compile_in(session, position),
            Expression::MoreLikeThis(e) => e.compile_in(session, position),
            Expression::Parse(e) => e.compile_in(session, position),
            Expression::ParseWithField(e) => e.compile_in(session, position),
            Expression::Score(e) => e.compile_in(session, position),
            Expression::Snippet(e) => e.compile_in(session, position),
            Expression::Proximity(e) => e.compile_in(session, position),
            Expression::JsonOp(e) => e.compile_in(session, position),
        }
    }
}

impl ExprBuilder for Expression {
    fn options_mut(&mut self) -> &mut ExprOptions {
        match self {
            Expression::All(e) => &mut e.options,
            Expression::Empty(e) => &mut e.options,
            Expression::Exists(e) => &mut e.options,
            Expression::Search(e) => &mut e.options,
            Expression::Match(e) => &mut e.options,
            Expression::Range(e) => &mut e.options,
            Expression::RangeTerm(e) => &mut e.options,
            Expression::Regex(e) => &mut e.options,
            Expression::Term(e) => &mut e.options,
            Expression::TermSet(e) => &mut e.options,
            Expression::FuzzyTerm(e) => &mut e.options,
            Expression::Phrase(e) => &mut e.options,
            Expression::PhrasePrefix(e) => &mut e.options,
            Expression::ConstScore(e) => &mut e.options,
            Expression::Boost(e) => &mut e.options,
            Expression::DisjunctionMax(e) => &mut e.options,
            Expression::Boolean(e) => &mut e.options,
            Expression::MoreLikeThis(e) => &mut e.options,
            Expression::Parse(e) => &mut e.options,
            Expression::ParseWithField(e) => &mut e.options,
            Expression::Score(e) => &mut e.options,
            Expression::Snippet(e) => &mut e.options,
            Expression::Proximity(e) => &mut e.options,
            Expression::JsonOp(e) => &mut e.options,
        }
    }
}

/// Implements `ExprBuilder` and the conversion into `Expression`
macro_rules! expression_node {
    ($($node:ident),+ $(,)?) => {
        $(
            impl ExprBuilder for $node {
                fn options_mut(&mut self) -> &mut ExprOptions {
                    &mut self.options
                }
            }

            impl From<$node> for Expression {
                fn from(node: $node) -> Self {
                    Expression::$node(node)
                }
            }
        )+
    };
}

expression_node!(
    All,
    Empty,
    Exists,
    Search,
    Match,
    Range,
    RangeTerm,
    Regex,
    Term,
    TermSet,
    FuzzyTerm,
    Phrase,
    PhrasePrefix,
    ConstScore,
    Boost,
    DisjunctionMax,
    Boolean,
    MoreLikeThis,
    Parse,
    ParseWithField,
    Score,
    Snippet,
    Proximity,
    JsonOp,
);
