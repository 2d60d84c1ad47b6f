//! Text-matching nodes: match, term, fuzzy term, regex, phrases and query
//! string parsing

use super::ExprOptions;
use crate::compiler::{Position, Session};
use crate::dialect;
use crate::fragment::{CompiledFragment, PLACEHOLDER};
use crate::literal::{escape_query, validate_type_name};
use searchql_core::{Error, FieldSpecifier, Result, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tokenizers a match query may override the index tokenizer with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenizer {
    Whitespace,
    Keyword,
    Ngram,
    Regex,
    Icu,
    Jieba,
    ChineseLindera,
    ChineseCompatible,
    SourceCode,
    Raw,
}

impl Tokenizer {
    pub const ALL: [Tokenizer; 10] = [
        Tokenizer::Whitespace,
        Tokenizer::Keyword,
        Tokenizer::Ngram,
        Tokenizer::Regex,
        Tokenizer::Icu,
        Tokenizer::Jieba,
        Tokenizer::ChineseLindera,
        Tokenizer::ChineseCompatible,
        Tokenizer::SourceCode,
        Tokenizer::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tokenizer::Whitespace => "whitespace",
            Tokenizer::Keyword => "keyword",
            Tokenizer::Ngram => "ngram",
            Tokenizer::Regex => "regex",
            Tokenizer::Icu => "icu",
            Tokenizer::Jieba => "jieba",
            Tokenizer::ChineseLindera => "chinese_lindera",
            Tokenizer::ChineseCompatible => "chinese_compatible",
            Tokenizer::SourceCode => "source_code",
            Tokenizer::Raw => "raw",
        }
    }
}

impl fmt::Display for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tokenizer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tokenizer::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::validation("Match", format!("unknown tokenizer '{}'", s)))
    }
}

/// Full-text match with optional fuzziness
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    field: FieldSpecifier,
    value: String,
    distance: u32,
    conjunction_mode: bool,
    tokenizer: Option<Tokenizer>,
    transposition_cost_one: bool,
    prefix: bool,
    escaped: bool,
    pub(crate) options: ExprOptions,
}

impl Match {
    pub fn new(field: impl Into<FieldSpecifier>, value: &str) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            distance: 0,
            conjunction_mode: false,
            tokenizer: None,
            transposition_cost_one: true,
            prefix: false,
            escaped: false,
            options: ExprOptions::default(),
        }
    }

    /// Edit distance allowed per token
    pub fn distance(mut self, distance: u32) -> Self {
        self.distance = distance;
        self
    }

    /// Require every token to match
    pub fn conjunction_mode(mut self, enabled: bool) -> Self {
        self.conjunction_mode = enabled;
        self
    }

    pub fn tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn transposition_cost_one(mut self, enabled: bool) -> Self {
        self.transposition_cost_one = enabled;
        self
    }

    pub fn prefix(mut self, enabled: bool) -> Self {
        self.prefix = enabled;
        self
    }

    /// Escape query syntax in the value before binding it
    pub fn escaped(mut self, enabled: bool) -> Self {
        self.escaped = enabled;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::MATCH, &self.field, &self.options, position, |call| {
            let value = if self.escaped {
                escape_query(&self.value)
            } else {
                self.value.clone()
            };

            call.bind(value)
                .named("conjunction_mode", self.conjunction_mode)
                .named("transposition_cost_one", self.transposition_cost_one)
                .named("prefix", self.prefix)
                .named("distance", self.distance);

            if let Some(tokenizer) = self.tokenizer {
                call.bind_with(
                    format!("tokenizer:=paradedb.tokenizer({})", PLACEHOLDER),
                    tokenizer.as_str(),
                );
            }
            Ok(())
        })
    }
}

/// Exact term lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    field: FieldSpecifier,
    value: SqlValue,
    enum_cast: Option<String>,
    pub(crate) options: ExprOptions,
}

impl Term {
    pub fn new(field: impl Into<FieldSpecifier>, value: impl Into<SqlValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            enum_cast: None,
            options: ExprOptions::default(),
        }
    }

    /// Cast the value to an enum type before comparing
    pub fn enum_cast(mut self, type_name: &str) -> Result<Self> {
        validate_type_name("Term", type_name)?;
        self.enum_cast = Some(type_name.trim().to_string());
        Ok(self)
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::TERM, &self.field, &self.options, position, |call| {
            match &self.enum_cast {
                Some(cast) => call.bind_cast(self.value.clone(), cast),
                None => call.bind(self.value.clone()),
            };
            Ok(())
        })
    }
}

/// Term lookup tolerating edits
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyTerm {
    field: FieldSpecifier,
    value: String,
    distance: u32,
    transposition_cost_one: bool,
    prefix: bool,
    pub(crate) options: ExprOptions,
}

impl FuzzyTerm {
    pub fn new(field: impl Into<FieldSpecifier>, value: &str) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            distance: 2,
            transposition_cost_one: true,
            prefix: false,
            options: ExprOptions::default(),
        }
    }

    pub fn distance(mut self, distance: u32) -> Self {
        self.distance = distance;
        self
    }

    pub fn transposition_cost_one(mut self, enabled: bool) -> Self {
        self.transposition_cost_one = enabled;
        self
    }

    pub fn prefix(mut self, enabled: bool) -> Self {
        self.prefix = enabled;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::FUZZY_TERM, &self.field, &self.options, position, |call| {
            call.bind(self.value.clone())
                .named("transposition_cost_one", self.transposition_cost_one)
                .named("prefix", self.prefix)
                .named("distance", self.distance);
            Ok(())
        })
    }
}

/// Regular expression over indexed terms
#[derive(Debug, Clone, PartialEq)]
pub struct Regex {
    field: FieldSpecifier,
    pattern: String,
    pub(crate) options: ExprOptions,
}

impl Regex {
    pub fn new(field: impl Into<FieldSpecifier>, pattern: &str) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.to_string(),
            options: ExprOptions::default(),
        }
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::REGEX, &self.field, &self.options, position, |call| {
            call.bind(self.pattern.clone());
            Ok(())
        })
    }
}

fn phrase_list<I, S>(node: &'static str, phrases: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let phrases: Vec<String> = phrases.into_iter().map(Into::into).collect();
    if phrases.len() < 2 {
        return Err(Error::validation(
            node,
            format!("expected at least 2 phrases, got {}", phrases.len()),
        ));
    }
    Ok(phrases)
}

/// Ordered tokens, optionally with slop between them
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    field: FieldSpecifier,
    phrases: Vec<String>,
    slop: u32,
    pub(crate) options: ExprOptions,
}

impl Phrase {
    pub fn new<I, S>(field: impl Into<FieldSpecifier>, phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            field: field.into(),
            phrases: phrase_list("Phrase", phrases)?,
            slop: 0,
            options: ExprOptions::default(),
        })
    }

    /// Number of positions tokens may move
    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::PHRASE, &self.field, &self.options, position, |call| {
            call.splice(CompiledFragment::bound_array(self.phrases.iter().cloned()))
                .bind(self.slop);
            Ok(())
        })
    }
}

/// Phrase whose last token is a prefix
#[derive(Debug, Clone, PartialEq)]
pub struct PhrasePrefix {
    field: FieldSpecifier,
    phrases: Vec<String>,
    max_expansion: u32,
    pub(crate) options: ExprOptions,
}

impl PhrasePrefix {
    pub fn new<I, S>(field: impl Into<FieldSpecifier>, phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            field: field.into(),
            phrases: phrase_list("PhrasePrefix", phrases)?,
            max_expansion: 0,
            options: ExprOptions::default(),
        })
    }

    /// Cap on prefix expansions, zero leaves the engine default
    pub fn max_expansion(mut self, max: u32) -> Self {
        self.max_expansion = max;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::PHRASE_PREFIX, &self.field, &self.options, position, |call| {
            call.splice(CompiledFragment::bound_array(self.phrases.iter().cloned()));
            if self.max_expansion != 0 {
                call.named("max_expansion", self.max_expansion);
            }
            Ok(())
        })
    }
}

/// Query string in the engine's own syntax
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    query: String,
    lenient: bool,
    conjunction_mode: bool,
    pub(crate) options: ExprOptions,
}

impl Parse {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            lenient: false,
            conjunction_mode: false,
            options: ExprOptions::default(),
        }
    }

    /// Skip unparseable parts instead of failing
    pub fn lenient(mut self, enabled: bool) -> Self {
        self.lenient = enabled;
        self
    }

    pub fn conjunction_mode(mut self, enabled: bool) -> Self {
        self.conjunction_mode = enabled;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.keyed_call(&dialect::PARSE, &self.options, position, |call| {
            call.bind(self.query.clone())
                .named("lenient", self.lenient)
                .named("conjunction_mode", self.conjunction_mode);
            Ok(())
        })
    }
}

/// Query string scoped to one field
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWithField {
    field: FieldSpecifier,
    query: String,
    lenient: bool,
    conjunction_mode: bool,
    pub(crate) options: ExprOptions,
}

impl ParseWithField {
    pub fn new(field: impl Into<FieldSpecifier>, query: &str) -> Self {
        Self {
            field: field.into(),
            query: query.to_string(),
            lenient: false,
            conjunction_mode: false,
            options: ExprOptions::default(),
        }
    }

    pub fn lenient(mut self, enabled: bool) -> Self {
        self.lenient = enabled;
        self
    }

    pub fn conjunction_mode(mut self, enabled: bool) -> Self {
        self.conjunction_mode = enabled;
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.field_call(&dialect::PARSE_WITH_FIELD, &self.field, &self.options, position, |call| {
            call.bind(self.query.clone())
                .named("lenient", self.lenient)
                .named("conjunction_mode", self.conjunction_mode);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{compile_with, legacy, v2};
    use crate::expr::ExprBuilder;
    use searchql_core::CompilerConfig;

    #[test]
    fn test_match_legacy() {
        let fragment = legacy(Match::new("title", "running shoes").distance(1).tokenizer(Tokenizer::Whitespace));
        assert_eq!(
            fragment.text,
            "paradedb.match(%s, %s, conjunction_mode:=%s, transposition_cost_one:=%s, prefix:=%s, distance:=%s, tokenizer:=paradedb.tokenizer(%s))"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::from("title"),
                SqlValue::from("running shoes"),
                SqlValue::Boolean(false),
                SqlValue::Boolean(true),
                SqlValue::Boolean(false),
                SqlValue::Integer(1),
                SqlValue::from("whitespace"),
            ]
        );
    }

    #[test]
    fn test_match_v2_operand() {
        let fragment = v2(Match::new("title", "shoes").match_op(true));
        // Operand forms are already predicates and are not wrapped again
        assert_eq!(
            fragment.text,
            "article.title @@@ pdb.match(%s, conjunction_mode:=%s, transposition_cost_one:=%s, prefix:=%s, distance:=%s)"
        );
        assert_eq!(fragment.params[0], SqlValue::from("shoes"));
    }

    #[test]
    fn test_match_escaped() {
        let fragment = legacy(Match::new("title", "a:b").escaped(true));
        assert_eq!(fragment.params[1], SqlValue::from("a\\:b"));
    }

    #[test]
    fn test_match_stays_legacy_under_v2_default() {
        // match is on the default legacy list
        let fragment = compile_with(&CompilerConfig::v2(), Match::new("title", "x")).unwrap();
        assert!(fragment.text.starts_with("paradedb.match("));
    }

    #[test]
    fn test_tokenizer_parse() {
        assert_eq!("chinese_lindera".parse::<Tokenizer>().unwrap(), Tokenizer::ChineseLindera);
        assert!("stemmer".parse::<Tokenizer>().unwrap_err().is_validation());
        for tokenizer in Tokenizer::ALL {
            assert_eq!(tokenizer.as_str().parse::<Tokenizer>().unwrap(), tokenizer);
        }
    }

    #[test]
    fn test_term() {
        let fragment = legacy(Term::new("rank", 5i64));
        assert_eq!(fragment.text, "paradedb.term(%s, %s)");
        assert_eq!(fragment.params, vec![SqlValue::from("rank"), SqlValue::Integer(5)]);

        let fragment = v2(Term::new("title", "shoes"));
        assert_eq!(fragment.text, "article.title @@@ pdb.term(%s)");
    }

    #[test]
    fn test_term_enum_cast() {
        let term = Term::new("title", "happy").enum_cast("mood").unwrap();
        assert_eq!(legacy(term).text, "paradedb.term(%s, %s::mood)");
        assert!(Term::new("title", "x").enum_cast("mood); --").is_err());
        assert!(Term::new("title", "x").enum_cast("mood OR true").unwrap_err().is_validation());
        assert!(Term::new("title", "x").enum_cast("mood) OR (true").unwrap_err().is_validation());
    }

    #[test]
    fn test_fuzzy_term() {
        let fragment = legacy(FuzzyTerm::new("title", "shose").prefix(true));
        assert_eq!(
            fragment.text,
            "paradedb.fuzzy_term(%s, %s, transposition_cost_one:=%s, prefix:=%s, distance:=%s)"
        );
        assert_eq!(fragment.params[4], SqlValue::Integer(2));
        assert_eq!(fragment.params[3], SqlValue::Boolean(true));
    }

    #[test]
    fn test_regex() {
        assert_eq!(legacy(Regex::new("title", "sh.*")).text, "paradedb.regex(%s, %s)");
        assert_eq!(v2(Regex::new("title", "sh.*")).text, "article.title @@@ pdb.regex(%s)");
    }

    #[test]
    fn test_phrase_validation() {
        assert!(Phrase::new("title", ["only_one"]).unwrap_err().is_validation());
        assert!(Phrase::new("title", ["a", "b"]).is_ok());
        assert!(PhrasePrefix::new("title", Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_phrase() {
        let fragment = legacy(Phrase::new("title", ["running", "shoes"]).unwrap().slop(2));
        assert_eq!(fragment.text, "paradedb.phrase(%s, ARRAY[%s, %s], %s)");
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::from("title"),
                SqlValue::from("running"),
                SqlValue::from("shoes"),
                SqlValue::Integer(2)
            ]
        );
    }

    #[test]
    fn test_phrase_prefix() {
        let fragment = v2(PhrasePrefix::new("title", ["running", "sh"]).unwrap());
        assert_eq!(fragment.text, "article.title @@@ pdb.phrase_prefix(ARRAY[%s, %s])");

        let fragment = legacy(PhrasePrefix::new("title", ["running", "sh"]).unwrap().max_expansion(5));
        assert_eq!(
            fragment.text,
            "paradedb.phrase_prefix(%s, ARRAY[%s, %s], max_expansion:=%s)"
        );
    }

    #[test]
    fn test_parse() {
        let fragment = legacy(Parse::new("title:shoes").lenient(true).match_op(true));
        assert_eq!(
            fragment.text,
            "article.id @@@ paradedb.parse(%s, lenient:=%s, conjunction_mode:=%s)"
        );
        assert_eq!(v2(Parse::new("x")).text, "pdb.parse(%s, lenient:=%s, conjunction_mode:=%s)");
    }

    #[test]
    fn test_parse_with_field_is_legacy_only() {
        let fragment = v2(ParseWithField::new("title", "shoes OR boots"));
        assert_eq!(
            fragment.text,
            "paradedb.parse_with_field(%s, %s, lenient:=%s, conjunction_mode:=%s)"
        );
    }
}
