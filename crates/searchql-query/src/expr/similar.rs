//! More-like-this queries

use super::ExprOptions;
use crate::compiler::{Position, Session};
use crate::dialect;
use crate::fragment::CompiledFragment;
use searchql_core::{Error, Result, SqlValue};
use serde_json::{Map, Value};

/// What the similar documents are compared against
#[derive(Debug, Clone, PartialEq)]
pub enum MoreLikeThisSource {
    /// An indexed row, by key value
    DocumentId(SqlValue),
    /// An ad hoc document of field values
    Document(Map<String, Value>),
}

/// Documents similar to a row or to an ad hoc document
#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThis {
    source: MoreLikeThisSource,
    fields: Vec<String>,
    min_doc_frequency: Option<u32>,
    max_doc_frequency: Option<u32>,
    min_term_frequency: Option<u32>,
    max_query_terms: Option<u32>,
    min_word_length: Option<u32>,
    max_word_length: Option<u32>,
    boost_factor: Option<f64>,
    stop_words: Vec<String>,
    pub(crate) options: ExprOptions,
}

impl MoreLikeThis {
    /// Exactly one of `document_id` and `document` must be given
    pub fn new(document_id: Option<SqlValue>, document: Option<Map<String, Value>>) -> Result<Self> {
        let source = match (document_id.filter(|id| !id.is_null()), document) {
            (Some(id), None) => MoreLikeThisSource::DocumentId(id),
            (None, Some(document)) if document.is_empty() => {
                return Err(Error::validation("MoreLikeThis", "document cannot be empty"));
            }
            (None, Some(document)) => MoreLikeThisSource::Document(document),
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "MoreLikeThis",
                    "document_id and document are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(Error::validation(
                    "MoreLikeThis",
                    "one of document_id or document is required",
                ));
            }
        };

        Ok(Self {
            source,
            fields: Vec::new(),
            min_doc_frequency: None,
            max_doc_frequency: None,
            min_term_frequency: None,
            max_query_terms: None,
            min_word_length: None,
            max_word_length: None,
            boost_factor: None,
            stop_words: Vec::new(),
            options: ExprOptions::default(),
        })
    }

    pub fn by_id(document_id: impl Into<SqlValue>) -> Result<Self> {
        Self::new(Some(document_id.into()), None)
    }

    pub fn like_document(document: Map<String, Value>) -> Result<Self> {
        Self::new(None, Some(document))
    }

    pub fn source(&self) -> &MoreLikeThisSource {
        &self.source
    }

    /// Restrict the comparison to some fields of the source row
    pub fn fields<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if matches!(self.source, MoreLikeThisSource::Document(_)) {
            return Err(Error::validation(
                "MoreLikeThis",
                "fields can only be used with document_id",
            ));
        }
        self.fields = fields.into_iter().map(Into::into).collect();
        Ok(self)
    }

    pub fn min_doc_frequency(mut self, value: u32) -> Self {
        self.min_doc_frequency = Some(value);
        self
    }

    pub fn max_doc_frequency(mut self, value: u32) -> Self {
        self.max_doc_frequency = Some(value);
        self
    }

    pub fn min_term_frequency(mut self, value: u32) -> Self {
        self.min_term_frequency = Some(value);
        self
    }

    pub fn max_query_terms(mut self, value: u32) -> Self {
        self.max_query_terms = Some(value);
        self
    }

    pub fn min_word_length(mut self, value: u32) -> Self {
        self.min_word_length = Some(value);
        self
    }

    pub fn max_word_length(mut self, value: u32) -> Self {
        self.max_word_length = Some(value);
        self
    }

    pub fn boost_factor(mut self, value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::validation("MoreLikeThis", "boost_factor must be finite"));
        }
        self.boost_factor = Some(value);
        Ok(self)
    }

    pub fn stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn compile_in(&self, session: &Session<'_>, position: Position) -> Result<CompiledFragment> {
        session.keyed_call(&dialect::MORE_LIKE_THIS, &self.options, position, |call| {
            match &self.source {
                MoreLikeThisSource::DocumentId(id) => {
                    call.named("key_value", id.clone());
                    if !self.fields.is_empty() {
                        call.named_splice(
                            "fields",
                            CompiledFragment::bound_array(self.fields.iter().cloned()),
                        );
                    }
                }
                MoreLikeThisSource::Document(document) => {
                    call.named("document", Value::Object(document.clone()));
                }
            }

            call.named_opt("min_doc_frequency", self.min_doc_frequency)
                .named_opt("max_doc_frequency", self.max_doc_frequency)
                .named_opt("min_term_frequency", self.min_term_frequency)
                .named_opt("max_query_terms", self.max_query_terms)
                .named_opt("min_word_length", self.min_word_length)
                .named_opt("max_word_length", self.max_word_length)
                .named_opt("boost_factor", self.boost_factor);

            if !self.stop_words.is_empty() {
                call.named_splice(
                    "stopwords",
                    CompiledFragment::bound_array(self.stop_words.iter().cloned()),
                );
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::{compile_with, legacy};
    use crate::expr::ExprBuilder;
    use searchql_core::CompilerConfig;
    use serde_json::json;

    fn document() -> Map<String, Value> {
        match json!({"title": "x"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_source_is_exclusive() {
        let err = MoreLikeThis::new(Some(1i64.into()), Some(document())).unwrap_err();
        assert!(err.is_validation());
        assert!(MoreLikeThis::new(None, None).is_err());
        assert!(MoreLikeThis::like_document(Map::new()).is_err());
        assert!(MoreLikeThis::new(Some(1i64.into()), None).is_ok());
    }

    #[test]
    fn test_by_id_with_fields() {
        let mlt = MoreLikeThis::by_id(123i64)
            .unwrap()
            .fields(["title", "body"])
            .unwrap()
            .min_doc_frequency(2)
            .stop_words(["the"])
            .match_op(true);
        let fragment = legacy(mlt);
        assert_eq!(
            fragment.text,
            "article.id @@@ pdb.more_like_this(key_value:=%s, fields:=ARRAY[%s, %s], min_doc_frequency:=%s, stopwords:=ARRAY[%s])"
        );
        assert_eq!(
            fragment.params,
            vec![
                SqlValue::Integer(123),
                SqlValue::from("title"),
                SqlValue::from("body"),
                SqlValue::Integer(2),
                SqlValue::from("the")
            ]
        );
    }

    #[test]
    fn test_document_source() {
        let mlt = MoreLikeThis::like_document(document()).unwrap();
        assert!(mlt.clone().fields(["title"]).is_err());

        let fragment = legacy(mlt.boost_factor(1.5).unwrap());
        assert_eq!(fragment.text, "pdb.more_like_this(document:=%s, boost_factor:=%s)");
        assert_eq!(fragment.params[0], SqlValue::Json(json!({"title": "x"})));
    }

    #[test]
    fn test_rejected_under_forced_legacy() {
        let mlt = MoreLikeThis::by_id(1i64).unwrap();
        let err = compile_with(&CompilerConfig::default().force_legacy(true), mlt).unwrap_err();
        assert!(err.is_dialect());
    }
}
