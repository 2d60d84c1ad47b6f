//! Compiled output
//!
//! A fragment is query text plus the values bound to its `%s` placeholders,
//! in placeholder order. Fragments compose by concatenation: splicing one
//! fragment into another appends its params after everything already bound.

use searchql_core::{ResolutionError, SqlValue};
use serde::Serialize;

/// Placeholder marker used in compiled text
pub const PLACEHOLDER: &str = "%s";

/// Query text with its bound parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledFragment {
    /// Query text with `%s` placeholders
    pub text: String,

    /// Values bound to the placeholders, in order
    pub params: Vec<SqlValue>,
}

impl CompiledFragment {
    /// Create a fragment
    pub fn new(text: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Fragment without parameters
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// A single bound value
    pub fn bound(value: impl Into<SqlValue>) -> Self {
        Self::new(PLACEHOLDER, vec![value.into()])
    }

    /// `ARRAY[...]` over already compiled elements
    pub fn array(elements: Vec<CompiledFragment>) -> Self {
        let mut texts = Vec::with_capacity(elements.len());
        let mut params = Vec::new();
        for element in elements {
            texts.push(element.text);
            params.extend(element.params);
        }
        Self::new(format!("ARRAY[{}]", texts.join(", ")), params)
    }

    /// `ARRAY[%s, ...]` with every element bound
    pub fn bound_array<T, I>(values: I) -> Self
    where
        T: Into<SqlValue>,
        I: IntoIterator<Item = T>,
    {
        Self::array(values.into_iter().map(Self::bound).collect())
    }

    /// Prefix the text with `lhs op `, keeping params unchanged
    pub fn with_operand(mut self, lhs: &str, op: &str) -> Self {
        self.text = format!("{} {} {}", lhs, op, self.text);
        self
    }

    /// Wrap the text in parentheses
    pub fn parenthesized(mut self) -> Self {
        self.text = format!("({})", self.text);
        self
    }

    /// Number of placeholders in the text
    pub fn placeholder_count(&self) -> usize {
        self.text.matches(PLACEHOLDER).count()
    }
}

/// Top-level outcome of compiling an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    Fragment(CompiledFragment),
    /// A field could not be resolved and the soft-fail policy is active;
    /// callers usually treat this as a query matching nothing
    Unresolved(ResolutionError),
}

impl Compiled {
    /// The fragment, if compilation produced one
    pub fn fragment(self) -> Option<CompiledFragment> {
        match self {
            Compiled::Fragment(fragment) => Some(fragment),
            Compiled::Unresolved(_) => None,
        }
    }

    /// Returns true for the unresolved sentinel
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Compiled::Unresolved(_))
    }
}

/// Accumulates the argument list of a function call
#[derive(Debug, Default)]
pub(crate) struct CallBuilder {
    args: Vec<String>,
    params: Vec<SqlValue>,
}

impl CallBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Positional bound argument
    pub(crate) fn bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.args.push(PLACEHOLDER.to_string());
        self.params.push(value.into());
        self
    }

    /// Bound argument rendered through a trusted template holding one `%s`
    pub(crate) fn bind_with(&mut self, template: String, value: impl Into<SqlValue>) -> &mut Self {
        self.args.push(template);
        self.params.push(value.into());
        self
    }

    /// Positional bound argument with a trusted cast suffix
    pub(crate) fn bind_cast(&mut self, value: impl Into<SqlValue>, cast: &str) -> &mut Self {
        self.bind_with(format!("{}::{}", PLACEHOLDER, cast), value)
    }

    /// `name:=%s`
    pub(crate) fn named(&mut self, name: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.args.push(format!("{}:={}", name, PLACEHOLDER));
        self.params.push(value.into());
        self
    }

    /// `name:=%s` when the value is present
    pub(crate) fn named_opt<T: Into<SqlValue>>(&mut self, name: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.named(name, value);
        }
        self
    }

    /// Trusted text emitted verbatim
    pub(crate) fn inline(&mut self, text: impl Into<String>) -> &mut Self {
        self.args.push(text.into());
        self
    }

    /// Splice a compiled fragment as a positional argument
    pub(crate) fn splice(&mut self, fragment: CompiledFragment) -> &mut Self {
        self.args.push(fragment.text);
        self.params.extend(fragment.params);
        self
    }

    /// Splice a compiled fragment as `name:=<fragment>`
    pub(crate) fn named_splice(&mut self, name: &str, fragment: CompiledFragment) -> &mut Self {
        self.args.push(format!("{}:={}", name, fragment.text));
        self.params.extend(fragment.params);
        self
    }

    /// Render as `schema.function(args)`
    pub(crate) fn call(self, schema: &str, function: &str) -> CompiledFragment {
        CompiledFragment::new(
            format!("{}.{}({})", schema, function, self.args.join(", ")),
            self.params,
        )
    }
}
