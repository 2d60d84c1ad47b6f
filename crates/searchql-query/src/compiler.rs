//! Compilation driver
//!
//! A `Compiler` pairs a frozen configuration snapshot with a field resolver
//! for one schema context. Each top-level compile call opens a `Session`
//! that memoizes field resolution and walks the expression tree, asking the
//! dialect selector per node.

use crate::aggregate::{Aggregation, Facet};
use crate::dialect::{DialectSelector, FieldSlot, FunctionSpec, Selection};
use crate::expr::{ExprOptions, Expression};
use crate::fragment::{CallBuilder, Compiled, CompiledFragment, PLACEHOLDER};
use searchql_core::{
    CompilerConfig, Error, FieldResolver, FieldSpecifier, KeyReference, ResolutionPolicy,
    ResolvedField, Result, SchemaContext, SqlValue,
};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The engine's native match operator
pub const MATCH_OPERATOR: &str = "@@@";

/// Where a node sits in the tree being compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The root of a compile call
    Top,
    /// A query value inside a compound node
    Nested,
}

/// Compiles expressions against one schema context
#[derive(Debug, Clone)]
pub struct Compiler<'a> {
    config: &'a CompilerConfig,
    resolver: FieldResolver<'a>,
}

impl<'a> Compiler<'a> {
    /// Create a compiler; the resolution policy comes from the configuration
    pub fn new(config: &'a CompilerConfig, ctx: &'a SchemaContext<'a>) -> Self {
        Self {
            config,
            resolver: FieldResolver::new(ctx, config.resolution_policy()),
        }
    }

    /// Configuration snapshot in use
    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    /// Field resolver in use
    pub fn resolver(&self) -> &FieldResolver<'a> {
        &self.resolver
    }

    /// Dialect selector over this compiler's configuration
    pub fn selector(&self) -> DialectSelector<'a> {
        DialectSelector::new(&self.config.dialect)
    }

    /// Compile under the configured resolution policy
    ///
    /// With soft-fail active, a resolution failure anywhere in the tree
    /// yields `Compiled::Unresolved` instead of an error. No partial
    /// fragment is ever returned.
    pub fn compile(&self, expr: &Expression) -> Result<Compiled> {
        match self.compile_fragment(expr) {
            Ok(fragment) => Ok(Compiled::Fragment(fragment)),
            Err(Error::Resolution(err)) if self.resolver.policy() == ResolutionPolicy::SoftFail => {
                warn!("Compiling {} matched nothing: {}", expr.function(), err);
                Ok(Compiled::Unresolved(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Compile, returning resolution failures as errors
    pub fn compile_fragment(&self, expr: &Expression) -> Result<CompiledFragment> {
        let session = Session::new(self);
        expr.compile_in(&session, Position::Top)
    }

    /// Compile an aggregation to `pdb.agg(%s)` with its JSON description bound
    pub fn compile_aggregation(&self, aggregation: &Aggregation) -> Result<CompiledFragment> {
        let session = Session::new(self);
        let request = aggregation.to_json(&|field| session.aggregation_field(field))?;
        debug!("Compiled {} aggregation", aggregation.kind());
        Ok(CompiledFragment::new(
            format!("pdb.agg({})", PLACEHOLDER),
            vec![SqlValue::Json(request)],
        ))
    }

    /// Compile a facet: the aggregation as a window over the whole result
    pub fn compile_facet(&self, facet: &Facet) -> Result<CompiledFragment> {
        let mut fragment = self.compile_aggregation(facet.aggregation())?;
        fragment.text.push_str(" OVER ()");
        Ok(fragment)
    }
}

/// State for one compile call
pub(crate) struct Session<'c> {
    compiler: &'c Compiler<'c>,
    resolved: RefCell<HashMap<FieldSpecifier, ResolvedField>>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(compiler: &'c Compiler<'c>) -> Self {
        Self {
            compiler,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a field, at most once per session
    pub(crate) fn resolve(&self, spec: &FieldSpecifier) -> Result<ResolvedField> {
        if let Some(field) = self.resolved.borrow().get(spec) {
            return Ok(field.clone());
        }

        let field = self.compiler.resolver.try_resolve(spec)?;
        self.resolved.borrow_mut().insert(spec.clone(), field.clone());
        Ok(field)
    }

    /// Key a node is anchored on: explicit key, else the field's table, else the root
    pub(crate) fn key(&self, options: &ExprOptions, field: Option<&ResolvedField>) -> Result<KeyReference> {
        match (&options.key, field) {
            (Some(key), _) => Ok(key.clone()),
            (None, Some(field)) => Ok(field.key.clone()),
            (None, None) => self.compiler.resolver.root_key(),
        }
    }

    /// Select the dialect for a node at a position
    pub(crate) fn select(
        &self,
        spec: &FunctionSpec,
        options: &ExprOptions,
        position: Position,
    ) -> Result<Selection> {
        let selector = self.compiler.selector();
        match position {
            Position::Top => selector.select(spec, options.force_legacy),
            Position::Nested => selector.select_nested(spec),
        }
    }

    /// Compile a sub-expression of a compound node
    pub(crate) fn nested(&self, expr: &Expression) -> Result<CompiledFragment> {
        expr.compile_in(self, Position::Nested)
    }

    /// Compile every sub-expression, preserving order
    pub(crate) fn nested_all(&self, exprs: &[Expression]) -> Result<Vec<CompiledFragment>> {
        exprs.iter().map(|expr| self.nested(expr)).collect()
    }

    /// Emit a function call over a field
    pub(crate) fn field_call<F>(
        &self,
        spec: &FunctionSpec,
        field: &FieldSpecifier,
        options: &ExprOptions,
        position: Position,
        build: F,
    ) -> Result<CompiledFragment>
    where
        F: FnOnce(&mut CallBuilder) -> Result<()>,
    {
        let resolved = self.resolve(field)?;
        let selection = self.select(spec, options, position)?;

        let mut call = CallBuilder::new();
        match selection.slot {
            // The legacy signature names the indexed field; a derived field
            // keeps its verbatim text for the operand form only
            FieldSlot::Argument => {
                call.bind(resolved.column.clone());
            }
            FieldSlot::Inline => {
                call.inline(resolved.sql.clone());
            }
            FieldSlot::None | FieldSlot::Operand => {}
        }
        build(&mut call)?;

        let fragment = call.call(selection.schema(), spec.name);
        self.finish(spec, selection, fragment, Some(&resolved), options, position)
    }

    /// Emit a function call that has no field of its own
    pub(crate) fn keyed_call<F>(
        &self,
        spec: &FunctionSpec,
        options: &ExprOptions,
        position: Position,
        build: F,
    ) -> Result<CompiledFragment>
    where
        F: FnOnce(&mut CallBuilder) -> Result<()>,
    {
        let selection = self.select(spec, options, position)?;

        let mut call = CallBuilder::new();
        if selection.slot == FieldSlot::Inline {
            call.inline(self.key(options, None)?.sql());
        }
        build(&mut call)?;

        let fragment = call.call(selection.schema(), spec.name);
        self.finish(spec, selection, fragment, None, options, position)
    }

    /// Apply the operand form or the key match wrapper
    pub(crate) fn finish(
        &self,
        spec: &FunctionSpec,
        selection: Selection,
        fragment: CompiledFragment,
        field: Option<&ResolvedField>,
        options: &ExprOptions,
        position: Position,
    ) -> Result<CompiledFragment> {
        let fragment = match (selection.slot, field) {
            (FieldSlot::Operand, Some(field)) => fragment.with_operand(&field.sql, MATCH_OPERATOR),
            _ if options.match_op && position == Position::Top => {
                let key = self.key(options, field)?;
                fragment.with_operand(&key.sql(), MATCH_OPERATOR)
            }
            _ => fragment,
        };

        self.log(spec, selection, &fragment);
        Ok(fragment)
    }

    pub(crate) fn log(&self, spec: &FunctionSpec, selection: Selection, fragment: &CompiledFragment) {
        debug!(
            "Compiled {} in {} mode with {} params",
            spec.name,
            selection.mode,
            fragment.params.len()
        );
    }

    /// Column name an aggregation addresses
    fn aggregation_field(&self, field: &str) -> Result<String> {
        Ok(self.resolve(&FieldSpecifier::parse(field))?.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{All, ExprBuilder, Term};
    use searchql_core::{ColumnType, RelationKind, ResolutionError, Schema, TableSchema};

    fn schema() -> Schema {
        Schema::new()
            .with_table(
                TableSchema::new("article", "article", "id")
                    .column("title", ColumnType::Text)
                    .relation("user", RelationKind::ForeignKey, "user"),
            )
            .with_table(TableSchema::new("user", "auth_user", "id").column("email", ColumnType::Text))
    }

    #[test]
    fn test_compile_top_level_match_op() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let config = CompilerConfig::default();
        let compiler = Compiler::new(&config, &ctx);

        let expr: Expression = Term::new("title", "shoes").match_op(true).into();
        let fragment = compiler.compile_fragment(&expr).unwrap();
        assert_eq!(fragment.text, "article.id @@@ paradedb.term(%s, %s)");
        assert_eq!(
            fragment.params,
            vec![SqlValue::from("title"), SqlValue::from("shoes")]
        );
    }

    #[test]
    fn test_soft_fail_yields_unresolved() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let expr: Expression = Term::new("user.email", "a@b.c").into();

        let config = CompilerConfig::default();
        let compiled = Compiler::new(&config, &ctx).compile(&expr).unwrap();
        assert_eq!(
            compiled,
            Compiled::Unresolved(ResolutionError::JoinRequired("user".into()))
        );

        let strict = CompilerConfig::strict();
        let err = Compiler::new(&strict, &ctx).compile(&expr).unwrap_err();
        assert!(err.is_resolution());
    }

    #[test]
    fn test_session_memoizes_resolution() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let config = CompilerConfig::default();
        let compiler = Compiler::new(&config, &ctx);
        let session = Session::new(&compiler);

        let spec = FieldSpecifier::parse("title");
        let first = session.resolve(&spec).unwrap();
        assert_eq!(session.resolved.borrow().len(), 1);
        let second = session.resolve(&spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.resolved.borrow().len(), 1);
    }

    #[test]
    fn test_aggregation_and_facet() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let config = CompilerConfig::default();
        let compiler = Compiler::new(&config, &ctx);

        let stats = Aggregation::stats("title");
        let fragment = compiler.compile_aggregation(&stats).unwrap();
        assert_eq!(fragment.text, "pdb.agg(%s)");
        assert_eq!(
            fragment.params,
            vec![SqlValue::Json(serde_json::json!({"stats": {"field": "title"}}))]
        );

        let facet = compiler.compile_facet(&Facet::new(stats)).unwrap();
        assert_eq!(facet.text, "pdb.agg(%s) OVER ()");
        assert_eq!(facet.params, fragment.params);

        assert!(compiler.compile_aggregation(&Aggregation::stats("nope")).unwrap_err().is_resolution());
    }

    #[test]
    fn test_derived_field_per_slot() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let field = FieldSpecifier::derived("lower(article.title)", FieldSpecifier::parse("title"));
        let expr: Expression = Term::new(field, "shoes").into();

        let config = CompilerConfig::default();
        let fragment = Compiler::new(&config, &ctx).compile_fragment(&expr).unwrap();
        assert_eq!(fragment.text, "paradedb.term(%s, %s)");
        assert_eq!(fragment.params[0], SqlValue::from("title"));

        let config = CompilerConfig::v2().legacy_functions(Vec::<String>::new());
        let fragment = Compiler::new(&config, &ctx).compile_fragment(&expr).unwrap();
        assert_eq!(fragment.text, "lower(article.title) @@@ pdb.term(%s)");
        assert_eq!(fragment.params, vec![SqlValue::from("shoes")]);
    }

    #[test]
    fn test_explicit_key_wins() {
        let schema = schema();
        let ctx = SchemaContext::new(&schema, "article");
        let config = CompilerConfig::v2();
        let compiler = Compiler::new(&config, &ctx);

        let expr: Expression = All::new()
            .match_op(true)
            .key(KeyReference::new("T1", "uuid"))
            .into();
        let fragment = compiler.compile_fragment(&expr).unwrap();
        assert_eq!(fragment.text, "T1.uuid @@@ pdb.all()");
    }
}
