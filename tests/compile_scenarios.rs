//! End-to-end compile scenarios through the facade crate

use searchql::expr::{
    All, Boolean, Empty, Exists, Match, MoreLikeThis, Parse, Phrase, PhrasePrefix, Range,
    RangeCast, RangeTerm, RangeType, Regex, Term, TermSet,
};
use searchql::query::lookup::Arg;
use searchql::{
    ColumnType, Compiled, CompiledFragment, Compiler, CompilerConfig, ExprBuilder, Expression,
    LookupAdapter, LookupValue, Proximity, RelationKind, ResolutionError, Schema, SchemaContext,
    SqlValue, TableSchema,
};

fn schema() -> Schema {
    Schema::new()
        .with_table(
            TableSchema::new("product", "shop_product", "id")
                .column("name", ColumnType::Text)
                .column("description", ColumnType::Text)
                .column("rank", ColumnType::Integer)
                .column("price_range", ColumnType::Range)
                .relation("vendor", RelationKind::ForeignKey, "vendor"),
        )
        .with_table(
            TableSchema::new("vendor", "shop_vendor", "id")
                .column("city", ColumnType::Text)
                .relation("region", RelationKind::ForeignKey, "region"),
        )
        .with_table(TableSchema::new("region", "shop_region", "id").column("name", ColumnType::Text))
}

fn compile(config: &CompilerConfig, expr: impl Into<Expression>) -> searchql::Result<CompiledFragment> {
    let schema = schema();
    let ctx = SchemaContext::new(&schema, "product").with_join("vendor");
    Compiler::new(config, &ctx).compile_fragment(&expr.into())
}

fn v2_config() -> CompilerConfig {
    CompilerConfig::v2().legacy_functions(Vec::<String>::new())
}

fn minimal_nodes() -> Vec<Expression> {
    vec![
        All::new().into(),
        Exists::new("name").into(),
        Match::new("name", "shoes").into(),
        Range::new("rank", RangeType::Int4Range, 1i64, Some(5i64.into())).unwrap().into(),
        RangeTerm::new("price_range", "[1,5)", RangeCast::Int4Range).unwrap().into(),
        Regex::new("name", "sh.*").into(),
        Term::new("name", "shoes").into(),
        Phrase::new("description", ["running", "shoes"]).unwrap().into(),
        PhrasePrefix::new("description", ["running", "sh"]).unwrap().into(),
    ]
}

#[test]
fn test_function_names_follow_dialect() {
    for expr in minimal_nodes() {
        let legacy = compile(&CompilerConfig::default(), expr.clone()).unwrap();
        let v2 = compile(&v2_config(), expr.clone()).unwrap();
        assert!(legacy.text.contains(&format!("paradedb.{}(", expr.function())), "{}", legacy.text);
        assert!(v2.text.contains(&format!("pdb.{}(", expr.function())), "{}", v2.text);
        assert_eq!(legacy.placeholder_count(), legacy.params.len());
        assert_eq!(v2.placeholder_count(), v2.params.len());
    }
}

#[test]
fn test_repeated_compilation_is_identical() {
    let config = CompilerConfig::default();
    for expr in minimal_nodes() {
        assert_eq!(compile(&config, expr.clone()).unwrap(), compile(&config, expr).unwrap());
    }
}

#[test]
fn test_injection_payload_is_bound() {
    let payload = "'; DROP TABLE x; --";
    for config in [CompilerConfig::default(), v2_config()] {
        let fragment = compile(&config, Term::new("name", payload)).unwrap();
        assert!(!fragment.text.contains(payload));
        assert!(!fragment.text.contains("DROP"));
        assert!(fragment.params.contains(&SqlValue::from(payload)));
    }
}

#[test]
fn test_phrase_needs_two_phrases() {
    assert!(Phrase::new("name", ["only_one"]).unwrap_err().is_validation());
    assert!(Phrase::new("name", ["a", "b"]).is_ok());
}

#[test]
fn test_proximity_validation() {
    assert!(Proximity::new(["a", "b"]).unwrap_err().is_validation());

    let proximity = Proximity::new(["a", "##", "1", "##>", "b"]).unwrap().field("name");
    let fragment = compile(&v2_config(), proximity).unwrap();
    assert_eq!(fragment.text, "shop_product.name @@@ (%s ## %s ##> %s)");
}

#[test]
fn test_more_like_this_sources() {
    let document = serde_json::json!({"title": "x"});
    let document = document.as_object().cloned();
    assert!(MoreLikeThis::new(Some(1i64.into()), document).unwrap_err().is_validation());
    assert!(MoreLikeThis::new(Some(1i64.into()), None).is_ok());
}

#[test]
fn test_term_set_needs_terms() {
    assert!(TermSet::new(Vec::new()).unwrap_err().is_validation());
    assert!(TermSet::new(vec![Term::new("rank", 1i64)]).is_ok());
}

#[test]
fn test_term_set_lookup_equals_direct_node() {
    let schema = schema();
    let ctx = SchemaContext::new(&schema, "product");
    let config = CompilerConfig::default();
    let compiler = Compiler::new(&config, &ctx);

    let terms = Arg::list([
        Expression::from(Term::new("rank", 1i64)),
        Expression::from(Term::new("rank", 200i64)),
    ]);
    let adapted = LookupAdapter::new(&compiler)
        .adapt("term_set", LookupValue::named([("terms", terms)]), &"id".into())
        .unwrap();

    let direct: Expression = TermSet::new(vec![Term::new("rank", 1i64), Term::new("rank", 200i64)])
        .unwrap()
        .match_op(true)
        .into();

    let adapted = compiler.compile_fragment(&adapted).unwrap();
    assert_eq!(adapted, compiler.compile_fragment(&direct).unwrap());
    assert_eq!(
        adapted.text,
        "shop_product.id @@@ paradedb.term_set(terms:=ARRAY[paradedb.term(%s, %s), paradedb.term(%s, %s)])"
    );
}

#[test]
fn test_resolution_policy() {
    let schema = schema();
    let ctx = SchemaContext::new(&schema, "product").with_join("vendor");
    let expr: Expression = Term::new("vendor.region.name", "north").into();

    let soft = CompilerConfig::default();
    let compiled = Compiler::new(&soft, &ctx).compile(&expr).unwrap();
    assert_eq!(
        compiled,
        Compiled::Unresolved(ResolutionError::JoinRequired("vendor.region".into()))
    );

    let strict = CompilerConfig::strict();
    let err = Compiler::new(&strict, &ctx).compile(&expr).unwrap_err();
    assert!(err.is_resolution());
}

#[test]
fn test_nested_queries_keep_their_fields() {
    let boolean = Boolean::new(
        vec![Term::new("vendor.city", "Lyon").into()],
        vec![Regex::new("name", "refurb.*").into()],
        Vec::new(),
    )
    .unwrap()
    .match_op(true);

    let fragment = compile(&v2_config(), boolean).unwrap();
    assert_eq!(
        fragment.text,
        "shop_product.id @@@ paradedb.boolean(must:=ARRAY[paradedb.term(%s, %s)], must_not:=ARRAY[paradedb.regex(%s, %s)])"
    );
    assert_eq!(
        fragment.params,
        vec![
            SqlValue::from("city"),
            SqlValue::from("Lyon"),
            SqlValue::from("name"),
            SqlValue::from("refurb.*")
        ]
    );
}

#[test]
fn test_compound_children_share_the_legacy_family() {
    let boolean = Boolean::new(
        vec![All::new().into(), Parse::new("name:shoes").into()],
        vec![Exists::new("description").into()],
        Vec::new(),
    )
    .unwrap()
    .match_op(true);

    let fragment = compile(&v2_config(), boolean).unwrap();
    assert_eq!(
        fragment.text,
        "shop_product.id @@@ paradedb.boolean(must:=ARRAY[paradedb.all(), paradedb.parse(%s, lenient:=%s, conjunction_mode:=%s)], must_not:=ARRAY[paradedb.exists(%s)])"
    );
    assert_eq!(fragment.placeholder_count(), fragment.params.len());

    let empty = Boolean::must(vec![Empty::new().into()]).unwrap();
    assert!(compile(&v2_config(), empty).unwrap_err().is_dialect());
}

#[test]
fn test_cast_type_names_cannot_carry_sql() {
    for payload in ["mood OR true", "mood) OR (true"] {
        assert!(Term::new("name", "x").enum_cast(payload).unwrap_err().is_validation());
        assert!(searchql::query::ValueCast::new("x", payload).unwrap_err().is_validation());
    }
}
