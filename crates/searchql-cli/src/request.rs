//! Compile requests read by the command-line front end

use anyhow::{Context, Result};
use searchql_core::{CompilerConfig, Schema, SchemaContext};
use searchql_query::{Aggregation, Compiled, CompiledFragment, Compiler, LookupAdapter, LookupRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Everything needed to compile one query's search clauses
#[derive(Debug, Deserialize)]
pub struct Request {
    pub schema: Schema,

    /// Model the surrounding query selects from
    pub root: String,

    /// Relation paths the surrounding query has joined
    #[serde(default)]
    pub joins: Vec<String>,

    /// Table aliases introduced by the surrounding query
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    #[serde(default)]
    pub config: CompilerConfig,

    #[serde(default)]
    pub filters: Vec<LookupRequest>,

    /// Aggregations by alias
    #[serde(default)]
    pub aggregations: BTreeMap<String, Aggregation>,
}

/// Outcome of one filter
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FilterOutput {
    Fragment(CompiledFragment),
    Unresolved { unresolved: String },
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Response {
    pub filters: Vec<FilterOutput>,
    pub aggregations: BTreeMap<String, CompiledFragment>,
}

impl Request {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse request")
    }

    /// Compile every filter and aggregation
    pub fn compile(&self) -> Result<Response> {
        let mut ctx = SchemaContext::new(&self.schema, &self.root);
        for join in &self.joins {
            ctx = ctx.with_join(join);
        }
        for (alias, table) in &self.aliases {
            ctx = ctx.with_alias(alias, table);
        }

        let compiler = Compiler::new(&self.config, &ctx);
        let adapter = LookupAdapter::new(&compiler);

        let mut filters = Vec::with_capacity(self.filters.len());
        for (index, filter) in self.filters.iter().enumerate() {
            let output = match adapter
                .compile_request(filter)
                .with_context(|| format!("Failed to compile filter {} ({})", index, filter.lookup))?
            {
                Compiled::Fragment(fragment) => FilterOutput::Fragment(fragment),
                Compiled::Unresolved(err) => FilterOutput::Unresolved {
                    unresolved: err.to_string(),
                },
            };
            filters.push(output);
        }

        let mut aggregations = BTreeMap::new();
        for (alias, aggregation) in &self.aggregations {
            let fragment = compiler
                .compile_aggregation(aggregation)
                .with_context(|| format!("Failed to compile aggregation {}", alias))?;
            debug!("Compiled aggregation {}", alias);
            aggregations.insert(alias.clone(), fragment);
        }

        info!(
            "Compiled {} filters and {} aggregations",
            filters.len(),
            aggregations.len()
        );
        Ok(Response { filters, aggregations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(extra: serde_json::Value) -> Request {
        let mut base = json!({
            "schema": {
                "tables": {
                    "article": {
                        "model": "article",
                        "table": "article",
                        "primary_key": "id",
                        "columns": [
                            {"name": "id", "column_type": "integer"},
                            {"name": "title", "column_type": "text"},
                            {"name": "rank", "column_type": "integer"}
                        ],
                        "relations": {
                            "user": {"name": "user", "kind": "foreign_key", "target": "user"}
                        }
                    },
                    "user": {
                        "model": "user",
                        "table": "auth_user",
                        "primary_key": "id",
                        "columns": [{"name": "email"}]
                    }
                }
            },
            "root": "article"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_compile_filters() {
        let response = request(json!({
            "filters": [
                {"lookup": "term", "field": "rank", "value": "3"},
                {"lookup": "term", "field": "user.email", "value": "a@b.c"}
            ]
        }))
        .compile()
        .unwrap();

        assert_eq!(
            serde_json::to_value(&response.filters).unwrap(),
            json!([
                {
                    "text": "article.id @@@ paradedb.term(%s, %s)",
                    "params": [
                        {"type": "text", "value": "rank"},
                        {"type": "integer", "value": 3}
                    ]
                },
                {"unresolved": "Relation path user is not joined in the current query"}
            ])
        );
    }

    #[test]
    fn test_joins_and_config() {
        let response = request(json!({
            "joins": ["user"],
            "config": {"dialect": {"default_mode": "v2", "legacy_functions": []}},
            "filters": [{"lookup": "term", "field": "user.email", "value": "a@b.c"}]
        }))
        .compile()
        .unwrap();

        match &response.filters[0] {
            FilterOutput::Fragment(fragment) => {
                assert_eq!(fragment.text, "auth_user.email @@@ pdb.term(%s)");
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_compile_aggregations() {
        let response = request(json!({
            "aggregations": {"top_rank": {"type": "max", "field": "rank"}}
        }))
        .compile()
        .unwrap();

        let fragment = &response.aggregations["top_rank"];
        assert_eq!(fragment.text, "pdb.agg(%s)");
    }

    #[test]
    fn test_errors_carry_context() {
        let err = request(json!({"filters": [{"lookup": "nope", "field": "title", "value": 1}]}))
            .compile()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown lookup: nope"));

        assert!(Request::from_json("{\"root\": 1}").is_err());
    }
}
