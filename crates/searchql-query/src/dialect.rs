//! Function table and dialect selection
//!
//! Every search function exists in up to two conventions. The legacy family
//! lives in the `paradedb` schema and takes the field as its first argument;
//! the v2 family lives in `pdb` and is applied to the field as the left
//! operand of `@@@`. The table below is the single source of truth for which
//! function is available where and where its field goes.

use searchql_core::{DialectConfig, DialectMode, Error, Result};

/// Where a function's field ends up in the emitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    /// No field, the call stands alone
    None,
    /// Field name bound as the first argument
    Argument,
    /// Qualified column text inlined as the first argument
    Inline,
    /// Field is the left operand: `table.column @@@ pdb.fn(...)`
    Operand,
}

/// Availability of one logical function in both conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpec {
    /// Logical name, also the key of the legacy function list
    pub name: &'static str,
    /// Field slot under the legacy convention, `None` when unavailable
    pub legacy: Option<FieldSlot>,
    /// Field slot under the v2 convention, `None` when unavailable
    pub v2: Option<FieldSlot>,
}

impl FunctionSpec {
    const fn both(name: &'static str, legacy: FieldSlot, v2: FieldSlot) -> Self {
        Self {
            name,
            legacy: Some(legacy),
            v2: Some(v2),
        }
    }

    const fn legacy_only(name: &'static str, slot: FieldSlot) -> Self {
        Self {
            name,
            legacy: Some(slot),
            v2: None,
        }
    }

    const fn v2_only(name: &'static str, slot: FieldSlot) -> Self {
        Self {
            name,
            legacy: None,
            v2: Some(slot),
        }
    }

    /// Field slot under a mode, `None` when the function is unavailable there
    pub fn slot(&self, mode: DialectMode) -> Option<FieldSlot> {
        match mode {
            DialectMode::Legacy => self.legacy,
            DialectMode::V2 => self.v2,
        }
    }

    /// Returns true when the function exists in both conventions
    pub fn is_dual(&self) -> bool {
        self.legacy.is_some() && self.v2.is_some()
    }
}

pub const ALL: FunctionSpec = FunctionSpec::both("all", FieldSlot::None, FieldSlot::None);
pub const EMPTY: FunctionSpec = FunctionSpec::v2_only("empty", FieldSlot::None);
pub const EXISTS: FunctionSpec =
    FunctionSpec::both("exists", FieldSlot::Argument, FieldSlot::Operand);
/// `exists` without a field only has the v2 spelling
pub const EXISTS_ANY: FunctionSpec = FunctionSpec::v2_only("exists", FieldSlot::None);
pub const MATCH: FunctionSpec = FunctionSpec::both("match", FieldSlot::Argument, FieldSlot::Operand);
pub const RANGE: FunctionSpec = FunctionSpec::both("range", FieldSlot::Argument, FieldSlot::Operand);
pub const RANGE_TERM: FunctionSpec =
    FunctionSpec::both("range_term", FieldSlot::Argument, FieldSlot::Operand);
pub const REGEX: FunctionSpec = FunctionSpec::both("regex", FieldSlot::Argument, FieldSlot::Operand);
pub const TERM: FunctionSpec = FunctionSpec::both("term", FieldSlot::Argument, FieldSlot::Operand);
pub const TERM_SET: FunctionSpec = FunctionSpec::legacy_only("term_set", FieldSlot::None);
pub const FUZZY_TERM: FunctionSpec =
    FunctionSpec::both("fuzzy_term", FieldSlot::Argument, FieldSlot::Operand);
pub const PHRASE: FunctionSpec = FunctionSpec::both("phrase", FieldSlot::Argument, FieldSlot::Operand);
pub const PHRASE_PREFIX: FunctionSpec =
    FunctionSpec::both("phrase_prefix", FieldSlot::Argument, FieldSlot::Operand);
pub const CONST_SCORE: FunctionSpec = FunctionSpec::legacy_only("const_score", FieldSlot::None);
pub const BOOST: FunctionSpec = FunctionSpec::legacy_only("boost", FieldSlot::None);
pub const DISJUNCTION_MAX: FunctionSpec =
    FunctionSpec::legacy_only("disjunction_max", FieldSlot::None);
pub const BOOLEAN: FunctionSpec = FunctionSpec::legacy_only("boolean", FieldSlot::None);
pub const MORE_LIKE_THIS: FunctionSpec = FunctionSpec::v2_only("more_like_this", FieldSlot::None);
pub const PARSE: FunctionSpec = FunctionSpec::both("parse", FieldSlot::None, FieldSlot::None);
pub const PARSE_WITH_FIELD: FunctionSpec =
    FunctionSpec::legacy_only("parse_with_field", FieldSlot::Argument);
pub const SCORE: FunctionSpec = FunctionSpec::v2_only("score", FieldSlot::Inline);
pub const SNIPPET: FunctionSpec = FunctionSpec::v2_only("snippet", FieldSlot::Inline);

// Operator forms. They never render a function call of their own, but they
// still go through selection so forced-legacy mode can reject them.
pub const SEARCH: FunctionSpec = FunctionSpec::both("search", FieldSlot::Operand, FieldSlot::Operand);
pub const MATCH_DISJUNCTION: FunctionSpec =
    FunctionSpec::v2_only("match_disjunction", FieldSlot::Operand);
pub const MATCH_CONJUNCTION: FunctionSpec =
    FunctionSpec::v2_only("match_conjunction", FieldSlot::Operand);
pub const PHRASE_OPERATOR: FunctionSpec = FunctionSpec::v2_only("phrase_operator", FieldSlot::Operand);
pub const TERM_OPERATOR: FunctionSpec = FunctionSpec::v2_only("term_operator", FieldSlot::Operand);
pub const PROXIMITY: FunctionSpec = FunctionSpec::v2_only("proximity", FieldSlot::Operand);
pub const JSON_OP: FunctionSpec = FunctionSpec::both("json_op", FieldSlot::Operand, FieldSlot::Operand);

/// Every function the compiler can emit
pub static FUNCTIONS: &[FunctionSpec] = &[
    ALL,
    EMPTY,
    EXISTS,
    MATCH,
    RANGE,
    RANGE_TERM,
    REGEX,
    TERM,
    TERM_SET,
    FUZZY_TERM,
    PHRASE,
    PHRASE_PREFIX,
    CONST_SCORE,
    BOOST,
    DISJUNCTION_MAX,
    BOOLEAN,
    MORE_LIKE_THIS,
    PARSE,
    PARSE_WITH_FIELD,
    SCORE,
    SNIPPET,
    SEARCH,
    MATCH_DISJUNCTION,
    MATCH_CONJUNCTION,
    PHRASE_OPERATOR,
    TERM_OPERATOR,
    PROXIMITY,
    JSON_OP,
];

/// Look up a function by logical name
pub fn function(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|spec| spec.name == name)
}

/// Schema prefix of a convention
pub fn schema_name(mode: DialectMode) -> &'static str {
    match mode {
        DialectMode::Legacy => "paradedb",
        DialectMode::V2 => "pdb",
    }
}

/// Outcome of selecting a dialect for one function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub mode: DialectMode,
    pub slot: FieldSlot,
}

impl Selection {
    /// Schema prefix to emit
    pub fn schema(&self) -> &'static str {
        schema_name(self.mode)
    }
}

/// Chooses a convention per function from a frozen configuration
#[derive(Debug, Clone, Copy)]
pub struct DialectSelector<'a> {
    config: &'a DialectConfig,
}

impl<'a> DialectSelector<'a> {
    /// Create a selector over a configuration snapshot
    pub fn new(config: &'a DialectConfig) -> Self {
        Self { config }
    }

    /// Preferred convention for a function name, ignoring availability
    pub fn mode_for(&self, function: &str) -> DialectMode {
        if self.config.force_legacy || self.config.legacy_functions.contains(function) {
            DialectMode::Legacy
        } else {
            self.config.default_mode
        }
    }

    /// Select the convention for a function
    ///
    /// `force_legacy` is the per-expression override. When the preferred
    /// convention lacks the function the other one is used, unless legacy
    /// was forced, which makes a v2-only function an error.
    pub fn select(&self, spec: &FunctionSpec, force_legacy: bool) -> Result<Selection> {
        let forced = force_legacy || self.config.force_legacy;
        let preferred = if forced {
            DialectMode::Legacy
        } else {
            self.mode_for(spec.name)
        };

        if let Some(slot) = spec.slot(preferred) {
            return Ok(Selection {
                mode: preferred,
                slot,
            });
        }

        let fallback = match preferred {
            DialectMode::Legacy if forced => None,
            DialectMode::Legacy => Some(DialectMode::V2),
            DialectMode::V2 => Some(DialectMode::Legacy),
        };

        fallback
            .and_then(|mode| spec.slot(mode).map(|slot| Selection { mode, slot }))
            .ok_or_else(|| Error::UnsupportedDialect {
                function: spec.name.to_string(),
                mode: preferred.to_string(),
            })
    }

    /// Select for a sub-expression of a compound query
    ///
    /// Compound queries only exist in the legacy family and the engine cannot
    /// mix families inside one call, so every child takes its legacy
    /// signature. A child without one is unsupported there, and a child whose
    /// legacy form still needs its field as an operand cannot be nested.
    pub fn select_nested(&self, spec: &FunctionSpec) -> Result<Selection> {
        match spec.legacy {
            Some(FieldSlot::Operand) => Err(Error::NotNestable {
                function: spec.name.to_string(),
            }),
            Some(slot) => Ok(Selection {
                mode: DialectMode::Legacy,
                slot,
            }),
            None => Err(Error::UnsupportedDialect {
                function: spec.name.to_string(),
                mode: DialectMode::Legacy.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchql_core::CompilerConfig;

    fn selector_for(config: &CompilerConfig) -> DialectSelector<'_> {
        DialectSelector::new(&config.dialect)
    }

    #[test]
    fn test_table_names_are_unique() {
        for (i, spec) in FUNCTIONS.iter().enumerate() {
            assert!(
                FUNCTIONS[i + 1..].iter().all(|other| other.name != spec.name),
                "duplicate entry for {}",
                spec.name
            );
            assert!(spec.legacy.is_some() || spec.v2.is_some());
        }
        assert_eq!(function("term"), Some(&TERM));
        assert!(function("nope").is_none());
    }

    #[test]
    fn test_mode_for_defaults() {
        let config = CompilerConfig::default();
        let selector = selector_for(&config);
        assert_eq!(selector.mode_for("term"), DialectMode::Legacy);
        assert_eq!(selector.mode_for("regex"), DialectMode::Legacy);

        let config = CompilerConfig::v2();
        let selector = selector_for(&config);
        assert_eq!(selector.mode_for("term"), DialectMode::Legacy);
        assert_eq!(selector.mode_for("match"), DialectMode::Legacy);
        assert_eq!(selector.mode_for("regex"), DialectMode::V2);
    }

    #[test]
    fn test_force_flag_overrides_everything() {
        let config = CompilerConfig::v2().force_legacy(true);
        let selector = selector_for(&config);
        assert_eq!(selector.mode_for("regex"), DialectMode::Legacy);

        let selection = selector.select(&REGEX, false).unwrap();
        assert_eq!(selection.mode, DialectMode::Legacy);
        assert_eq!(selection.slot, FieldSlot::Argument);
    }

    #[test]
    fn test_select_dual_function() {
        let config = CompilerConfig::v2();
        let selector = selector_for(&config);

        let selection = selector.select(&REGEX, false).unwrap();
        assert_eq!(selection.mode, DialectMode::V2);
        assert_eq!(selection.schema(), "pdb");
        assert_eq!(selection.slot, FieldSlot::Operand);

        let selection = selector.select(&REGEX, true).unwrap();
        assert_eq!(selection.schema(), "paradedb");
        assert_eq!(selection.slot, FieldSlot::Argument);
    }

    #[test]
    fn test_single_dialect_functions_fall_back() {
        let legacy = CompilerConfig::default();
        let selection = selector_for(&legacy).select(&MORE_LIKE_THIS, false).unwrap();
        assert_eq!(selection.mode, DialectMode::V2);

        let v2 = CompilerConfig::v2();
        let selection = selector_for(&v2).select(&BOOLEAN, false).unwrap();
        assert_eq!(selection.mode, DialectMode::Legacy);
    }

    #[test]
    fn test_forced_legacy_rejects_v2_only() {
        let config = CompilerConfig::v2();
        let err = selector_for(&config).select(&EMPTY, true).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedDialect {
                function: "empty".into(),
                mode: "legacy".into()
            }
        );

        let config = CompilerConfig::default().force_legacy(true);
        assert!(selector_for(&config).select(&SCORE, false).unwrap_err().is_dialect());
    }

    #[test]
    fn test_nested_selection() {
        let config = CompilerConfig::v2();
        let selector = selector_for(&config);

        // Operand form swaps to the legacy argument form
        let selection = selector.select_nested(&REGEX).unwrap();
        assert_eq!(selection.mode, DialectMode::Legacy);
        assert_eq!(selection.slot, FieldSlot::Argument);

        // Field-less functions follow their compound parent too
        for spec in [&ALL, &PARSE, &EXISTS] {
            let selection = selector.select_nested(spec).unwrap();
            assert_eq!(selection.mode, DialectMode::Legacy, "{}", spec.name);
        }

        assert!(matches!(
            selector.select_nested(&SEARCH),
            Err(Error::NotNestable { .. })
        ));
        assert!(selector.select_nested(&JSON_OP).is_err());
        assert_eq!(
            selector.select_nested(&EMPTY).unwrap_err(),
            Error::UnsupportedDialect {
                function: "empty".into(),
                mode: "legacy".into()
            }
        );
        assert!(selector.select_nested(&MORE_LIKE_THIS).unwrap_err().is_dialect());
    }

    #[test]
    fn test_dual_functions_keep_arity_shape() {
        // A dual function either carries its field in both conventions or in neither
        for spec in FUNCTIONS.iter().filter(|spec| spec.is_dual()) {
            let legacy = spec.legacy.map(|slot| slot != FieldSlot::None);
            let v2 = spec.v2.map(|slot| slot != FieldSlot::None);
            assert_eq!(legacy, v2, "{} changes field presence across dialects", spec.name);
        }
    }
}
