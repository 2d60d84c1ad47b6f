//! Compiler configuration
//!
//! One `CompilerConfig` is built at startup and then treated as frozen.
//! `SharedConfig` hands out `Arc` snapshots; reconfiguring swaps the whole
//! snapshot rather than editing fields in place.

use crate::error::{Error, Result};
use crate::field::ResolutionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Function naming convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectMode {
    /// `paradedb.*` functions, field passed as the first argument
    #[default]
    Legacy,
    /// `pdb.*` functions, field used as the left operand
    V2,
}

impl fmt::Display for DialectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectMode::Legacy => write!(f, "legacy"),
            DialectMode::V2 => write!(f, "v2"),
        }
    }
}

/// Dialect selection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectConfig {
    /// Mode used when nothing else applies
    #[serde(default)]
    pub default_mode: DialectMode,

    /// Functions that always use the legacy convention
    #[serde(default = "default_legacy_functions")]
    pub legacy_functions: BTreeSet<String>,

    /// Require the legacy convention for everything
    #[serde(default)]
    pub force_legacy: bool,
}

fn default_legacy_functions() -> BTreeSet<String> {
    ["term", "match"].into_iter().map(String::from).collect()
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            default_mode: DialectMode::Legacy,
            legacy_functions: default_legacy_functions(),
            force_legacy: false,
        }
    }
}

/// Compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Dialect selection
    #[serde(default)]
    pub dialect: DialectConfig,

    /// Raise when a field cannot be resolved instead of reporting it as unresolved
    #[serde(default)]
    pub raise_on_unresolved: bool,

    /// Lookups whose right-hand side is passed through without preparation
    #[serde(default)]
    pub skip_rhs_prep: BTreeSet<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: DialectConfig::default(),
            raise_on_unresolved: false,
            skip_rhs_prep: BTreeSet::new(),
        }
    }
}

impl CompilerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration defaulting to the v2 convention
    pub fn v2() -> Self {
        Self::default().default_mode(DialectMode::V2)
    }

    /// Configuration that raises on every resolution failure
    pub fn strict() -> Self {
        Self::default().raise_on_unresolved(true)
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder: set the default dialect
    pub fn default_mode(mut self, mode: DialectMode) -> Self {
        self.dialect.default_mode = mode;
        self
    }

    /// Builder: replace the legacy function list
    pub fn legacy_functions<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dialect.legacy_functions = functions.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: force the legacy convention everywhere
    pub fn force_legacy(mut self, force: bool) -> Self {
        self.dialect.force_legacy = force;
        self
    }

    /// Builder: raise on resolution failures
    pub fn raise_on_unresolved(mut self, raise: bool) -> Self {
        self.raise_on_unresolved = raise;
        self
    }

    /// Builder: skip right-hand side preparation for a lookup
    pub fn skip_rhs_prep(mut self, lookup: &str) -> Self {
        self.skip_rhs_prep.insert(lookup.to_string());
        self
    }

    /// Policy handed to field resolvers
    pub fn resolution_policy(&self) -> ResolutionPolicy {
        if self.raise_on_unresolved {
            ResolutionPolicy::Raise
        } else {
            ResolutionPolicy::SoftFail
        }
    }

    /// Whether a lookup's right-hand side should be prepared
    pub fn prepares_rhs(&self, lookup: &str) -> bool {
        !self.skip_rhs_prep.contains(lookup)
    }
}

/// Process-wide holder for the current configuration snapshot
#[derive(Debug, Default)]
pub struct SharedConfig {
    current: RwLock<Arc<CompilerConfig>>,
}

impl SharedConfig {
    /// Create a holder with an initial snapshot
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Result<Arc<CompilerConfig>> {
        let guard = self
            .current
            .read()
            .map_err(|_| Error::Internal("Failed to acquire config lock".to_string()))?;
        Ok(Arc::clone(&guard))
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn replace(&self, config: CompilerConfig) -> Result<Arc<CompilerConfig>> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| Error::Internal("Failed to acquire config lock".to_string()))?;
        Ok(std::mem::replace(&mut *guard, Arc::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.dialect.default_mode, DialectMode::Legacy);
        assert!(config.dialect.legacy_functions.contains("term"));
        assert!(config.dialect.legacy_functions.contains("match"));
        assert!(!config.dialect.force_legacy);
        assert_eq!(config.resolution_policy(), ResolutionPolicy::SoftFail);
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::v2()
            .legacy_functions(["range"])
            .raise_on_unresolved(true)
            .skip_rhs_prep("term");

        assert_eq!(config.dialect.default_mode, DialectMode::V2);
        assert_eq!(config.dialect.legacy_functions.len(), 1);
        assert_eq!(config.resolution_policy(), ResolutionPolicy::Raise);
        assert!(!config.prepares_rhs("term"));
        assert!(config.prepares_rhs("match"));
    }

    #[test]
    fn test_from_json_defaults() {
        let config = CompilerConfig::from_json(r#"{"dialect": {"default_mode": "v2"}}"#).unwrap();
        assert_eq!(config.dialect.default_mode, DialectMode::V2);
        assert!(config.dialect.legacy_functions.contains("term"));
        assert!(!config.raise_on_unresolved);

        assert!(CompilerConfig::from_json("[]").is_err());
    }

    #[test]
    fn test_shared_snapshot_swap() {
        let shared = SharedConfig::new(CompilerConfig::default());
        let before = shared.snapshot().unwrap();

        let previous = shared.replace(CompilerConfig::strict()).unwrap();
        assert_eq!(previous, before);

        // Old snapshots stay frozen after a swap
        assert!(!before.raise_on_unresolved);
        assert!(shared.snapshot().unwrap().raise_on_unresolved);
    }
}
