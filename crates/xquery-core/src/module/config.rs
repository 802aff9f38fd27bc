use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to do when a module imports, directly or transitively, a module that
/// is still being loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fail with `XQST0093`.
    #[default]
    Reject,
    /// Bind the namespace to the module under construction.
    Allow,
}

pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 32;
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Resolver settings. Deserializable so front ends can read them from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    pub cycle_policy: CyclePolicy,
    pub max_import_depth: usize,
    /// Parsed prologs kept in the module cache; 0 disables caching.
    pub cache_capacity: usize,
    /// Statically known namespaces added to every module.
    pub namespaces: BTreeMap<String, String>,
    /// Locations for target namespaces imported without `at` hints.
    pub known_modules: BTreeMap<String, Vec<String>>,
    /// Reject a prefix declared twice even when bound to the same URI.
    pub strict_prefix_bindings: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cycle_policy: CyclePolicy::Reject,
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            namespaces: BTreeMap::new(),
            known_modules: BTreeMap::new(),
            strict_prefix_bindings: false,
        }
    }
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.config.cycle_policy = policy;
        self
    }

    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.config.max_import_depth = depth;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.config.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_known_module(mut self, namespace: impl Into<String>, location: impl Into<String>) -> Self {
        self.config
            .known_modules
            .entry(namespace.into())
            .or_default()
            .push(location.into());
        self
    }

    pub fn with_strict_prefix_bindings(mut self, strict: bool) -> Self {
        self.config.strict_prefix_bindings = strict;
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}
