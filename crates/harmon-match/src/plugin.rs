//! Runtime matcher registration from a precompiled plugin catalog.
//!
//! A registration request carries a matcher name, a definition source,
//! and a parameter map. The definition must declare a callable named
//! exactly like the requested matcher and resolve it to one of the
//! catalog's precompiled builders:
//!
//! ```text
//! define my_matcher = fuzzy(threshold=0.3)
//! ```
//!
//! Arbitrary code is never evaluated and no dependencies are installed;
//! hot-loadable strategies are limited to compositions the catalog
//! already ships. Every violation is reported as a descriptive error
//! string — registration never panics and never mutates live state on
//! failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::embedding::{EmbeddingMatcher, NgramEncoder};
use crate::fuzzy::{FuzzyNameMatcher, FuzzyValueMatcher};
use crate::strategy::MatcherStrategy;
use crate::value_overlap::ValueOverlapMatcher;

type Params = BTreeMap<String, String>;
type BuilderFn = fn(&str, &Params) -> Result<Arc<dyn MatcherStrategy>, String>;

/// Catalog of precompiled matcher builders.
pub struct PluginCatalog {
    builders: BTreeMap<&'static str, BuilderFn>,
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PluginCatalog {
    /// The built-in builder set.
    pub fn builtin() -> Self {
        let mut builders: BTreeMap<&'static str, BuilderFn> = BTreeMap::new();
        builders.insert("fuzzy", build_fuzzy);
        builders.insert("ngram_embedding", build_embedding);
        builders.insert("value_overlap", build_value_overlap);
        builders.insert("fuzzy_value", build_fuzzy_value);
        Self { builders }
    }

    /// Builder names, for error messages and listings.
    pub fn builder_names(&self) -> Vec<&'static str> {
        self.builders.keys().copied().collect()
    }

    /// Validates a definition and instantiates the strategy.
    ///
    /// The contract: the code must declare a callable named `name`; the
    /// referenced builder must exist and accept the merged parameters;
    /// the built strategy must expose `top_matches`. Inline arguments in
    /// the definition are overridden by the explicit parameter map.
    pub fn register(
        &self,
        name: &str,
        code: &str,
        params: &Params,
    ) -> Result<Arc<dyn MatcherStrategy>, String> {
        let definition = parse_definition(code)
            .ok_or_else(|| format!("code does not declare a callable (expected 'define {name} = <builder>(...)')"))?;

        if definition.name != name {
            return Err(format!(
                "code declares callable '{}' but matcher '{name}' was requested",
                definition.name
            ));
        }

        let Some(builder) = self.builders.get(definition.builder.as_str()) else {
            return Err(format!(
                "unknown builder '{}'; available: {}",
                definition.builder,
                self.builder_names().join(", ")
            ));
        };

        let mut merged = definition.arguments;
        for (key, value) in params {
            merged.insert(key.clone(), value.clone());
        }

        let strategy = builder(name, &merged)
            .map_err(|e| format!("failed to instantiate matcher '{name}': {e}"))?;

        if !strategy.supports_top_matches() {
            return Err(format!(
                "matcher '{name}' does not expose top_matches and cannot produce column candidates"
            ));
        }

        info!(matcher = name, builder = %definition.builder, "registered plugin matcher");
        Ok(strategy)
    }
}

struct Definition {
    name: String,
    builder: String,
    arguments: Params,
}

/// Parses the first `define <name> = <builder>(k=v, ...)` line.
fn parse_definition(code: &str) -> Option<Definition> {
    for line in code.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("define ") else {
            continue;
        };
        let (name, rhs) = rest.split_once('=')?;
        let rhs = rhs.trim();
        let (builder, args) = match rhs.split_once('(') {
            Some((builder, args)) => (builder.trim(), args.trim_end_matches(')')),
            None => (rhs, ""),
        };
        let mut arguments = Params::new();
        for pair in args.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=')?;
            arguments.insert(key.trim().to_string(), value.trim().to_string());
        }
        return Some(Definition {
            name: name.trim().to_string(),
            builder: builder.to_string(),
            arguments,
        });
    }
    None
}

fn parse_f64(params: &Params, key: &str, default: f64) -> Result<f64, String> {
    match params.get(key) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| format!("parameter '{key}' must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_usize(params: &Params, key: &str, default: usize) -> Result<usize, String> {
    match params.get(key) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("parameter '{key}' must be an integer, got '{raw}'")),
        None => Ok(default),
    }
}

fn build_fuzzy(name: &str, params: &Params) -> Result<Arc<dyn MatcherStrategy>, String> {
    let threshold = parse_f64(params, "threshold", 0.0)?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("threshold must be in [0, 1], got {threshold}"));
    }
    Ok(Arc::new(FuzzyNameMatcher::new(name, threshold)))
}

fn build_embedding(name: &str, params: &Params) -> Result<Arc<dyn MatcherStrategy>, String> {
    let dimension = parse_usize(params, "dimension", 256)?;
    Ok(Arc::new(EmbeddingMatcher::new(
        name,
        NgramEncoder::new(dimension),
    )))
}

fn build_value_overlap(name: &str, _params: &Params) -> Result<Arc<dyn MatcherStrategy>, String> {
    Ok(Arc::new(ValueOverlapMatcher::new(name)))
}

fn build_fuzzy_value(name: &str, _params: &Params) -> Result<Arc<dyn MatcherStrategy>, String> {
    Ok(Arc::new(FuzzyValueMatcher::new(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_a_fuzzy_plugin() {
        let catalog = PluginCatalog::builtin();
        let strategy = catalog
            .register(
                "my_fuzzy",
                "define my_fuzzy = fuzzy(threshold=0.3)",
                &Params::new(),
            )
            .unwrap();
        assert_eq!(strategy.name(), "my_fuzzy");
        assert!(strategy.supports_top_matches());
    }

    #[test]
    fn name_mismatch_is_descriptive() {
        let catalog = PluginCatalog::builtin();
        let err = catalog
            .register("requested", "define other = fuzzy()", &Params::new())
            .unwrap_err();
        assert!(err.contains("declares callable 'other'"));
    }

    #[test]
    fn unknown_builder_lists_available() {
        let catalog = PluginCatalog::builtin();
        let err = catalog
            .register("m", "define m = tensorflow()", &Params::new())
            .unwrap_err();
        assert!(err.contains("unknown builder"));
        assert!(err.contains("fuzzy"));
    }

    #[test]
    fn bad_parameter_fails_instantiation() {
        let catalog = PluginCatalog::builtin();
        let err = catalog
            .register("m", "define m = fuzzy(threshold=high)", &Params::new())
            .unwrap_err();
        assert!(err.contains("must be a number"));
    }

    #[test]
    fn value_only_builder_lacks_column_capability() {
        let catalog = PluginCatalog::builtin();
        let err = catalog
            .register("values_only", "define values_only = fuzzy_value()", &Params::new())
            .unwrap_err();
        assert!(err.contains("does not expose top_matches"));
    }

    #[test]
    fn explicit_params_override_inline_arguments() {
        let catalog = PluginCatalog::builtin();
        let mut params = Params::new();
        params.insert("threshold".to_string(), "2.0".to_string());
        let err = catalog
            .register("m", "define m = fuzzy(threshold=0.2)", &params)
            .unwrap_err();
        assert!(err.contains("must be in [0, 1]"));
    }
}
