//! The matcher strategy contract.

use thiserror::Error;

use harmon_model::{Candidate, Table, ValueMatchEntry};

/// Errors from matcher execution.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The strategy does not implement column-level matching.
    #[error("Matcher '{0}' does not support top_matches")]
    Unsupported(String),

    /// The strategy failed while scoring.
    #[error("Matcher '{matcher}' failed: {message}")]
    Strategy { matcher: String, message: String },
}

/// A pluggable matching strategy.
///
/// Strategies are stateless across calls; all configuration is supplied
/// at construction. A strategy may implement column-level matching,
/// value-level matching, or both — callers probe the capability before
/// relying on it.
pub trait MatcherStrategy: Send + Sync {
    /// Strategy id, used as candidate provenance.
    fn name(&self) -> &str;

    /// True when [`MatcherStrategy::top_matches`] is implemented.
    fn supports_top_matches(&self) -> bool {
        true
    }

    /// Ranked column-mapping candidates, best first, at most `top_k`
    /// per source column.
    fn top_matches(
        &self,
        source: &Table,
        target: &Table,
        top_k: usize,
    ) -> Result<Vec<Candidate>, MatchError>;

    /// Best-scoring target value per source value, at most `top_k`
    /// entries overall. Strategies without value-level support return
    /// an empty list.
    fn top_value_matches(
        &self,
        _source_values: &[String],
        _target_values: &[String],
        _top_k: usize,
    ) -> Vec<ValueMatchEntry> {
        Vec::new()
    }
}

impl std::fmt::Debug for dyn MatcherStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherStrategy")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
