//! Matching strategies and the candidate refinement primitives.
//!
//! This crate provides the pluggable [`MatcherStrategy`] trait with its
//! built-in implementations (fuzzy name, n-gram embedding, value
//! overlap), the [`QuadrantClassifier`] that partitions column pairs by
//! name and value similarity, the feedback-driven [`WeightUpdater`], and
//! the precompiled [`PluginCatalog`] for runtime matcher registration.

#![deny(unsafe_code)]

mod embedding;
mod fuzzy;
mod plugin;
mod quadrants;
mod strategy;
mod text;
mod value_overlap;
mod weights;

pub use embedding::{ColumnEncoder, EmbeddingMatcher, NgramEncoder, cluster_columns, cosine};
pub use fuzzy::{FuzzyNameMatcher, FuzzyValueMatcher, name_similarity};
pub use plugin::PluginCatalog;
pub use quadrants::{Quadrant, QuadrantClassifier, QuadrantThresholds};
pub use strategy::{MatchError, MatcherStrategy};
pub use text::normalize_text;
pub use value_overlap::{ValueOverlapMatcher, value_set_similarity};
pub use weights::WeightUpdater;
