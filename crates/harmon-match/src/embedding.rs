//! Embedding-based column matching.
//!
//! The embedding service is an external collaborator consumed through
//! the [`ColumnEncoder`] trait: one vector per column text. The built-in
//! [`NgramEncoder`] hashes character trigrams into a fixed-dimension
//! vector, which is deterministic and dependency-free while exercising
//! the same seam a transformer-backed encoder would plug into.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use harmon_model::{Candidate, Column, Table};

use crate::strategy::{MatchError, MatcherStrategy};
use crate::text::normalize_text;

/// Encodes column texts into fixed-dimension vectors.
pub trait ColumnEncoder: Send + Sync {
    /// One vector per input text; all vectors share a dimension.
    fn encode(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

/// Character-trigram hashing encoder.
#[derive(Debug, Clone)]
pub struct NgramEncoder {
    dimension: usize,
}

impl NgramEncoder {
    /// Creates an encoder with the given vector dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }
}

impl Default for NgramEncoder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ColumnEncoder for NgramEncoder {
    fn encode(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                let padded = format!("  {}  ", normalize_text(text));
                let chars: Vec<char> = padded.chars().collect();
                for window in chars.windows(3) {
                    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
                    for ch in window {
                        hash ^= *ch as u64;
                        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
                    }
                    vector[(hash % self.dimension as u64) as usize] += 1.0;
                }
                let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut vector {
                        *v /= norm;
                    }
                }
                vector
            })
            .collect()
    }
}

/// Cosine similarity of two vectors, 0.0 when either is zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        f64::from(dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

/// Text used to embed a column: its name plus a sample of values.
fn column_text(column: &Column) -> String {
    let mut text = normalize_text(&column.name);
    for value in column.unique_values().iter().take(10) {
        text.push(' ');
        text.push_str(&normalize_text(value));
    }
    text
}

/// Greedy threshold clustering of source columns by embedding.
///
/// Each column joins the first cluster whose representative is within
/// `threshold` cosine similarity, otherwise it founds a new cluster
/// named after itself. Returns column -> cluster-member map keyed by
/// the representative column.
pub fn cluster_columns(
    source: &Table,
    encoder: &dyn ColumnEncoder,
    threshold: f64,
) -> BTreeMap<String, Vec<String>> {
    let texts: Vec<String> = source.columns.iter().map(column_text).collect();
    let vectors = encoder.encode(&texts);

    let mut clusters: Vec<(String, Vec<f32>, Vec<String>)> = Vec::new();
    for (column, vector) in source.columns.iter().zip(vectors) {
        let mut joined = false;
        for (_, representative, members) in &mut clusters {
            if cosine(representative, &vector) >= threshold {
                members.push(column.name.clone());
                joined = true;
                break;
            }
        }
        if !joined {
            clusters.push((column.name.clone(), vector, vec![column.name.clone()]));
        }
    }

    clusters
        .into_iter()
        .map(|(representative, _, members)| (representative, members))
        .collect()
}

/// Column matcher scoring pairs by embedding cosine similarity.
pub struct EmbeddingMatcher<E: ColumnEncoder> {
    name: String,
    encoder: E,
}

impl<E: ColumnEncoder> EmbeddingMatcher<E> {
    /// Creates a matcher over the given encoder.
    pub fn new(name: impl Into<String>, encoder: E) -> Self {
        Self {
            name: name.into(),
            encoder,
        }
    }
}

impl Default for EmbeddingMatcher<NgramEncoder> {
    fn default() -> Self {
        Self::new("ngram_embedding", NgramEncoder::default())
    }
}

impl<E: ColumnEncoder> MatcherStrategy for EmbeddingMatcher<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn top_matches(
        &self,
        source: &Table,
        target: &Table,
        top_k: usize,
    ) -> Result<Vec<Candidate>, MatchError> {
        let source_texts: Vec<String> = source.columns.iter().map(column_text).collect();
        let target_texts: Vec<String> = target.columns.iter().map(column_text).collect();
        let source_vectors = self.encoder.encode(&source_texts);
        let target_vectors = self.encoder.encode(&target_texts);

        let mut candidates = Vec::new();
        for (source_column, source_vector) in source.columns.iter().zip(&source_vectors) {
            let mut scored: Vec<Candidate> = target
                .columns
                .iter()
                .zip(&target_vectors)
                .map(|(target_column, target_vector)| {
                    Candidate::new(
                        source_column.name.clone(),
                        target_column.name.clone(),
                        cosine(source_vector, target_vector),
                        self.name.clone(),
                    )
                })
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.target_column.cmp(&b.target_column))
            });
            scored.truncate(top_k);
            candidates.extend(scored);
        }
        Ok(candidates)
    }
}
