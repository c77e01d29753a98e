use std::path::Path;

use serde::Serialize;

use crate::embedder::ImageEmbedder;
use crate::index::{Decision, ReferenceIndex};
use crate::Embedding;

/// Closest reference for a query image.
///
/// Field names follow the JSON the frontend reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    #[serde(rename = "resnet_match")]
    pub label: String,
    /// Cosine similarity scaled by 100; negative for anti-correlated features
    #[serde(rename = "resnet_confidence")]
    pub confidence: f32,
    #[serde(rename = "resnet_decision")]
    pub decision: Decision,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("feature extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    #[error("reference index is empty")]
    EmptyIndex,

    #[error("query embedding has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Score `query` against every reference and return the best one.
///
/// Ties on the maximum similarity go to the entry that comes first in index
/// order. No threshold is applied: a non-empty index always yields a result.
pub fn match_embedding(
    query: &Embedding,
    index: &ReferenceIndex,
) -> Result<MatchResult, MatchError> {
    if index.is_empty() {
        return Err(MatchError::EmptyIndex);
    }
    if query.dim() != index.dimension() {
        return Err(MatchError::DimensionMismatch {
            expected: index.dimension(),
            actual: query.dim(),
        });
    }

    let (best, score) = index
        .entries()
        .iter()
        .map(|entry| (entry, crate::cosine_similarity(query, &entry.embedding)))
        .fold(None, |acc, (entry, s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((entry, s)),
        })
        .ok_or(MatchError::EmptyIndex)?;

    log::debug!("Best reference {} with similarity {:.4}", best.label, score);

    Ok(MatchResult {
        label: best.label.clone(),
        confidence: score * 100.0,
        decision: best.decision,
    })
}

/// Embed the image at `query_image_path` and match it against `index`.
pub fn find_best_match(
    query_image_path: &Path,
    index: &ReferenceIndex,
    embedder: &dyn ImageEmbedder,
) -> Result<MatchResult, MatchError> {
    let query = embedder
        .embed(query_image_path)
        .map_err(MatchError::Extraction)?;
    match_embedding(&query, index)
}
