//! Reference index: the fixed set of labelled chart embeddings that queries
//! are matched against. Built once at startup, read-only afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ReferenceSpec;
use crate::embedder::ImageEmbedder;
use crate::Embedding;

/// Business outcome attached to a reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Buy,
    Sell,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => f.write_str("buy"),
            Decision::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub label: String,
    pub decision: Decision,
    pub embedding: Embedding,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("reference mapping is empty")]
    EmptyMapping,

    #[error("duplicate reference label {0:?}")]
    DuplicateLabel(String),

    #[error("reference image for {label:?} not found at {}", .path.display())]
    MissingImage { label: String, path: PathBuf },

    #[error("feature extraction failed for reference {label:?}: {reason:#}")]
    Extraction { label: String, reason: anyhow::Error },

    #[error("reference {label:?} produced an empty embedding")]
    EmptyEmbedding { label: String },

    #[error("reference {label:?} has dimension {actual}, expected {expected}")]
    InconsistentDimension {
        label: String,
        expected: usize,
        actual: usize,
    },
}

/// Ordered, immutable collection of reference embeddings.
///
/// Every entry shares the same dimensionality and labels are unique. The
/// default value is an empty index, which the match engine refuses to use.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
    dimension: usize,
}

impl ReferenceIndex {
    /// Assemble an index from already computed entries, keeping their order.
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Result<Self, IndexError> {
        let Some(first) = entries.first() else {
            return Err(IndexError::EmptyMapping);
        };
        let dimension = first.embedding.dim();

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.label.as_str()) {
                return Err(IndexError::DuplicateLabel(entry.label.clone()));
            }
            if entry.embedding.dim() == 0 {
                return Err(IndexError::EmptyEmbedding {
                    label: entry.label.clone(),
                });
            }
            if entry.embedding.dim() != dimension {
                return Err(IndexError::InconsistentDimension {
                    label: entry.label.clone(),
                    expected: dimension,
                    actual: entry.embedding.dim(),
                });
            }
        }

        Ok(Self { entries, dimension })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn decision_for(&self, label: &str) -> Option<Decision> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.decision)
    }
}

/// Embed every reference image, in mapping order.
///
/// Labels are resolved relative to `image_root`. Any failure aborts the whole
/// build; a partially built index is never returned.
pub fn build_index(
    mapping: &[ReferenceSpec],
    image_root: &Path,
    embedder: &dyn ImageEmbedder,
) -> Result<ReferenceIndex, IndexError> {
    if mapping.is_empty() {
        return Err(IndexError::EmptyMapping);
    }

    let mut seen = HashSet::with_capacity(mapping.len());
    if let Some(dup) = mapping.iter().find(|r| !seen.insert(r.label.as_str())) {
        return Err(IndexError::DuplicateLabel(dup.label.clone()));
    }

    let mut entries = Vec::with_capacity(mapping.len());
    for reference in mapping {
        let path = image_root.join(&reference.label);
        if !path.is_file() {
            return Err(IndexError::MissingImage {
                label: reference.label.clone(),
                path,
            });
        }

        let embedding = embedder
            .embed(&path)
            .map_err(|reason| IndexError::Extraction {
                label: reference.label.clone(),
                reason,
            })?;

        log::info!(
            "Indexed {} ({}, {} dims)",
            reference.label,
            reference.decision,
            embedding.dim()
        );

        entries.push(ReferenceEntry {
            label: reference.label.clone(),
            decision: reference.decision,
            embedding,
        });
    }

    let index = ReferenceIndex::from_entries(entries)?;
    log::info!(
        "Reference index ready: {} entries, dimension {}",
        index.len(),
        index.dimension()
    );
    Ok(index)
}
