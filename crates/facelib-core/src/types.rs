use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Face embedding vector (128-dimensional for the dlib ResNet model, but any
/// fixed dimension works).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean (L2) distance to `other`.
    ///
    /// Embeddings of different length are never compared; the shorter one is
    /// not padded and the longer one is not truncated.
    pub fn distance(&self, other: &Embedding) -> Result<f32, LibraryError> {
        if self.dim() != other.dim() {
            return Err(LibraryError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(self.distance_unchecked(other))
    }

    /// Euclidean distance for callers that have already checked dimensions.
    pub(crate) fn distance_unchecked(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity in [-1, 1]. Diagnostic only; matching uses [`distance`](Self::distance).
    pub fn similarity(&self, other: &Embedding) -> Result<f32, LibraryError> {
        if self.dim() != other.dim() {
            return Err(LibraryError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        Ok(if denom > 0.0 { dot / denom } else { 0.0 })
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// A named reference embedding stored in an [`IdentityLibrary`](crate::IdentityLibrary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// Outcome of a nearest-neighbor decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Known(name) => Some(name),
            Identity::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }
}

/// Result of matching a query embedding against a library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub identity: Identity,
    /// Distance to the nearest entry. `None` only when the library was empty.
    pub distance: Option<f32>,
    /// Nearest entry's name, kept even when the distance was over threshold.
    pub nearest: Option<String>,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            identity: Identity::Unknown,
            distance: None,
            nearest: None,
        }
    }
}
