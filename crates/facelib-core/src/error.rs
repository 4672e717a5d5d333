//! Error types for library construction and matching.
//!
//! [`LibraryError`] is fatal to the call that returns it. Per-record problems
//! met while building a library are not errors: they are recorded as
//! [`SkipReason`] values in the build report and the build carries on.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("library source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
    #[error("directory source requires a face pipeline, none was supplied")]
    PipelineUnavailable,
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single record (CSV line or image file) was left out of a library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("no face detected")]
    NoFace,
    #[error("ambiguous detection: {faces} faces, expected 1")]
    AmbiguousDetection { faces: usize },
    #[error("pipeline failed: {0}")]
    Pipeline(String),
}

impl SkipReason {
    /// Ambiguous detections count as malformed records; this groups the
    /// reasons that mean "the record itself was unusable".
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            SkipReason::Malformed(_) | SkipReason::Decode(_) | SkipReason::AmbiguousDetection { .. }
        )
    }
}
