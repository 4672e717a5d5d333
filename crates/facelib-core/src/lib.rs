//! facelib-core — Identity library and nearest-neighbor face matching.
//!
//! Builds a library of known-identity embeddings from a directory of face
//! images or a precomputed CSV, then identifies query embeddings by flat
//! Euclidean nearest-neighbor search with a fixed acceptance threshold.
//! Detection and embedding models are supplied by the caller through
//! [`FacePipeline`].

pub mod builder;
pub mod error;
pub mod library;
pub mod matcher;
pub mod monitor;
pub mod pipeline;
pub mod recognize;
pub mod shared;
pub mod types;

pub use builder::{
    build_from_csv, build_from_directory, save_csv, BuildReport, LibrarySource, SkippedRecord,
};
pub use error::{LibraryError, SkipReason};
pub use library::{IdentityLibrary, LibrarySummary};
pub use matcher::{identify, EuclideanMatcher, Matcher, DEFAULT_THRESHOLD};
pub use monitor::{PerfMonitor, PerfReport};
pub use pipeline::{FaceChip, FacePipeline, FaceRegion, PipelineError};
pub use recognize::{FaceMatch, Recognizer};
pub use shared::LibraryHandle;
pub use types::{Embedding, Identity, IdentityEntry, MatchResult};
