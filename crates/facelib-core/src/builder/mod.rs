//! Library construction strategies.
//!
//! Both strategies return a fully built [`IdentityLibrary`] together with a
//! [`BuildReport`]. Per-record problems are tallied in the report; only
//! structural failures (missing source, I/O, dimension integrity) abort.

pub mod csv;
pub mod directory;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, SkipReason};
use crate::library::IdentityLibrary;
use crate::pipeline::FacePipeline;

pub use self::csv::{build_from_csv, parse_embedding, read_csv, save_csv, write_csv};
pub use self::directory::{build_from_directory, scan_directory, IdentityImages};

/// A record left out of the library, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// `line N` for CSV sources, the image path for directory sources.
    pub location: String,
    pub reason: SkipReason,
}

/// Tally of one build call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub source: PathBuf,
    /// Records examined: non-blank CSV lines or candidate image files.
    pub records_seen: usize,
    pub entries_added: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Directory identities that produced no entry.
    pub skipped_identities: Vec<String>,
}

impl BuildReport {
    pub(crate) fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            ..Self::default()
        }
    }

    pub(crate) fn skip(&mut self, location: impl Into<String>, reason: SkipReason) {
        let location = location.into();
        tracing::warn!(%location, %reason, "skipping record");
        self.skipped.push(SkippedRecord { location, reason });
    }

    /// Skipped records whose content was unusable (parse, decode, ambiguous detection).
    pub fn malformed_count(&self) -> usize {
        self.skipped.iter().filter(|s| s.reason.is_malformed()).count()
    }

    pub(crate) fn log(&self) {
        tracing::info!(
            source = %self.source.display(),
            records = self.records_seen,
            entries = self.entries_added,
            skipped = self.skipped.len(),
            malformed = self.malformed_count(),
            skipped_identities = self.skipped_identities.len(),
            "face library built"
        );
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records, {} entries, {} skipped records, {} identities without entry",
            self.source.display(),
            self.records_seen,
            self.entries_added,
            self.skipped.len(),
            self.skipped_identities.len()
        )
    }
}

/// Where a library comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LibrarySource {
    /// One subdirectory of face images per identity.
    Directory { path: PathBuf },
    /// Precomputed embeddings, one `name,v0,...` line per identity.
    Csv { path: PathBuf },
}

impl LibrarySource {
    pub fn path(&self) -> &Path {
        match self {
            LibrarySource::Directory { path } | LibrarySource::Csv { path } => path,
        }
    }

    /// Build a fresh library from this source.
    ///
    /// Directory sources need a pipeline and fail with
    /// [`LibraryError::PipelineUnavailable`] without one.
    pub fn build(
        &self,
        pipeline: Option<&mut dyn FacePipeline>,
    ) -> Result<(IdentityLibrary, BuildReport), LibraryError> {
        match self {
            LibrarySource::Csv { path } => build_from_csv(path),
            LibrarySource::Directory { path } => {
                let pipeline = pipeline.ok_or(LibraryError::PipelineUnavailable)?;
                build_from_directory(path, pipeline)
            }
        }
    }
}

impl fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibrarySource::Directory { path } => write!(f, "directory {}", path.display()),
            LibrarySource::Csv { path } => write!(f, "csv {}", path.display()),
        }
    }
}
