//! In-memory identity library.
//!
//! An ordered list of `(name, embedding)` entries whose dimensionality is fixed
//! by the first entry. Duplicate names are allowed and keep their insertion
//! order, so the matcher's first-wins tie-break is deterministic.

use std::fmt;

use crate::error::LibraryError;
use crate::types::{Embedding, IdentityEntry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityLibrary {
    entries: Vec<IdentityEntry>,
    dimension: Option<usize>,
}

impl IdentityLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// The entry is validated in full before the library is touched: a
    /// rejected insert leaves the library exactly as it was.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        embedding: Embedding,
    ) -> Result<(), LibraryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LibraryError::InvalidEntry("identity name is empty".into()));
        }
        if embedding.dim() == 0 {
            return Err(LibraryError::InvalidEntry(format!(
                "embedding for {name:?} has no components"
            )));
        }
        if let Some(i) = embedding.values.iter().position(|v| !v.is_finite()) {
            return Err(LibraryError::InvalidEntry(format!(
                "embedding for {name:?} has a non-finite component at index {i}"
            )));
        }
        self.check_dimension(embedding.dim())?;

        self.dimension.get_or_insert(embedding.dim());
        self.entries.push(IdentityEntry { name, embedding });
        Ok(())
    }

    /// Fails if `dim` disagrees with the established dimensionality.
    /// Any dimension is accepted while the library is empty.
    pub fn check_dimension(&self, dim: usize) -> Result<(), LibraryError> {
        match self.dimension {
            Some(expected) if expected != dim => Err(LibraryError::DimensionMismatch {
                expected,
                actual: dim,
            }),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality shared by every entry; `None` until the first insert.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IdentityEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IdentityEntry> {
        self.entries.iter()
    }

    /// Entry names in insertion order, duplicates included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// All entries stored under `name`, in insertion order.
    pub fn get<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a IdentityEntry> + 'a {
        self.entries.iter().filter(move |e| e.name == name)
    }

    pub fn summary(&self, threshold: f32) -> LibrarySummary<'_> {
        LibrarySummary {
            library: self,
            threshold,
        }
    }
}

impl<'a> IntoIterator for &'a IdentityLibrary {
    type Item = &'a IdentityEntry;
    type IntoIter = std::slice::Iter<'a, IdentityEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Human-readable overview of a library for operators.
///
/// The layout is not a stable machine-readable format.
pub struct LibrarySummary<'a> {
    library: &'a IdentityLibrary,
    threshold: f32,
}

impl fmt::Display for LibrarySummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------------------------------")?;
        writeln!(f, "Face library")?;
        writeln!(f, "  entries:   {}", self.library.len())?;
        match self.library.dimension() {
            Some(dim) => writeln!(f, "  dimension: {dim}")?,
            None => writeln!(f, "  dimension: -")?,
        }
        writeln!(f, "  threshold: {}", self.threshold)?;
        for entry in self.library {
            writeln!(f, "  - {} (dim {})", entry.name, entry.embedding.dim())?;
        }
        write!(f, "----------------------------------")
    }
}
