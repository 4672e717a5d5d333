//! Nearest-neighbor matching against an identity library.

use crate::error::LibraryError;
use crate::library::IdentityLibrary;
use crate::types::{Embedding, Identity, MatchResult};

/// Default acceptance threshold, in embedding-space distance units.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Strategy for deciding which library identity, if any, a query belongs to.
pub trait Matcher {
    fn find(
        &self,
        query: &Embedding,
        library: &IdentityLibrary,
        threshold: f32,
    ) -> Result<MatchResult, LibraryError>;
}

/// Flat linear scan under Euclidean distance.
///
/// Visits every entry in insertion order. On an exact distance tie the entry
/// seen first is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn find(
        &self,
        query: &Embedding,
        library: &IdentityLibrary,
        threshold: f32,
    ) -> Result<MatchResult, LibraryError> {
        if library.is_empty() {
            return Ok(MatchResult::unknown());
        }
        library.check_dimension(query.dim())?;

        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in library.iter().enumerate() {
            let dist = query.distance_unchecked(&entry.embedding);
            if best_idx.is_none() || dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        let Some(idx) = best_idx else {
            return Ok(MatchResult::unknown());
        };
        let nearest = library.entries()[idx].name.clone();

        let identity = if best_dist <= threshold {
            Identity::Known(nearest.clone())
        } else {
            Identity::Unknown
        };

        Ok(MatchResult {
            identity,
            distance: Some(best_dist),
            nearest: Some(nearest),
        })
    }
}

/// Match `query` against `library` with the [`EuclideanMatcher`].
pub fn identify(
    query: &Embedding,
    library: &IdentityLibrary,
    threshold: f32,
) -> Result<MatchResult, LibraryError> {
    EuclideanMatcher.find(query, library, threshold)
}
