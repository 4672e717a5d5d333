//! Shared, atomically replaceable library reference.
//!
//! Readers take an `Arc` snapshot and match against it for as long as they
//! like. A reload builds a complete new library elsewhere and swaps it in with
//! [`LibraryHandle::replace`]; nobody ever sees a half-built library.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::library::IdentityLibrary;

#[derive(Clone)]
pub struct LibraryHandle {
    current: Arc<RwLock<Arc<IdentityLibrary>>>,
    generation: Arc<AtomicU64>,
}

impl LibraryHandle {
    pub fn new(library: IdentityLibrary) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(library))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The library as of now. Later replacements do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<IdentityLibrary> {
        self.current.read().clone()
    }

    /// Swap in a fully built library and return the previous one.
    pub fn replace(&self, library: IdentityLibrary) -> Arc<IdentityLibrary> {
        let entries = library.len();
        let next = Arc::new(library);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(generation, entries, "face library replaced");
        previous
    }

    /// Number of replacements since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for LibraryHandle {
    fn default() -> Self {
        Self::new(IdentityLibrary::new())
    }
}
