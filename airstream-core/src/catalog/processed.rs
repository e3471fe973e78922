use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Paths admitted to the catalog during this process lifetime.
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the path was not present before.
    pub fn insert(&self, path: impl Into<PathBuf>) -> bool {
        self.guard().insert(path.into())
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.guard().remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.guard().contains(path)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
