//! Resolved-document cache with a per-entry staleness flag.
//!
//! The cache is created once by the owning command and passed explicitly to
//! every resolver and to the watch loop. It holds no locks: the owner is the
//! only mutator, and invalidation is an idempotent flag flip.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::types::FileHash;

/// One successfully resolved document.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Hashes of the external files this document referenced.
    pub dependencies: Vec<FileHash>,
    /// Set when the source (or a dependency) changed since resolution.
    pub must_revalidate: bool,
    /// Fully resolved document.
    pub schema: Value,
    /// Absolute path the document was read from.
    pub source_path: PathBuf,
}

/// Keyed store of resolved documents.
#[derive(Debug, Default)]
pub struct SchemaCache {
    /// Entries keyed by the hash of their source path.
    entries: HashMap<FileHash, CacheEntry>,
}

impl SchemaCache {
    /// Remove an entry outright, returning it.
    pub fn delete(&mut self, hash: &FileHash) -> Option<CacheEntry> {
        return self.entries.remove(hash);
    }

    /// Look up an entry, fresh or stale.
    pub fn get(&self, hash: &FileHash) -> Option<&CacheEntry> {
        return self.entries.get(hash);
    }

    /// Whether any entry, fresh or stale, exists for `hash`.
    pub fn has(&self, hash: &FileHash) -> bool {
        return self.entries.contains_key(hash);
    }

    /// Flag `hash` stale along with every entry that transitively depends on it.
    /// Returns the cached hashes that were flagged, `hash` first when cached.
    /// An uncached `hash` (a file that failed to resolve) still reaches its
    /// cached dependents.
    pub fn invalidate(&mut self, hash: &FileHash) -> Vec<FileHash> {
        let mut flagged: Vec<FileHash> = Vec::new();
        let mut visited: HashSet<FileHash> = HashSet::new();
        let mut pending = vec![hash.clone()];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for (dependent, entry) in &self.entries {
                if entry.dependencies.contains(&current) {
                    pending.push(dependent.clone());
                }
            }
            if self.has(&current) {
                self.set_validation_state(&current, true);
                flagged.push(current);
            }
        }

        return flagged;
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Number of entries, fresh or stale.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// True if no entry exists or the entry is flagged stale.
    pub fn must_revalidate(&self, hash: &FileHash) -> bool {
        return self.entries.get(hash).is_none_or(|entry| return entry.must_revalidate);
    }

    /// Create an empty cache.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Store a freshly resolved entry, replacing any previous one.
    pub fn set(&mut self, hash: FileHash, entry: CacheEntry) {
        self.entries.insert(hash, entry);
        return;
    }

    /// Flip the staleness flag without removing the entry, so readers keep
    /// serving the last good document until re-resolution finishes.
    pub fn set_validation_state(&mut self, hash: &FileHash, stale: bool) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.must_revalidate = stale;
        }
        return;
    }

    /// Source paths of all entries.
    pub fn source_paths(&self) -> impl Iterator<Item = &Path> {
        return self.entries.values().map(|entry| return entry.source_path.as_path());
    }
}
