//! Cached package indexes.

use super::{Ecosystem, PackageId, Store};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ordered list of package identifiers discovered for one ecosystem.
///
/// A snapshot is checkpointed after every discovery page with `complete` set
/// to `false`, and marked complete once the registry has nothing more to list.
/// `cursor` is an opaque, strategy-specific resume token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub ecosystem: Ecosystem,
    pub created_at: DateTime<Utc>,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub packages: Vec<PackageId>,
}

impl IndexSnapshot {
    /// Start an empty, incomplete snapshot.
    #[must_use]
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem,
            created_at: Utc::now(),
            complete: false,
            cursor: None,
            packages: Vec::new(),
        }
    }

    /// Store key under which the snapshot for `ecosystem` lives.
    #[must_use]
    pub fn storage_key(ecosystem: Ecosystem) -> String {
        format!("indexes/{ecosystem}_packages_index.json")
    }

    pub fn load(store: &Store, ecosystem: Ecosystem) -> Result<Option<Self>> {
        store.get(&Self::storage_key(ecosystem))
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.put(&Self::storage_key(self.ecosystem), self)
    }

    /// Whether this snapshot can answer a request for `limit` packages without further crawling.
    #[must_use]
    pub const fn satisfies(&self, limit: usize) -> bool {
        self.complete || self.packages.len() >= limit
    }

    /// The first `limit` identifiers.
    #[must_use]
    pub fn head(&self, limit: usize) -> Vec<PackageId> {
        self.packages.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ids: &[&str], complete: bool) -> IndexSnapshot {
        IndexSnapshot {
            complete,
            packages: ids.iter().copied().map(PackageId::new).collect(),
            ..IndexSnapshot::new(Ecosystem::Npm)
        }
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(IndexSnapshot::storage_key(Ecosystem::Npm), "indexes/npm_packages_index.json");
        assert_eq!(IndexSnapshot::storage_key(Ecosystem::Cargo), "indexes/cargo_packages_index.json");
    }

    #[test]
    fn test_satisfies() {
        assert!(snapshot(&["a"], true).satisfies(100));
        assert!(snapshot(&["a", "b"], false).satisfies(2));
        assert!(!snapshot(&["a", "b"], false).satisfies(3));
    }

    #[test]
    fn test_head() {
        let snap = snapshot(&["a", "b", "c"], true);
        assert_eq!(snap.head(2), vec![PackageId::new("a"), PackageId::new("b")]);
        assert_eq!(snap.head(10).len(), 3);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system operations")]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());

        let mut snap = snapshot(&["left-pad", "@babel/core"], false);
        snap.cursor = Some("@babel/core".to_string());
        snap.save(&store).unwrap();

        assert!(dir.path().join("indexes").join("npm_packages_index.json").exists());
        assert_eq!(IndexSnapshot::load(&store, Ecosystem::Npm).unwrap(), Some(snap));
        assert_eq!(IndexSnapshot::load(&store, Ecosystem::Pypi).unwrap(), None);
    }
}
