use super::{PackageId, Store};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MANIFEST_KEY: &str = "indexes/failed_downloads.json";

/// Identifiers that could not be fetched in the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureManifest {
    pub failed_packages: Vec<PackageId>,
}

impl FailureManifest {
    /// Where the manifest lives within an ecosystem's store.
    #[must_use]
    pub fn path(store: &Store) -> PathBuf {
        store.path_of(MANIFEST_KEY)
    }

    pub fn load(store: &Store) -> Result<Option<Self>> {
        store.get(MANIFEST_KEY)
    }

    /// Replace any previous manifest with this one.
    pub fn save(&self, store: &Store) -> Result<()> {
        store.put(MANIFEST_KEY, self)
    }

    /// Remove a previous manifest. Returns whether one existed.
    pub fn clear(store: &Store) -> Result<bool> {
        store.remove(MANIFEST_KEY)
    }
}
