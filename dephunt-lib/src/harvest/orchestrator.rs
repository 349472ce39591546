//! Drives one harvest per ecosystem: build the work list, drop what is already
//! stored, fetch the rest in parallel, and record what failed.

use super::{
    Ecosystem, FailureManifest, FetchOutcome, IndexSnapshot, PackageId, Progress, RegistryClient, Store, dedup_in_order, dispatch,
};
use crate::Result;
use ohno::{EnrichableExt, app_err};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use strum::Display;

const LOG_TARGET: &str = "   harvest";

/// Which packages a run should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageRequest {
    /// Exactly these identifiers.
    Explicit(Vec<PackageId>),

    /// The identifiers recorded in the previous run's failure manifest.
    RetryFailed,

    /// The first `limit` identifiers from the ecosystem's index.
    Discover { limit: usize },
}

/// Knobs that apply to every ecosystem in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip identifiers whose metadata is already stored.
    pub resume: bool,

    /// Ignore a cached index snapshot and crawl again.
    pub refresh_index: bool,

    /// Maximum number of fetches in flight.
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            resume: false,
            refresh_index: false,
            concurrency: 10,
        }
    }
}

/// Counts for one ecosystem run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ecosystem: Ecosystem,

    /// Distinct identifiers in the work list.
    pub requested: usize,

    /// Identifiers skipped because their metadata was already stored.
    pub skipped: usize,

    /// Identifiers fetched and stored during this run.
    pub downloaded: usize,

    /// Identifiers that could not be fetched, in work-list order.
    pub failed: Vec<PackageId>,

    /// Total size of the stored metadata records for the work list.
    pub stored_bytes: u64,
}

/// Stages of a single ecosystem run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum Phase {
    ListBuilt,
    Filtered,
    Dispatched,
    Reported,
}

/// Store key of the metadata record for `id`.
#[must_use]
pub fn metadata_key(id: &PackageId) -> String {
    format!("metadata/{}.json", id.storage_name())
}

/// Runs harvests rooted at an output directory, one subdirectory per ecosystem.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: Arc<RegistryClient>,
    output_dir: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(client: RegistryClient, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Arc::new(client),
            output_dir: output_dir.into(),
        }
    }

    /// The store holding everything for `ecosystem`.
    #[must_use]
    pub fn store_for(&self, ecosystem: Ecosystem) -> Store {
        Store::new(self.output_dir.join(ecosystem.to_string()))
    }

    /// Run every ecosystem in turn. A failing ecosystem does not stop the others.
    pub async fn run_all(
        &self,
        ecosystems: &[Ecosystem],
        request: &PackageRequest,
        options: RunOptions,
        progress: &dyn Progress,
    ) -> Vec<(Ecosystem, Result<RunSummary>)> {
        let mut results = Vec::with_capacity(ecosystems.len());

        for &ecosystem in ecosystems {
            let result = self.run(ecosystem, request, options, progress).await;
            if let Err(e) = &result {
                log::error!(target: LOG_TARGET, "{ecosystem}: run failed: {e:#}");
            }
            results.push((ecosystem, result));
        }

        results
    }

    /// Harvest one ecosystem.
    pub async fn run(
        &self,
        ecosystem: Ecosystem,
        request: &PackageRequest,
        options: RunOptions,
        progress: &dyn Progress,
    ) -> Result<RunSummary> {
        let store = self.store_for(ecosystem);

        let work = match request {
            PackageRequest::Explicit(ids) => ids.clone(),
            PackageRequest::RetryFailed => FailureManifest::load(&store)
                .map_err(|e| e.enrich_with(|| format!("reading the {ecosystem} failure manifest")))?
                .map(|manifest| manifest.failed_packages)
                .unwrap_or_default(),
            PackageRequest::Discover { limit } => self.build_index(ecosystem, &store, *limit, options, progress).await,
        };
        let work = dedup_in_order(work);
        let requested = work.len();
        enter(ecosystem, Phase::ListBuilt, requested);

        let pending: Vec<PackageId> = if options.resume {
            work.iter().filter(|id| !store.exists(&metadata_key(id))).cloned().collect()
        } else {
            work.clone()
        };
        let skipped = requested - pending.len();
        enter(ecosystem, Phase::Filtered, pending.len());

        progress.set_phase(&format!("Fetching {ecosystem}"));
        let report = {
            let client = Arc::clone(&self.client);
            let store = store.clone();
            dispatch(pending, options.concurrency, progress, move |id: PackageId| {
                let client = Arc::clone(&client);
                let store = store.clone();
                async move { fetch_and_store(ecosystem, &client, &store, &id).await }
            })
            .await
        };
        enter(ecosystem, Phase::Dispatched, report.total());

        let downloaded = report.succeeded.len();
        let failed_set: HashSet<PackageId> = report.failures.into_iter().map(|f| f.item).collect();
        let failed: Vec<PackageId> = work.iter().filter(|id| failed_set.contains(id)).cloned().collect();
        let stored_bytes = work.iter().filter_map(|id| store.size(&metadata_key(id))).sum();

        if failed.is_empty() {
            if FailureManifest::clear(&store)? {
                log::debug!(target: LOG_TARGET, "{ecosystem}: removed the previous failure manifest");
            }
        } else {
            FailureManifest {
                failed_packages: failed.clone(),
            }
            .save(&store)?;
        }
        enter(ecosystem, Phase::Reported, failed.len());

        Ok(RunSummary {
            ecosystem,
            requested,
            skipped,
            downloaded,
            failed,
            stored_bytes,
        })
    }

    /// Produce up to `limit` identifiers, reusing a cached snapshot when it suffices.
    ///
    /// Discovery errors are logged and whatever had been found up to that point is used.
    async fn build_index(
        &self,
        ecosystem: Ecosystem,
        store: &Store,
        limit: usize,
        options: RunOptions,
        progress: &dyn Progress,
    ) -> Vec<PackageId> {
        let cached = if options.refresh_index {
            None
        } else {
            IndexSnapshot::load(store, ecosystem).unwrap_or_else(|e| {
                log::warn!(target: LOG_TARGET, "{ecosystem}: ignoring unreadable cached index: {e:#}");
                None
            })
        };

        let mut snapshot = match cached {
            Some(snapshot) if snapshot.satisfies(limit) => {
                log::info!(
                    target: LOG_TARGET,
                    "{ecosystem}: using cached index of {} package(s)",
                    snapshot.packages.len()
                );
                return snapshot.head(limit);
            }
            Some(snapshot) => {
                log::info!(
                    target: LOG_TARGET,
                    "{ecosystem}: continuing interrupted discovery after {} package(s)",
                    snapshot.packages.len()
                );
                snapshot
            }
            None => ecosystem.initial_snapshot(store, options.resume).unwrap_or_else(|e| {
                log::warn!(target: LOG_TARGET, "{ecosystem}: ignoring unreadable discovery progress: {e:#}");
                IndexSnapshot::new(ecosystem)
            }),
        };

        progress.set_phase(&format!("Discovering {ecosystem}"));
        if let Err(e) = ecosystem.discover(&self.client, store, progress, &mut snapshot, limit).await {
            log::error!(
                target: LOG_TARGET,
                "{ecosystem}: discovery stopped early, continuing with {} package(s) found so far: {e:#}",
                snapshot.packages.len()
            );
        }

        snapshot.head(limit)
    }
}

fn enter(ecosystem: Ecosystem, phase: Phase, count: usize) {
    log::debug!(target: LOG_TARGET, "{ecosystem}: {phase} ({count})");
}

/// Fetch one record and persist it. Anything short of a stored record is an error.
async fn fetch_and_store(ecosystem: Ecosystem, client: &RegistryClient, store: &Store, id: &PackageId) -> Result<()> {
    let result = match ecosystem.fetch_metadata(client, id).await {
        FetchOutcome::Success(record) => store
            .put(&metadata_key(id), &record)
            .map_err(|e| e.enrich_with(|| format!("storing metadata for {id}"))),
        FetchOutcome::NotFound => Err(app_err!("{id} does not exist in the {ecosystem} registry")),
        FetchOutcome::TransientError(e) | FetchOutcome::PermanentError(e) => Err(e),
    };

    if let Err(e) = &result {
        log::warn!(target: LOG_TARGET, "{ecosystem}: unable to fetch {id}: {e:#}");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_key() {
        assert_eq!(metadata_key(&PackageId::new("serde")), "metadata/serde.json");
        assert_eq!(metadata_key(&PackageId::new("@types/node")), "metadata/@types_node.json");
        assert_eq!(metadata_key(&PackageId::new("org.slf4j:slf4j-api")), "metadata/org.slf4j_slf4j-api.json");
    }

    #[test]
    fn test_default_options() {
        let options = RunOptions::default();
        assert_eq!(options.concurrency, 10);
        assert!(!options.resume);
    }
}
