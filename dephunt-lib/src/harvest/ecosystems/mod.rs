//! Per-registry discovery and metadata fetch strategies.
//!
//! The set of registries is closed: [`Ecosystem`] selects the strategy pair
//! with a plain `match`, so adding a registry means adding a variant and a
//! module here.

mod cargo;
mod maven;
mod npm;
mod pypi;

use super::{FetchOutcome, Fetcher, IndexSnapshot, PackageId, Progress, Store};
use crate::Result;
use clap::ValueEnum;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use ohno::app_err;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use url::Url;

const LOG_TARGET: &str = " discovery";

/// A package registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Deserialize, Serialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
    Maven,
    Cargo,
}

/// Base URLs of the registry services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Endpoints {
    /// npm package documents (`<base>/<name>`).
    pub npm_registry: Url,

    /// npm bulk listing (`<base>/_all_docs`).
    pub npm_replicate: Url,

    /// `PyPI` simple index (`<base>/simple/`) and JSON API (`<base>/pypi/<name>/json`).
    pub pypi: Url,

    /// Maven repository layout root.
    pub maven_repository: Url,

    /// Maven Central Solr search endpoint.
    pub maven_search: Url,

    /// crates.io API root (`<base>/crates`).
    pub crates_io: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        let parse = |s: &str| Url::parse(s).expect("built-in endpoint URLs are valid");

        Self {
            npm_registry: parse("https://registry.npmjs.org/"),
            npm_replicate: parse("https://replicate.npmjs.com/"),
            pypi: parse("https://pypi.org/"),
            maven_repository: parse("https://repo1.maven.org/maven2/"),
            maven_search: parse("https://search.maven.org/solrsearch/select"),
            crates_io: parse("https://crates.io/api/v1/"),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at a single server, using the default path layout.
    ///
    /// Used to direct all traffic at a mirror or a local test server.
    pub fn rooted_at(base: &Url) -> Result<Self> {
        Ok(Self {
            npm_registry: endpoint_url(base, &[])?,
            npm_replicate: endpoint_url(base, &[])?,
            pypi: endpoint_url(base, &[])?,
            maven_repository: endpoint_url(base, &["maven2"])?,
            maven_search: endpoint_url(base, &["solrsearch", "select"])?,
            crates_io: endpoint_url(base, &["api", "v1"])?,
        })
    }
}

/// Everything a strategy needs to talk to the registries.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    pub fetcher: Fetcher,
    pub endpoints: Endpoints,

    /// Pause between consecutive discovery page requests.
    pub page_delay: Duration,
}

/// Shared state for one discovery run.
pub(crate) struct Discovery<'a> {
    pub client: &'a RegistryClient,
    pub store: &'a Store,
    pub limit: usize,
    pages: u64,
    discovered: Arc<AtomicUsize>,
}

impl<'a> Discovery<'a> {
    pub(crate) fn new(client: &'a RegistryClient, store: &'a Store, progress: &dyn Progress, limit: usize) -> Self {
        let discovered = Arc::new(AtomicUsize::new(0));
        {
            let discovered = Arc::clone(&discovered);
            progress.set_indeterminate(Box::new(move || format!("{} packages listed", discovered.load(Ordering::Relaxed))));
        }

        Self {
            client,
            store,
            limit,
            pages: 0,
            discovered,
        }
    }

    /// Wait out the page delay before every page request except the first.
    async fn next_page(&mut self) {
        if self.pages > 0 {
            tokio::time::sleep(self.client.page_delay).await;
        }
        self.pages += 1;
    }

    /// Record a discovered page in the snapshot and checkpoint it.
    fn checkpoint(&self, snapshot: &IndexSnapshot) -> Result<()> {
        self.discovered.store(snapshot.packages.len(), Ordering::Relaxed);
        log::info!(
            target: LOG_TARGET,
            "{}: discovered {} package(s) after {} page(s)",
            snapshot.ecosystem,
            snapshot.packages.len(),
            self.pages
        );
        snapshot.save(self.store)
    }
}

impl Ecosystem {
    /// Extend `snapshot` until it holds at least `limit` identifiers or the registry is exhausted.
    ///
    /// The snapshot is checkpointed to the store after every page. On error it
    /// keeps everything discovered so far.
    pub async fn discover(
        self,
        client: &RegistryClient,
        store: &Store,
        progress: &dyn Progress,
        snapshot: &mut IndexSnapshot,
        limit: usize,
    ) -> Result<()> {
        let mut discovery = Discovery::new(client, store, progress, limit);

        match self {
            Self::Npm => npm::discover(&mut discovery, snapshot).await,
            Self::Pypi => pypi::discover(&mut discovery, snapshot).await,
            Self::Maven => maven::discover(&mut discovery, snapshot).await,
            Self::Cargo => cargo::discover(&mut discovery, snapshot).await,
        }
    }

    /// The snapshot a fresh crawl starts from.
    ///
    /// For npm with `resume` set, the last recorded bulk-listing key seeds the cursor.
    pub fn initial_snapshot(self, store: &Store, resume: bool) -> Result<IndexSnapshot> {
        let mut snapshot = IndexSnapshot::new(self);
        if resume && self == Self::Npm {
            snapshot.cursor = npm::last_key(store)?;
        }
        Ok(snapshot)
    }

    /// Retrieve the metadata record for one package.
    pub async fn fetch_metadata(self, client: &RegistryClient, id: &PackageId) -> FetchOutcome<Value> {
        match self {
            Self::Npm => npm::fetch_metadata(client, id).await,
            Self::Pypi => pypi::fetch_metadata(client, id).await,
            Self::Maven => maven::fetch_metadata(client, id).await,
            Self::Cargo => cargo::fetch_metadata(client, id).await,
        }
    }
}

/// Append path segments to `base`, percent-encoding each one.
///
/// A segment containing `/` (such as a scoped npm name) stays a single segment.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    _ = url
        .path_segments_mut()
        .map_err(|()| app_err!("'{base}' cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Fetch the JSON document at `base` + `segments`.
async fn fetch_json_at(client: &RegistryClient, base: &Url, segments: &[&str]) -> FetchOutcome<Value> {
    match endpoint_url(base, segments) {
        Ok(url) => client.fetcher.fetch_json(&url).await,
        Err(e) => FetchOutcome::PermanentError(e),
    }
}
