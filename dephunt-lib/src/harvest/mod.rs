//! Resumable bulk harvesting of package metadata
//!
//! This module downloads per-package metadata documents from the npm, `PyPI`,
//! Maven Central, and crates.io registries and persists them as JSON files.
//!
//! # Implementation Model
//!
//! The [`Orchestrator`] runs one ecosystem at a time through a fixed sequence:
//!
//! 1. Build the work list, either from explicit identifiers, the previous failure
//!    manifest, or an [`IndexSnapshot`] produced by the ecosystem's discovery strategy
//! 2. Drop identifiers whose metadata is already in the [`Store`] when resuming
//! 3. Fetch the remainder with [`dispatch`], which bounds concurrency and isolates
//!    per-item failures
//! 4. Write a [`FailureManifest`] listing what could not be fetched
//!
//! All network access goes through the [`Fetcher`], which classifies every
//! response into a [`FetchOutcome`] and retries only transient failures.
//!
//! Discovery is checkpointed after every page, so an interrupted crawl picks up
//! where it stopped on the next run. Two runs writing to the same output directory
//! at the same time are not coordinated; keeping them apart is up to the caller.

mod dispatcher;
mod ecosystems;
mod fetch_outcome;
mod fetcher;
mod index;
mod manifest;
mod orchestrator;
mod package_id;
mod path_utils;
mod progress;
mod store;

pub use dispatcher::{DispatchReport, Failure, dispatch};
pub use ecosystems::{Ecosystem, Endpoints, RegistryClient};
pub use fetch_outcome::FetchOutcome;
pub use fetcher::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BASE_DELAY, Fetcher, RetryPolicy};
pub use index::IndexSnapshot;
pub use manifest::FailureManifest;
pub use orchestrator::{Orchestrator, PackageRequest, RunOptions, RunSummary, metadata_key};
pub use package_id::{MavenCoordinate, PackageId, dedup_in_order, parse_package_list};
pub use path_utils::sanitize_path_component;
pub use progress::{NoProgress, Progress, StatusFn, Tally, TallyFn};
pub use store::Store;
