use super::ProgressReporter;
use super::common::{LogLevel, format_size, init_logging};
use super::config::Config;
use crate::harvest::{Ecosystem, FailureManifest, Orchestrator, PackageId, PackageRequest, Progress, RunOptions, RunSummary, parse_package_list};
use crate::{Host, Result};
use camino::Utf8PathBuf;
use clap::Args;
use core::num::NonZeroUsize;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use std::fs;
use std::io::Write;

const LOG_TARGET: &str = "   command";

/// Number of packages discovered per ecosystem when neither a package list nor `--bulk` is given.
const DEFAULT_DISCOVERY_LIMIT: usize = 100;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Ecosystems to download metadata from
    #[arg(
        long,
        value_name = "ECOSYSTEM",
        num_args = 1..,
        default_values_t = [Ecosystem::Npm, Ecosystem::Pypi, Ecosystem::Maven, Ecosystem::Cargo]
    )]
    pub ecosystems: Vec<Ecosystem>,

    /// Discover packages from each registry's index, up to --limit per ecosystem
    #[arg(long)]
    pub bulk: bool,

    /// Specific packages to download (use group:artifact for Maven)
    #[arg(long, value_name = "NAME", num_args = 1..)]
    pub packages: Vec<String>,

    /// File listing packages to download, one per line
    #[arg(long, value_name = "PATH")]
    pub package_file: Option<Utf8PathBuf>,

    /// Maximum number of packages to discover per ecosystem with --bulk
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub limit: usize,

    /// Directory where metadata is written, one subdirectory per ecosystem
    #[arg(long, value_name = "PATH", default_value = "data")]
    pub output_dir: Utf8PathBuf,

    /// Number of concurrent downloads
    #[arg(long, value_name = "N", default_value = "10")]
    pub concurrency: NonZeroUsize,

    /// Skip packages whose metadata has already been downloaded
    #[arg(long)]
    pub resume: bool,

    /// Crawl registry indexes again instead of using cached ones
    #[arg(long)]
    pub refresh_index: bool,

    /// Download only the packages that failed in the previous run
    #[arg(long)]
    pub retry_failed: bool,

    /// Path to configuration file (default is `dephunt.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

impl DownloadArgs {
    /// Decide which packages to fetch: an explicit list wins, then a retry of past
    /// failures, then index discovery.
    fn package_request(&self) -> Result<PackageRequest> {
        let mut ids = Vec::new();

        if let Some(path) = &self.package_file {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading package file '{path}'"))?;
            ids = parse_package_list(&text);
            log::info!(target: LOG_TARGET, "Loaded {} package(s) from {path}", ids.len());
        }

        ids.extend(self.packages.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).map(PackageId::new));

        if !ids.is_empty() {
            return Ok(PackageRequest::Explicit(ids));
        }

        if self.package_file.is_some() || !self.packages.is_empty() {
            return Err(app_err!("no package names were given"));
        }

        if self.retry_failed {
            return Ok(PackageRequest::RetryFailed);
        }

        let limit = if self.bulk { self.limit } else { DEFAULT_DISCOVERY_LIMIT };
        Ok(PackageRequest::Discover { limit })
    }

    const fn run_options(&self) -> RunOptions {
        RunOptions {
            resume: self.resume,
            refresh_index: self.refresh_index,
            concurrency: self.concurrency.get(),
        }
    }
}

/// Download metadata for every requested ecosystem and report the outcome of each.
pub async fn process_download<H: Host>(host: &mut H, args: &DownloadArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::load(args.config.as_deref())?;
    let request = args.package_request()?;
    let orchestrator = Orchestrator::new(config.registry_client()?, args.output_dir.as_std_path());

    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_hours(365 * 24)
    };
    let progress = ProgressReporter::new(delay, host.error_is_terminal());

    let mut ecosystems = Vec::with_capacity(args.ecosystems.len());
    for ecosystem in &args.ecosystems {
        if !ecosystems.contains(ecosystem) {
            ecosystems.push(*ecosystem);
        }
    }

    let results = orchestrator.run_all(&ecosystems, &request, args.run_options(), &progress).await;
    progress.done();

    let mut failed_runs = 0;
    for (ecosystem, result) in results {
        match result {
            Ok(summary) => {
                _ = writeln!(host.output(), "{}", summary_line(&summary));
                if !summary.failed.is_empty() {
                    let manifest = FailureManifest::path(&orchestrator.store_for(ecosystem));
                    _ = writeln!(host.output(), "  failed packages recorded in {}", manifest.display());
                }
            }
            Err(e) => {
                failed_runs += 1;
                _ = writeln!(host.error(), "{ecosystem}: {e:#}");
            }
        }
    }

    if failed_runs > 0 {
        _ = writeln!(host.error(), "{failed_runs} ecosystem run(s) did not complete");
        host.exit(1);
    }

    Ok(())
}

fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{}: {} requested, {} skipped, {} downloaded, {} failed ({} stored)",
        summary.ecosystem,
        summary.requested,
        summary.skipped,
        summary.downloaded,
        summary.failed.len(),
        format_size(summary.stored_bytes),
    )
}
