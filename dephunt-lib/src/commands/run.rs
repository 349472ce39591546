//! Command dispatch logic for dephunt

use super::{DownloadArgs, process_download};
use crate::{Host, Result};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "dephunt", version, author, long_about = None)]
#[command(about = "Bulk-download package metadata from npm, PyPI, Maven Central, and crates.io")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    args: DownloadArgs,
}

/// Parse command-line arguments and run the harvest
///
/// Designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if the configuration or the package selection is invalid
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);
    process_download(host, &cli.args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_mentions_flags() {
        let help = Cli::command().render_long_help().to_string();
        for flag in ["--ecosystems", "--bulk", "--package-file", "--resume", "--retry-failed", "--refresh-index"] {
            assert!(help.contains(flag), "help is missing {flag}");
        }
    }
}
