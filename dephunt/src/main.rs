//! Bulk-download package metadata from public software registries.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use dephunt_lib::{Host, run};
use std::io::{IsTerminal, Write, stderr, stdout};

/// Default host that writes to the real terminal.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn error_is_terminal(&self) -> bool {
        stderr().is_terminal()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() -> Result<(), ohno::AppError> {
    run(&mut RealHost, std::env::args()).await
}
