#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for dephunt
//!
//! This library consolidates all functionality for the dephunt tool, which
//! bulk-downloads package metadata from npm, `PyPI`, Maven Central, and crates.io.
//!
//! # Module Organization
//!
//! - [`harvest`]: Discovery, resilient fetching, bounded dispatch, and persistence
//! - [`commands`]: Command-line interface, configuration, and reporting

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod harvest;

pub use crate::commands::{Host, run};
