#![deny(unused_crate_dependencies)]

pub mod compatibility;
pub mod config;
pub mod error;
pub mod exotics;
pub mod fetcher;
pub mod hoist;
pub mod hooks;
pub mod install;
pub mod integrity;
pub mod lockfile;
pub mod manifest;
pub mod package_reference;
pub mod pattern;
pub mod report;
pub mod resolution_map;
pub mod resolver;
pub mod sri;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use install::{Install, InstallOutcome};
