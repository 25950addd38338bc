use std::sync::Arc;

use ypm_utils::{DataType, ToHumanString};

#[cfg(test)]
#[path = "./error.test.rs"]
mod error_tests;

fn render_backtrace(backtrace: &std::backtrace::Backtrace) -> String {
    if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
        backtrace.to_string().trim_end().to_string()
    } else {
        "Run with RUST_BACKTRACE=1 to get a backtrace".to_string()
    }
}

#[derive(thiserror::Error, Clone, Debug)]
pub enum Error {
    #[error("I/O error: {inner}\n\n{}", render_backtrace(backtrace))]
    IoError {
        inner: Arc<std::io::Error>,
        backtrace: Arc<std::backtrace::Backtrace>,
    },

    #[error("Invalid JSON data: {0}")]
    InvalidJson(Arc<serde_json::Error>),

    #[error("Invalid YAML data: {0}")]
    InvalidYaml(Arc<serde_yaml::Error>),

    #[error(transparent)]
    SemverError(#[from] ypm_semver::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobError(#[from] globset::Error),

    #[error("Invalid configuration value for {0}: {1}")]
    InvalidConfigValue(String, String),

    #[error("Lockfile parse error at line {line}, column {column}: {message}")]
    LockfileParseError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("The lockfile uses format version {0}, which isn't supported")]
    UnsupportedLockfileVersion(u32),

    #[error("Your lockfile needs to be updated, but the install was run with a frozen lockfile")]
    FrozenLockfileOutdated,

    #[error("Couldn't find any package matching {}", .0.to_print_string())]
    PackageNotFound(String),

    #[error("Failed to fetch {}: {}", .0.to_print_string(), .1)]
    FetchError(String, String),

    #[error("Invalid version {} for package {}", .1.to_print_string(), .0.to_print_string())]
    InvalidPackageVersion(String, String),

    #[error("Couldn't find a package manifest for {} to collapse to", DataType::Pattern.colorize(.0))]
    CollapseTargetMissing(String),

    #[error("The package {} requires a flat dependency graph; add `flat: true` to your configuration", .0.to_print_string())]
    FlatGlobal(String),

    #[error("Found incompatible module(s):\n{}", .0.join("\n"))]
    IncompatiblePackages(Vec<String>),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IoError {
            inner: Arc::new(error),
            backtrace: Arc::new(std::backtrace::Backtrace::capture()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::InvalidJson(Arc::new(error))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::InvalidYaml(Arc::new(error))
    }
}
