#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid semver range: {0}")]
    InvalidRange(String),

    #[error("Invalid semver version: {0}")]
    InvalidVersion(String),
}
