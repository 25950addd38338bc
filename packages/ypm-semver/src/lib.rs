mod error;
mod extract;
mod range;
mod version;

pub use error::Error;
pub use range::Range;
pub use range::RangeKind;
pub use version::Version;
pub use version::VersionRc;

/// JS-compatible semver limits:
/// https://github.com/npm/node-semver/blob/120968b76760cb0db85a72bde2adedd0e9628793/internal/constants.js
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;
/// Maximum length of a semver string.
pub const MAX_LENGTH: usize = 256;
/// Maximum digits allowed for a numeric component (major/minor/patch).
pub const MAX_SAFE_COMPONENT_LENGTH: usize = 16;

/// Returns true if `version` is a complete, valid semver version.
pub fn is_valid_version(version: &str) -> bool {
    <Version as ypm_utils::FromFileString>::from_file_string(version).is_ok()
}

/// Returns true if `range` parses as a semver range.
pub fn is_valid_range(range: &str) -> bool {
    <Range as ypm_utils::FromFileString>::from_file_string(range).is_ok()
}

/// Same semantics as node-semver's `satisfies`: invalid inputs never
/// satisfy anything.
pub fn satisfies(version: &str, range: &str) -> bool {
    use ypm_utils::FromFileString;

    let Ok(version) = Version::from_file_string(version) else {
        return false;
    };

    let Ok(range) = Range::from_file_string(range) else {
        return false;
    };

    range.check(&version)
}
