use rstest::rstest;
use ypm_utils::{FromFileString, ToFileString};

use crate::{Version, VersionRc};

#[rstest]
#[case("1.2.3", Version { major: 1, minor: 2, patch: 3, rc: None })]
#[case("v1.2.3", Version { major: 1, minor: 2, patch: 3, rc: None })]
#[case("=1.2.3", Version { major: 1, minor: 2, patch: 3, rc: None })]
#[case("1.2.3-rc", Version { major: 1, minor: 2, patch: 3, rc: Some(vec![VersionRc::String("rc".to_string())]) })]
#[case("1.2.3-rc.1", Version { major: 1, minor: 2, patch: 3, rc: Some(vec![VersionRc::String("rc".to_string()), VersionRc::Number(1)]) })]
#[case("1.2.3-rc.1.32a", Version { major: 1, minor: 2, patch: 3, rc: Some(vec![VersionRc::String("rc".to_string()), VersionRc::Number(1), VersionRc::String("32a".to_string())]) })]
#[case("1.2.3+build.5", Version { major: 1, minor: 2, patch: 3, rc: None })]
fn test_version_parse(#[case] version: Version, #[case] expected: Version) {
    assert_eq!(version, expected);
}

#[rstest]
#[case("1.2")]
#[case("1")]
#[case("*")]
#[case("1.2.x")]
#[case("latest")]
#[case("")]
fn test_version_rejects_partial(#[case] input: &str) {
    assert!(Version::from_file_string(input).is_err());
}

#[rstest]
#[case("1.2.3", "1.2.4")]
#[case("1.2.3", "1.3.0")]
#[case("1.2.3", "2.0.0")]
#[case("1.2.3-rc.1", "1.2.3")]
#[case("1.2.3-1", "1.2.3-alpha")]
#[case("1.2.3-alpha", "1.2.3-alpha.1")]
#[case("1.2.9", "1.2.10")]
fn test_version_lt(#[case] left: Version, #[case] right: Version) {
    assert!(left < right);
}

#[rstest]
#[case("1.2.3")]
#[case("1.2.3-rc.1")]
#[case("0.0.0-next.20")]
fn test_version_to_file_string(#[case] input: &str) {
    assert_eq!(Version::from_file_string(input).unwrap().to_file_string(), input);
}

#[test]
fn test_version_max_length() {
    let long_prerelease = "a".repeat(257);
    let version = format!("1.2.3-{}", long_prerelease);
    assert!(Version::from_file_string(&version).is_err());
}

#[test]
fn test_version_max_safe_integer() {
    assert!(Version::from_file_string("1.2.9007199254740992").is_err());
}

#[test]
fn test_version_max_safe_component_length() {
    let version = "1".repeat(17);
    assert!(Version::from_file_string(&version).is_err());
}
