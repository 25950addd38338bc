use rstest::rstest;

use crate::exotics::{exotic_kind, ExoticKind};

#[rstest]
#[case("^1.0.0", None)]
#[case("latest", None)]
#[case("1.x || 2.x", None)]
#[case("git://github.com/foo/bar.git", Some(ExoticKind::Git))]
#[case("git+ssh://git@github.com:foo/bar.git#v1", Some(ExoticKind::Git))]
#[case("https://github.com/foo/bar.git", Some(ExoticKind::Git))]
#[case("https://github.com/foo/bar", Some(ExoticKind::Git))]
#[case("https://github.com/foo/bar/archive/v1.0.0.tar.gz", Some(ExoticKind::Tarball))]
#[case("https://registry.example.com/foo/-/foo-1.0.0.tgz", Some(ExoticKind::Tarball))]
#[case("vendor/foo-1.0.0.tgz", Some(ExoticKind::Tarball))]
#[case("file:../foo", Some(ExoticKind::File))]
#[case("./packages/foo", Some(ExoticKind::File))]
#[case("/abs/path/foo", Some(ExoticKind::File))]
#[case("link:../foo", Some(ExoticKind::Link))]
#[case("npm:lodash@^4.0.0", Some(ExoticKind::Alias))]
#[case("github:foo/bar", Some(ExoticKind::Hosted))]
#[case("foo/bar#semver:^1.0.0", Some(ExoticKind::Hosted))]
fn test_exotic_kind(#[case] range: &str, #[case] expected: Option<ExoticKind>) {
    assert_eq!(exotic_kind(range), expected);
}
