use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    fetcher::DependencyRequest,
    lockfile::LockedPackage,
    manifest::PackageRemote,
    pattern::Pattern,
    report::Report,
};

use super::{is_valid_package_path, parse_package_path, should_update_lockfile, ResolutionMap};

fn resolution_map(resolutions: &[(&str, &str)], report: &Report) -> ResolutionMap {
    let resolutions = resolutions.iter()
        .map(|(path, range)| (path.to_string(), range.to_string()))
        .collect::<IndexMap<_, _>>();

    let mut map = ResolutionMap::new();
    map.init(&resolutions, report).unwrap();
    map
}

fn parents(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[rstest]
#[case("left-pad", true)]
#[case("a/b", true)]
#[case("**/b", true)]
#[case("a/@scope/b", true)]
#[case("a/", false)]
#[case("a//b", false)]
#[case("a/*", false)]
#[case("a/**", false)]
fn it_validates_package_paths(#[case] path: &str, #[case] expected: bool) {
    assert_eq!(is_valid_package_path(path), expected);
}

#[rstest]
#[case("left-pad", &["left-pad"])]
#[case("a/@scope/b/c", &["a", "@scope/b", "c"])]
#[case("**/left-pad", &["**", "left-pad"])]
fn it_splits_package_paths(#[case] path: &str, #[case] expected: &[&str]) {
    assert_eq!(parse_package_path(path), parents(expected));
}

#[test]
fn it_applies_bare_names_at_every_depth() {
    let report = Report::new();
    let map = resolution_map(&[("left-pad", "1.3.0")], &report);

    let entry
        = &map.resolutions_by_package["left-pad"][0];

    assert_eq!(entry.glob_pattern, "**/left-pad");
    assert_eq!(entry.pattern, Pattern::new("left-pad@1.3.0"));

    assert_eq!(map.find(&Pattern::new("left-pad@^1.0.0"), &parents(&["a", "b"]), &report), Some(Pattern::new("left-pad@1.3.0")));
    assert_eq!(map.find(&Pattern::new("left-pad@^1.0.0"), &parents(&["a"]), &report), Some(Pattern::new("left-pad@1.3.0")));
}

#[test]
fn it_scopes_resolutions_to_their_ancestry() {
    let report = Report::new();
    let map = resolution_map(&[("a/b", "1.1.0"), ("c/*/d", "2.0.0")], &report);

    assert_eq!(map.find(&Pattern::new("b@^1.0.0"), &parents(&["a"]), &report), Some(Pattern::new("b@1.1.0")));
    assert_eq!(map.find(&Pattern::new("b@^1.0.0"), &parents(&["x"]), &report), None);
    assert_eq!(map.find(&Pattern::new("b@^1.0.0"), &parents(&["x", "a"]), &report), None);

    assert_eq!(map.find(&Pattern::new("d@^2.0.0"), &parents(&["c", "e"]), &report), Some(Pattern::new("d@2.0.0")));
    assert_eq!(map.find(&Pattern::new("d@^2.0.0"), &parents(&["c", "e", "f"]), &report), None);
}

#[test]
fn it_warns_about_incompatible_resolutions() {
    let report = Report::new();
    let map = resolution_map(&[("**/b", "2.0.0")], &report);

    let resolved
        = map.find(&Pattern::new("b@^1.0.0"), &parents(&["a"]), &report);

    assert_eq!(resolved, Some(Pattern::new("b@2.0.0")));
    assert_eq!(report.warnings(), vec![
        "Resolution field \"b@2.0.0\" is incompatible with requested version \"b@^1.0.0\"".to_string(),
    ]);
}

#[test]
fn it_skips_invalid_paths() {
    let report = Report::new();
    let map = resolution_map(&[("a/", "1.0.0"), ("b", "1.0.0")], &report);

    assert_eq!(map.patterns().map(|(name, pattern)| (name.clone(), pattern.clone())).collect::<Vec<_>>(), vec![
        ("b".to_string(), Pattern::new("b@1.0.0")),
    ]);

    assert_eq!(report.warnings(), vec![
        "Resolution field \"a/\" does not end with a valid package name and will be ignored".to_string(),
    ]);
}

#[test]
fn it_dedupes_the_delay_queue() {
    let mut map = ResolutionMap::new();

    let request = DependencyRequest::new("b@^1.0.0")
        .with_parent_names(parents(&["a"]));

    map.add_to_delay_queue(request.clone());
    map.add_to_delay_queue(request.clone());

    assert_eq!(map.take_delay_queue(), vec![request]);
    assert!(map.take_delay_queue().is_empty());
}

#[rstest]
#[case(Some("https://registry.example/b/-/b-1.0.0.tgz"), Some("https://registry.example/b/-/b-1.1.0.tgz"), true)]
#[case(Some("https://registry.example/b/-/b-1.1.0.tgz"), Some("https://registry.example/b/-/b-1.1.0.tgz"), false)]
#[case(None, Some("https://registry.example/b/-/b-1.1.0.tgz"), false)]
#[case(Some("https://registry.example/b/-/b-1.1.0.tgz"), None, false)]
fn it_detects_stale_locked_entries(#[case] locked: Option<&str>, #[case] resolution: Option<&str>, #[case] expected: bool) {
    let locked = locked.map(|resolved| LockedPackage {
        name: "b".to_string(),
        version: "1.0.0".to_string(),
        resolved: Some(resolved.to_string()),
        ..Default::default()
    });

    let remote = resolution
        .map(PackageRemote::tarball);

    assert_eq!(should_update_lockfile(locked.as_ref(), remote.as_ref()), expected);
}
