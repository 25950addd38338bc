use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    config::Config,
    error::Error,
    fetcher::DependencyRequest,
    lockfile::Lockfile,
    pattern::Pattern,
    report::{Report, Severity},
    resolution_map::ResolutionMap,
    resolver::{PackageResolver, ResolverOptions},
    testing::{package, MemoryRegistry},
};

use super::{is_valid, should_check, test_engine, PackageCompatibility};

fn config() -> Config {
    let mut config = Config::new("/project");
    config.system.platform = "linux".to_string();
    config.system.arch = "x64".to_string();
    config.system.node_version = "5.0.0".to_string();
    config.system.yarn_version = "1.4.1-20180208.2355".to_string();
    config
}

fn items(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[rstest]
#[case(&["linux"], true)]
#[case(&["darwin", "linux"], true)]
#[case(&["darwin"], false)]
#[case(&["!win32"], true)]
#[case(&["!linux"], false)]
#[case(&["!win32", "darwin"], false)]
#[case(&[], false)]
fn it_matches_allow_and_deny_lists(#[case] list: &[&str], #[case] expected: bool) {
    assert_eq!(is_valid(&items(list), "linux"), expected);
}

#[rstest]
#[case("node", "^5.0.0", "5.1.0", true)]
#[case("node", "^0.13.0", "5.0.0", true)]
#[case("node", "^0.12.0", "5.0.0", true)]
#[case("node", "^0.10.0", "5.0.0", true)]
#[case("node", "^0.9.0", "5.0.0", false)]
#[case("node", "^0.12.0", "0.12.0", true)]
#[case("node", "^0.12.0", "0.11.0", false)]
#[case("node", "^1.3.0", "1.4.1-20180208.2355", false)]
#[case("yarn", "^1.3.0", "1.4.1-20180208.2355", true)]
#[case("node", "^5.0.0", "not-a-version", false)]
fn it_tests_engines(#[case] name: &str, #[case] range: &str, #[case] actual: &str, #[case] expected: bool) {
    let versions = IndexMap::from([(name.to_string(), actual.to_string())]);

    assert_eq!(test_engine(name, range, &versions), expected);
}

#[test]
fn it_only_checks_declared_requirements() {
    let mut config = config();
    let mut manifest = package("a", "1.0.0", &[]);

    assert!(!should_check(&manifest, &config));

    manifest.os = items(&["darwin"]);
    assert!(should_check(&manifest, &config));

    config.ignore_platform = true;
    assert!(!should_check(&manifest, &config));

    manifest.engines.insert("node".to_string(), ">=4".to_string());
    assert!(should_check(&manifest, &config));

    config.ignore_engines = true;
    assert!(!should_check(&manifest, &config));
}

#[test]
fn it_explains_incompatibilities() {
    let config = config();
    let report = Report::new();

    let mut manifest = package("fsevents", "1.2.0", &[]);
    manifest.os = items(&["darwin"]);
    manifest.engines.insert("iojs".to_string(), ">=6".to_string());
    manifest.engines.insert("npm".to_string(), ">=3".to_string());
    manifest.engines.insert("atom".to_string(), ">=1".to_string());

    let compatibility = PackageCompatibility::new(&config, &report);

    assert_eq!(compatibility.incompatibilities(&manifest), vec![
        "The platform \"linux\" is incompatible with this module.".to_string(),
        "The engine \"node\" is incompatible with this module. Expected version \">=6\". Got \"5.0.0\"".to_string(),
    ]);

    assert_eq!(report.warnings(), vec![
        "fsevents@1.2.0: The engine \"atom\" appears to be invalid.".to_string(),
    ]);
}

#[test]
fn it_fails_single_manifests() {
    let config = config();
    let report = Report::new();

    let mut manifest = package("project", "1.0.0", &[]);
    manifest.cpu = items(&["arm64"]);

    let result = PackageCompatibility::new(&config, &report).check_one(&manifest);

    assert!(matches!(result, Err(Error::IncompatiblePackages(messages)) if messages == vec![
        "project@1.0.0: The CPU architecture \"x64\" is incompatible with this module.".to_string(),
    ]));

    assert!(report.has_errors());
}

#[tokio::test]
async fn it_excludes_incompatible_optional_packages() {
    let mut fsevents = package("fsevents", "1.2.0", &[]);
    fsevents.os = items(&["darwin"]);

    let registry = MemoryRegistry::new()
        .with(fsevents)
        .with_package("left-pad", "1.3.0", &[]);

    let config = config();
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(vec![
        DependencyRequest::new("fsevents@^1.0.0").set_optional(true),
        DependencyRequest::new("left-pad@^1.0.0"),
    ], ResolverOptions::default()).await.unwrap();

    PackageCompatibility::new(&config, &report).init(&mut resolver).unwrap();

    let fsevents = resolver.reference(&Pattern::new("fsevents@^1.0.0")).unwrap();
    assert!(fsevents.ignore);
    assert!(fsevents.incompatible);

    assert!(!resolver.reference(&Pattern::new("left-pad@^1.0.0")).unwrap().ignore);

    assert_eq!(report.messages_with(Severity::Info), vec![
        "\"fsevents@1.2.0\" is an optional dependency and failed compatibility check. Excluding it from installation.".to_string(),
    ]);
}

#[tokio::test]
async fn it_fails_on_incompatible_required_packages() {
    let mut fsevents = package("fsevents", "1.2.0", &[]);
    fsevents.os = items(&["darwin"]);

    let registry = MemoryRegistry::new()
        .with(fsevents);

    let config = config();
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(vec![DependencyRequest::new("fsevents@^1.0.0")], ResolverOptions::default()).await.unwrap();

    let result = PackageCompatibility::new(&config, &report).init(&mut resolver);

    assert!(matches!(result, Err(Error::IncompatiblePackages(messages)) if messages.len() == 1));
}
