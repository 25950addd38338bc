use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    config::Config,
    error::Error,
    fetcher::{DependencyHint, DependencyRequest},
    lockfile::Lockfile,
    manifest::RemoteType,
    pattern::Pattern,
    report::Report,
    resolution_map::ResolutionMap,
    testing::{package, tarball_url, MemoryRegistry},
};

use super::{PackageResolver, ResolverOptions};

fn requests(patterns: &[&str]) -> Vec<DependencyRequest> {
    patterns.iter()
        .map(|pattern| DependencyRequest::new(*pattern))
        .collect()
}

fn resolution_map(resolutions: &[(&str, &str)], report: &Report) -> ResolutionMap {
    let resolutions = resolutions.iter()
        .map(|(path, range)| (path.to_string(), range.to_string()))
        .collect::<IndexMap<_, _>>();

    let mut map = ResolutionMap::new();
    map.init(&resolutions, report).unwrap();
    map
}

fn version_of(resolver: &PackageResolver<'_>, pattern: &str) -> String {
    resolver.manifest(&Pattern::new(pattern)).unwrap().version.clone()
}

#[tokio::test]
async fn it_resolves_transitive_dependencies() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^2.0.0")])
        .with_package("b", "2.0.0", &[("c", "*")])
        .with_package("b", "2.1.0", &[("c", "*")])
        .with_package("c", "3.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a@^1.0.0"]), ResolverOptions::default()).await.unwrap();

    assert_eq!(version_of(&resolver, "a@^1.0.0"), "1.0.0");
    assert_eq!(version_of(&resolver, "b@^2.0.0"), "2.1.0");
    assert_eq!(version_of(&resolver, "c@*"), "3.0.0");
    assert_eq!(resolver.get_manifests().len(), 3);

    let c = resolver.reference(&Pattern::new("c@*")).unwrap();
    assert_eq!(c.level, 2);
    assert!(c.fresh);
}

#[tokio::test]
async fn it_reuses_an_existing_version_satisfying_the_range() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.1.0", &[])
        .with_package("a", "1.2.0", &[])
        .with_package("b", "1.0.0", &[("a", "^1.1.0")]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a@^1.0.0", "b@1.0.0"]), ResolverOptions::default()).await.unwrap();

    let first = resolver.get_resolved_pattern(&Pattern::new("a@^1.0.0")).unwrap();
    let second = resolver.get_resolved_pattern(&Pattern::new("a@^1.1.0")).unwrap();

    assert_eq!(first, second);
    assert_eq!(resolver.get_all_info_for_package_name("a").len(), 1);
    assert_eq!(resolver.package(first).reference.patterns, vec![Pattern::new("a@^1.0.0"), Pattern::new("a@^1.1.0")]);
}

#[tokio::test]
async fn it_keeps_the_locked_version_without_fetching() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[])
        .with_package("a", "1.5.0", &[]);

    let lockfile = Lockfile::parse(&format!(concat!(
        "# yarn lockfile v1\n",
        "\n",
        "\n",
        "a@^1.0.0:\n",
        "  version \"1.0.0\"\n",
        "  resolved \"{}\"\n",
    ), tarball_url("a", "1.0.0"))).unwrap();

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, lockfile, ResolutionMap::new());

    resolver.init(requests(&["a@^1.0.0"]), ResolverOptions::default()).await.unwrap();

    assert_eq!(version_of(&resolver, "a@^1.0.0"), "1.0.0");
    assert_eq!(registry.fetch_count(), 0);
    assert!(!resolver.is_new_pattern(&Pattern::new("a@^1.0.0")));
}

#[tokio::test]
async fn it_ignores_outdated_lockfile_entries() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[])
        .with_package("a", "2.0.0", &[]);

    let lockfile = Lockfile::parse(&format!(concat!(
        "# yarn lockfile v1\n",
        "\n",
        "\n",
        "a@^2.0.0:\n",
        "  version \"1.0.0\"\n",
        "  resolved \"{}\"\n",
    ), tarball_url("a", "1.0.0"))).unwrap();

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, lockfile, ResolutionMap::new());

    resolver.init(requests(&["a@^2.0.0"]), ResolverOptions::default()).await.unwrap();

    assert_eq!(version_of(&resolver, "a@^2.0.0"), "2.0.0");
    assert_eq!(report.warnings(), vec!["Lockfile has incorrect entry for \"a@^2.0.0\". Ignoring it.".to_string()]);
    assert!(resolver.lockfile.get_locked("a@^2.0.0").is_none());
}

#[rstest]
#[case(true)]
#[case(false)]
#[tokio::test]
async fn it_applies_resolutions_to_nested_dependencies(#[case] request_target: bool) {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.1.0", &[])
        .with_package("a", "1.2.0", &[])
        .with_package("b", "1.0.0", &[("a", "^1.0.0")]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut top_level = vec![];

    if request_target {
        top_level.push(DependencyRequest::new("a@1.1.0").with_hint(DependencyHint::Resolution));
    }

    top_level.push(DependencyRequest::new("b@1.0.0"));

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), resolution_map(&[("b/a", "1.1.0")], &report));

    resolver.init(top_level, ResolverOptions::default()).await.unwrap();

    assert_eq!(version_of(&resolver, "a@^1.0.0"), "1.1.0");
    assert!(!registry.fetched().contains(&Pattern::new("a@^1.0.0")));
    assert_eq!(registry.fetch_count(), 2);
}

#[tokio::test]
async fn it_collapses_versions_in_flat_mode() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.1.0", &[])
        .with_package("a", "1.2.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a@^1.0.0", "a@~1.1.0"]), ResolverOptions {is_flat: true, is_frozen: false}).await.unwrap();

    assert_eq!(version_of(&resolver, "a@^1.0.0"), "1.1.0");
    assert_eq!(version_of(&resolver, "a@~1.1.0"), "1.1.0");
    assert_eq!(resolver.get_all_info_for_package_name("a").len(), 1);
}

#[tokio::test]
async fn it_rejects_flat_packages_in_a_nested_install() {
    let mut flat_package = package("a", "1.0.0", &[]);
    flat_package.flat = true;

    let registry = MemoryRegistry::new()
        .with(flat_package);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    let result = resolver.init(requests(&["a@^1.0.0"]), ResolverOptions::default()).await;

    assert!(matches!(result, Err(Error::FlatGlobal(name)) if name == "a@1.0.0"));
}

#[tokio::test]
async fn it_rejects_invalid_versions() {
    let registry = MemoryRegistry::new()
        .with_exotic("file:./vendor/banana", package("banana", "not-a-version", &[]), RemoteType::Copy);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    let result = resolver.init(requests(&["banana@file:./vendor/banana"]), ResolverOptions::default()).await;

    assert!(matches!(result, Err(Error::InvalidPackageVersion(name, version)) if name == "banana" && version == "not-a-version"));
}

#[tokio::test]
async fn it_reports_missing_packages() {
    let registry = MemoryRegistry::new();

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    let result = resolver.init(requests(&["ghost@^1.0.0"]), ResolverOptions::default()).await;

    assert!(matches!(result, Err(Error::PackageNotFound(pattern)) if pattern == "ghost@^1.0.0"));
}

#[tokio::test]
async fn it_lets_required_requests_override_optional_ones() {
    let mut parent = package("parent", "1.0.0", &[]);
    parent.optional_dependencies.insert("shared".to_string(), "^1.0.0".to_string());

    let registry = MemoryRegistry::new()
        .with(parent)
        .with_package("shared", "1.0.0", &[])
        .with_package("only-optional", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    let top_level = vec![
        DependencyRequest::new("parent@1.0.0"),
        DependencyRequest::new("only-optional@1.0.0").set_optional(true),
        DependencyRequest::new("shared@^1.0.0"),
    ];

    resolver.init(top_level, ResolverOptions::default()).await.unwrap();

    assert!(!resolver.reference(&Pattern::new("shared@^1.0.0")).unwrap().is_optional());
    assert!(resolver.reference(&Pattern::new("only-optional@1.0.0")).unwrap().is_optional());
}

#[tokio::test]
async fn it_walks_the_graph_in_both_orders() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "1.0.0")])
        .with_package("b", "1.0.0", &[("c", "1.0.0")])
        .with_package("c", "1.0.0", &[])
        .with_package("d", "1.0.0", &[("c", "1.0.0")]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a@1.0.0", "d@1.0.0"]), ResolverOptions::default()).await.unwrap();

    let seeds = vec![Pattern::new("a@1.0.0"), Pattern::new("d@1.0.0")];

    let names = |ids: Vec<super::PackageId>| ids.into_iter()
        .map(|id| resolver.package(id).manifest.name.clone())
        .collect::<Vec<_>>();

    assert_eq!(names(resolver.get_topological_manifests(&seeds)), vec!["c", "b", "a", "d"]);
    assert_eq!(names(resolver.get_level_order_manifests(&seeds)), vec!["a", "d", "b", "c"]);
    assert_eq!(resolver.get_all_dependency_names_by_level_order(&seeds), vec!["a", "d", "b", "c"]);
}

#[tokio::test]
async fn it_fails_to_collapse_to_an_unknown_version() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a@^1.0.0"]), ResolverOptions::default()).await.unwrap();

    let result = resolver.collapse_all_versions_of_package("a", "9.9.9");

    assert!(matches!(result, Err(Error::CollapseTargetMissing(target)) if target == "a@9.9.9"));
}

#[tokio::test]
async fn it_replaces_patterns() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = PackageResolver::new(&config, &report, &registry, Lockfile::new(), ResolutionMap::new());

    resolver.init(requests(&["a"]), ResolverOptions::default()).await.unwrap();
    resolver.replace_pattern(&Pattern::new("a"), Pattern::new("a@^1.0.0"));

    assert!(resolver.get_resolved_pattern(&Pattern::new("a")).is_none());
    assert_eq!(version_of(&resolver, "a@^1.0.0"), "1.0.0");
    assert_eq!(resolver.patterns_for_package("a"), &[Pattern::new("a@^1.0.0")]);
}
