use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    config::Config,
    fetcher::{DependencyHint, DependencyRequest},
    lockfile::Lockfile,
    manifest::{Manifest, WorkspacesConfig, WorkspacesField},
    pattern::Pattern,
    report::Report,
    resolution_map::ResolutionMap,
    resolver::{PackageResolver, ResolverOptions},
    testing::{package, MemoryRegistry},
    workspace::{WorkspaceEntry, WorkspaceLayout},
};

use super::{FlatTree, PackageHoister};

async fn resolve<'a>(config: &'a Config, report: &'a Report, registry: &'a MemoryRegistry, workspace_layout: Option<&'a WorkspaceLayout>, requests: Vec<DependencyRequest>) -> PackageResolver<'a> {
    let mut resolver = PackageResolver::new(config, report, registry, Lockfile::new(), ResolutionMap::new())
        .with_workspace_layout(workspace_layout);

    resolver.init(requests, ResolverOptions::default()).await.unwrap();
    resolver
}

fn requests(patterns: &[&str]) -> Vec<DependencyRequest> {
    patterns.iter()
        .map(|pattern| DependencyRequest::new(*pattern))
        .collect()
}

fn patterns(patterns: &[&str]) -> Vec<Pattern> {
    patterns.iter()
        .map(|pattern| Pattern::new(*pattern))
        .collect()
}

fn placements(resolver: &PackageResolver<'_>, flat_tree: &FlatTree) -> Vec<(String, String)> {
    flat_tree.iter()
        .map(|(loc, info)| (loc.display().to_string(), resolver.package(info.pkg).manifest.version.clone()))
        .collect()
}

fn placement(loc: &str, version: &str) -> (String, String) {
    (loc.to_string(), version.to_string())
}

#[tokio::test]
async fn it_hoists_shared_dependencies() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0")])
        .with_package("c", "1.0.0", &[("b", "^1.0.0")])
        .with_package("b", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0", "c@^1.0.0"])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0", "c@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/a", "1.0.0"),
        placement("/project/node_modules/c", "1.0.0"),
        placement("/project/node_modules/b", "1.0.0"),
    ]);

    let b = hoister.get("b").unwrap();
    assert_eq!(b.original_key, "a#b");
    assert_eq!(b.previous_paths, vec!["/a/b".to_string(), "/c/b".to_string()]);
}

#[tokio::test]
async fn it_keeps_conflicting_versions_nested() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0")])
        .with_package("c", "1.0.0", &[("b", "^2.0.0")])
        .with_package("b", "1.0.0", &[])
        .with_package("b", "2.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0", "c@^1.0.0"])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0", "c@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/a", "1.0.0"),
        placement("/project/node_modules/c", "1.0.0"),
        placement("/project/node_modules/b", "1.0.0"),
        placement("/project/node_modules/c/node_modules/b", "2.0.0"),
    ]);

    let explanations
        = hoister.why("b");

    assert_eq!(explanations.len(), 2);
    assert_eq!(explanations[1].key, "c#b");
    assert!(explanations[1].history.iter().any(|line| line.ends_with("Found a collision at b")));
    assert!(explanations[1].history.iter().any(|line| line.ends_with("Didn't hoist - see reason above")));
}

#[tokio::test]
async fn it_produces_the_same_tree_on_every_run() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("d", "^1.0.0"), ("e", "^1.0.0")])
        .with_package("b", "1.0.0", &[("d", "^2.0.0")])
        .with_package("c", "1.0.0", &[("e", "^1.0.0"), ("d", "^2.0.0")])
        .with_package("d", "1.0.0", &[])
        .with_package("d", "2.0.0", &[("e", "^2.0.0")])
        .with_package("e", "1.0.0", &[])
        .with_package("e", "2.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let top_level
        = ["c@^1.0.0", "b@^1.0.0", "a@^1.0.0"];

    let resolver
        = resolve(&config, &report, &registry, None, requests(&top_level)).await;

    let hoist = || {
        let mut hoister
            = PackageHoister::new(&config, &report, &resolver, false, None);

        hoister.seed(&patterns(&top_level)).unwrap();

        hoister.init().into_iter()
            .map(|(loc, info)| (loc, info.key))
            .collect::<Vec<_>>()
    };

    let first = hoist();
    let second = hoist();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn it_seeds_a_repeated_dependency_once() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0")])
        .with_package("b", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0"])).await;

    let a
        = resolver.get_strict_resolved_pattern(&Pattern::new("a@^1.0.0"));

    resolver.package_mut(a).reference.add_dependencies([Pattern::new("b@^1.0.0")]);

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/a", "1.0.0"),
        placement("/project/node_modules/b", "1.0.0"),
    ]);

    let explanations
        = hoister.why("b");

    assert_eq!(explanations.len(), 1);
    assert_eq!(explanations[0].previous_paths, vec!["/a/b".to_string()]);
    assert_eq!(explanations[0].history.iter().filter(|line| line.contains("Start position")).count(), 1);
}

#[tokio::test]
async fn it_gives_the_top_level_slot_to_the_most_required_version() {
    let registry = MemoryRegistry::new()
        .with_package("x", "1.0.0", &[("b", "^1.0.0")])
        .with_package("y", "1.0.0", &[("b", "^2.0.0")])
        .with_package("z", "1.0.0", &[("b", "^2.0.0")])
        .with_package("b", "1.0.0", &[])
        .with_package("b", "2.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let top_level
        = ["x@1.0.0", "y@1.0.0", "z@1.0.0"];

    let resolver
        = resolve(&config, &report, &registry, None, requests(&top_level)).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&top_level)).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/b", "2.0.0"),
        placement("/project/node_modules/x", "1.0.0"),
        placement("/project/node_modules/y", "1.0.0"),
        placement("/project/node_modules/z", "1.0.0"),
        placement("/project/node_modules/x/node_modules/b", "1.0.0"),
    ]);
}

#[tokio::test]
async fn it_seeds_peer_dependencies_first() {
    let mut b = package("b", "1.0.0", &[]);
    b.peer_dependencies.insert("c".to_string(), "*".to_string());

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0"), ("c", "^1.0.0")])
        .with(b)
        .with_package("c", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0"])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0"])).unwrap();

    assert_eq!(hoister.keys().cloned().collect::<Vec<_>>(), vec!["a", "c", "b"]);
}

#[tokio::test]
async fn it_keeps_packages_next_to_their_peers() {
    let mut b = package("b", "1.0.0", &[]);
    b.peer_dependencies.insert("c".to_string(), "*".to_string());

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0"), ("c", "^2.0.0")])
        .with(b)
        .with_package("c", "1.0.0", &[])
        .with_package("c", "2.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0", "c@^1.0.0"])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0", "c@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/a", "1.0.0"),
        placement("/project/node_modules/c", "1.0.0"),
        placement("/project/node_modules/a/node_modules/c", "2.0.0"),
        placement("/project/node_modules/a/node_modules/b", "1.0.0"),
    ]);

    let b = hoister.get("a#b").unwrap();
    assert!(b.history.iter().any(|line| line.ends_with("Found a peer dependency requirement at a#c")));
}

#[rstest]
#[case(true, false)]
#[case(false, true)]
#[tokio::test]
async fn it_drops_ignored_optional_dependencies(#[case] ignore_optional: bool, #[case] installed: bool) {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[])
        .with_package("fsevents", "1.2.0", &[("nan", "^2.0.0")])
        .with_package("nan", "2.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let resolver = resolve(&config, &report, &registry, None, vec![
        DependencyRequest::new("a@^1.0.0"),
        DependencyRequest::new("fsevents@^1.0.0").set_optional(true).with_hint(DependencyHint::Optional),
    ]).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, ignore_optional, None);

    hoister.seed(&patterns(&["a@^1.0.0", "fsevents@^1.0.0"])).unwrap();

    let names = hoister.init().into_iter()
        .map(|(_, info)| info.name)
        .collect::<Vec<_>>();

    assert_eq!(names.contains(&"fsevents".to_string()), installed);
    assert_eq!(names.contains(&"nan".to_string()), installed);
    assert!(names.contains(&"a".to_string()));

    let history
        = &hoister.get("fsevents").unwrap().history;

    assert_eq!(history.iter().any(|line| line.ends_with("Deleted as this module was ignored")), !installed);
}

#[tokio::test]
async fn it_drops_incompatible_packages() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0")])
        .with_package("b", "1.0.0", &[]);

    let config = Config::new("/project");
    let report = Report::new();

    let mut resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0"])).await;

    let b = resolver.get_strict_resolved_pattern(&Pattern::new("b@^1.0.0"));
    resolver.package_mut(b).reference.incompatible = true;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/project/node_modules/a", "1.0.0"),
    ]);
}

#[tokio::test]
async fn it_honors_a_custom_modules_folder() {
    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("b", "^1.0.0")])
        .with_package("b", "1.0.0", &[]);

    let mut config = Config::new("/project");
    config.modules_folder = Some(PathBuf::from("/elsewhere/deps"));

    let report = Report::new();

    let resolver
        = resolve(&config, &report, &registry, None, requests(&["a@^1.0.0"])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, None);

    hoister.seed(&patterns(&["a@^1.0.0"])).unwrap();

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/elsewhere/deps/a", "1.0.0"),
        placement("/elsewhere/deps/b", "1.0.0"),
    ]);
}

fn monorepo(report: &Report, nohoist: &[&str], workspaces: Vec<WorkspaceEntry>, dependencies: &[(&str, &str)]) -> WorkspaceLayout {
    let mut root = package("monorepo", "1.0.0", dependencies);
    root.private = true;
    root.workspaces = Some(WorkspacesField::Config(WorkspacesConfig {
        packages: vec!["packages/*".to_string()],
        nohoist: nohoist.iter().map(|glob| glob.to_string()).collect(),
    }));

    WorkspaceLayout::new(PathBuf::from("/repo"), &root, workspaces, report)
}

fn workspace(name: &str, dependencies: &[(&str, &str)]) -> WorkspaceEntry {
    let manifest: Manifest
        = package(name, "1.0.0", dependencies);

    WorkspaceEntry {
        loc: PathBuf::from(format!("/repo/packages/{}", name)),
        manifest,
    }
}

#[tokio::test]
async fn it_keeps_nohoist_packages_inside_their_workspace() {
    let registry = MemoryRegistry::new()
        .with_package("react-native", "1.0.0", &[])
        .with_package("lodash", "4.0.0", &[]);

    let config = Config::new("/repo");
    let report = Report::new();

    let layout = monorepo(&report, &["**/react-native"], vec![
        workspace("app", &[("react-native", "^1.0.0"), ("lodash", "^4.0.0")]),
    ], &[]);

    let aggregator
        = format!("{}@1.0.0", layout.virtual_manifest_name);

    let resolver
        = resolve(&config, &report, &registry, Some(&layout), requests(&[&aggregator])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, Some(&layout));

    hoister.seed(&patterns(&[&aggregator])).unwrap();

    let react_native
        = hoister.get("app#react-native").unwrap();

    assert!(react_native.is_nohoist);
    assert!(react_native.history.iter().any(|line| line.ends_with("Marked as nohoist, will not be hoisted above 'app'")));
    assert_eq!(react_native.original_parent_path, "/_project_/app");
    assert_eq!(react_native.nohoist_list, Some(vec!["/_project_/**/react-native".to_string()]));

    assert_eq!(placements(&resolver, &hoister.init()), vec![
        placement("/repo/node_modules/app", "1.0.0"),
        placement("/repo/node_modules/lodash", "4.0.0"),
        placement("/repo/node_modules/app/node_modules/react-native", "1.0.0"),
    ]);
}

#[tokio::test]
async fn it_installs_focused_workspace_dependencies_shallowly() {
    let registry = MemoryRegistry::new()
        .with_package("lib", "1.0.0", &[])
        .with_package("lodash", "3.0.0", &[])
        .with_package("lodash", "4.0.0", &[]);

    let mut config = Config::new("/repo/packages/app");
    config.lockfile_folder = PathBuf::from("/repo");
    config.focus = true;
    config.focused_workspace_name = Some("app".to_string());

    let report = Report::new();

    let layout = monorepo(&report, &[], vec![
        workspace("app", &[("lib", "1.0.0"), ("lodash", "^3.0.0")]),
        workspace("lib", &[("lodash", "^4.0.0")]),
    ], &[("lodash", "^4.0.0")]);

    let aggregator
        = format!("{}@1.0.0", layout.virtual_manifest_name);

    let resolver
        = resolve(&config, &report, &registry, Some(&layout), requests(&[&aggregator])).await;

    let mut hoister
        = PackageHoister::new(&config, &report, &resolver, false, Some(&layout));

    hoister.seed(&patterns(&[&aggregator])).unwrap();
    hoister.mark_shallow_workspace_entries();

    assert_eq!(hoister.get("lib").unwrap().shallow_paths, vec![None]);
    assert_eq!(hoister.get("lodash").unwrap().shallow_paths, vec![Some("lib".to_string())]);

    let flat_tree
        = hoister.init();

    let shallow = flat_tree.iter()
        .filter(|(_, info)| info.is_shallow)
        .map(|(loc, _)| loc.display().to_string())
        .collect::<Vec<_>>();

    assert_eq!(shallow, vec![
        "/repo/packages/app/node_modules/lib".to_string(),
        "/repo/packages/app/node_modules/lib/node_modules/lodash".to_string(),
    ]);

    assert_eq!(placements(&resolver, &flat_tree).last(), Some(&placement("/repo/node_modules/app/node_modules/lodash", "3.0.0")));
}
