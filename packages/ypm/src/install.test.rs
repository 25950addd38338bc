use std::{path::Path, sync::Mutex};

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    config::{Config, LOCKFILE_FILENAME},
    error::Error,
    hooks::{Hooks, InstallStep},
    manifest::{Manifest, WorkspacesField},
    pattern::Pattern,
    report::{Report, Severity},
    testing::{init_logger, package, MemoryRegistry},
    workspace::{WorkspaceEntry, WorkspaceLayout},
};

use super::{Install, InstallOutcome};

fn project() -> (tempfile::TempDir, Config) {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path());

    (dir, config)
}

fn write_manifest(dir: &Path, manifest: &Manifest) {
    std::fs::write(dir.join("package.json"), serde_json::to_string_pretty(manifest).unwrap()).unwrap();
}

fn placements(dir: &Path, outcome: &InstallOutcome) -> Vec<(String, String)> {
    let mut placements = outcome.flat_tree.iter()
        .map(|row| (row.loc.strip_prefix(dir).unwrap().display().to_string(), row.manifest.version.clone()))
        .collect::<Vec<_>>();

    placements.sort();
    placements
}

fn placement(loc: &str, version: &str) -> (String, String) {
    (loc.to_string(), version.to_string())
}

fn diamond() -> MemoryRegistry {
    MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("c", "^2.0.0")])
        .with_package("b", "1.0.0", &[("c", "^2.0.0")])
        .with_package("c", "2.0.0", &[])
        .with_package("c", "2.1.0", &[])
}

#[tokio::test]
async fn it_installs_a_diamond_and_writes_the_lockfile() {
    let (dir, config) = project();
    let report = Report::new();
    let registry = diamond();

    let root = package("root", "1.0.0", &[("a", "^1.0.0"), ("b", "^1.0.0")]);

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    assert!(!outcome.up_to_date);
    assert!(outcome.lockfile_changed);
    assert_eq!(outcome.top_level_patterns, vec![Pattern::new("a@^1.0.0"), Pattern::new("b@^1.0.0")]);

    assert_eq!(placements(dir.path(), &outcome), vec![
        placement("node_modules/a", "1.0.0"),
        placement("node_modules/b", "1.0.0"),
        placement("node_modules/c", "2.1.0"),
    ]);

    let written
        = std::fs::read_to_string(dir.path().join(LOCKFILE_FILENAME)).unwrap();

    assert_eq!(written, outcome.lockfile);
    assert!(written.starts_with("# THIS IS AN AUTOGENERATED FILE"));
    assert!(written.contains("c@^2.0.0:\n  version \"2.1.0\"\n"));
    assert!(dir.path().join("node_modules/.yarn-integrity").exists());
}

#[tokio::test]
async fn it_records_resolution_overrides_in_the_lockfile() {
    let (dir, config) = project();
    let report = Report::new();

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("left-pad", "^1.0.0")])
        .with_package("left-pad", "1.3.0", &[])
        .with_package("left-pad", "1.3.5", &[]);

    let mut root
        = package("root", "1.0.0", &[("a", "^1.0.0")]);

    root.resolutions.insert("**/left-pad".to_string(), "1.3.0".to_string());

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    assert_eq!(placements(dir.path(), &outcome), vec![
        placement("node_modules/a", "1.0.0"),
        placement("node_modules/left-pad", "1.3.0"),
    ]);

    assert!(outcome.lockfile.contains("left-pad@1.3.0, left-pad@^1.0.0:\n  version \"1.3.0\"\n"));
}

#[tokio::test]
async fn it_bails_out_when_the_integrity_file_matches() {
    let (dir, config) = project();
    let report = Report::new();
    let registry = diamond();

    write_manifest(dir.path(), &package("root", "1.0.0", &[("a", "^1.0.0"), ("b", "^1.0.0")]));

    let first = Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    assert!(!first.up_to_date);

    let fetch_count
        = registry.fetch_count();

    let second = Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    assert!(second.up_to_date);
    assert!(!second.lockfile_changed);
    assert!(second.flat_tree.is_empty());
    assert_eq!(second.lockfile, first.lockfile);
    assert_eq!(registry.fetch_count(), fetch_count);
}

#[tokio::test]
async fn it_keeps_an_unchanged_lockfile_untouched() {
    let (dir, config) = project();
    let report = Report::new();
    let registry = diamond();

    write_manifest(dir.path(), &package("root", "1.0.0", &[("a", "^1.0.0"), ("b", "^1.0.0")]));

    Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    std::fs::remove_file(dir.path().join("node_modules/.yarn-integrity")).unwrap();

    let outcome = Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    assert!(!outcome.up_to_date);
    assert!(!outcome.lockfile_changed);
    assert_eq!(outcome.flat_tree.len(), 3);
    assert!(dir.path().join("node_modules/.yarn-integrity").exists());
}

#[tokio::test]
async fn it_refuses_to_update_a_frozen_lockfile() {
    let (dir, mut config) = project();
    let report = Report::new();

    let registry = diamond()
        .with_package("d", "1.0.0", &[]);

    write_manifest(dir.path(), &package("root", "1.0.0", &[("a", "^1.0.0")]));

    Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    let before
        = std::fs::read_to_string(dir.path().join(LOCKFILE_FILENAME)).unwrap();

    write_manifest(dir.path(), &package("root", "1.0.0", &[("a", "^1.0.0"), ("d", "^1.0.0")]));
    config.frozen_lockfile = true;

    let result = Install::load(&config, &report, &registry).await.unwrap()
        .run().await;

    assert!(matches!(result, Err(Error::FrozenLockfileOutdated)));
    assert_eq!(std::fs::read_to_string(dir.path().join(LOCKFILE_FILENAME)).unwrap(), before);
}

#[tokio::test]
async fn it_collapses_every_package_to_one_version_when_flat() {
    let (dir, mut config) = project();
    let report = Report::new();

    config.flat = true;

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("c", "^1.0.0")])
        .with_package("b", "1.0.0", &[("c", "^2.0.0")])
        .with_package("c", "1.0.0", &[])
        .with_package("c", "2.0.0", &[]);

    let root = package("root", "1.0.0", &[("a", "^1.0.0"), ("b", "^1.0.0")]);

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    assert_eq!(placements(dir.path(), &outcome), vec![
        placement("node_modules/a", "1.0.0"),
        placement("node_modules/b", "1.0.0"),
        placement("node_modules/c", "2.0.0"),
    ]);

    assert_eq!(outcome.flat_resolutions.get("c"), Some(&"2.0.0".to_string()));
    assert!(outcome.lockfile.contains("c@^1.0.0, c@^2.0.0:\n  version \"2.0.0\"\n"));
}

#[tokio::test]
async fn it_follows_the_root_resolutions_when_flat() {
    let (dir, mut config) = project();
    let report = Report::new();

    config.flat = true;

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[("c", "^1.0.0")])
        .with_package("b", "1.0.0", &[("c", "^2.0.0")])
        .with_package("c", "1.0.0", &[])
        .with_package("c", "2.0.0", &[]);

    let mut root
        = package("root", "1.0.0", &[("a", "^1.0.0"), ("b", "^1.0.0")]);

    root.resolutions.insert("c".to_string(), "1.0.0".to_string());

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    assert!(placements(dir.path(), &outcome).contains(&placement("node_modules/c", "1.0.0")));
    assert_eq!(outcome.flat_resolutions.get("c"), Some(&"1.0.0".to_string()));
}

#[rstest]
#[case(false, true)]
#[case(true, false)]
#[tokio::test]
async fn it_skips_dev_dependencies_in_production(#[case] production: bool, #[case] installed: bool) {
    let (dir, mut config) = project();
    let report = Report::new();

    config.production = production;

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[])
        .with_package("jest", "29.0.0", &[]);

    let mut root
        = package("root", "1.0.0", &[("a", "^1.0.0")]);

    root.dev_dependencies.insert("jest".to_string(), "^29.0.0".to_string());

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    let has_jest = placements(dir.path(), &outcome)
        .contains(&placement("node_modules/jest", "29.0.0"));

    assert_eq!(has_jest, installed);
    assert!(outcome.lockfile.contains("jest@^29.0.0:"));
}

fn darwin_only(name: &str) -> Manifest {
    let mut manifest
        = package(name, "1.0.0", &[]);

    manifest.os = vec!["darwin".to_string()];
    manifest
}

#[tokio::test]
async fn it_excludes_incompatible_optional_dependencies() {
    let (dir, mut config) = project();
    let report = Report::new();

    config.system.platform = "linux".to_string();

    let registry = MemoryRegistry::new()
        .with_package("a", "1.0.0", &[])
        .with(darwin_only("fsevents"));

    let mut root
        = package("root", "1.0.0", &[("a", "^1.0.0")]);

    root.optional_dependencies.insert("fsevents".to_string(), "^1.0.0".to_string());

    let outcome = Install::new(&config, &report, &registry, root)
        .run().await.unwrap();

    assert_eq!(placements(dir.path(), &outcome), vec![
        placement("node_modules/a", "1.0.0"),
    ]);

    assert!(report.messages_with(Severity::Info).iter().any(|message| message.contains("\"fsevents@1.0.0\" is an optional dependency")));
}

#[tokio::test]
async fn it_fails_on_incompatible_required_dependencies() {
    let (_dir, mut config) = project();
    let report = Report::new();

    config.system.platform = "linux".to_string();

    let registry = MemoryRegistry::new()
        .with(darwin_only("fsevents"));

    let root = package("root", "1.0.0", &[("fsevents", "^1.0.0")]);

    let result = Install::new(&config, &report, &registry, root)
        .run().await;

    assert!(matches!(result, Err(Error::IncompatiblePackages(_))));
}

#[tokio::test]
async fn it_checks_the_project_engines_before_resolving() {
    let (_dir, mut config) = project();
    let report = Report::new();
    let registry = diamond();

    config.system.node_version = "16.0.0".to_string();

    let mut root
        = package("root", "1.0.0", &[("a", "^1.0.0")]);

    root.engines.insert("node".to_string(), ">=18.0.0".to_string());

    let result = Install::new(&config, &report, &registry, root)
        .run().await;

    assert!(matches!(result, Err(Error::IncompatiblePackages(_))));
    assert_eq!(registry.fetch_count(), 0);
}

#[tokio::test]
async fn it_keeps_workspaces_out_of_the_lockfile() {
    let (dir, config) = project();
    let report = Report::new();

    let registry = MemoryRegistry::new()
        .with_package("lodash", "4.17.21", &[]);

    let mut root
        = package("root", "1.0.0", &[]);

    root.private = true;
    root.workspaces = Some(WorkspacesField::Packages(vec!["packages/*".to_string()]));

    let layout = WorkspaceLayout::new(dir.path().to_path_buf(), &root, vec![WorkspaceEntry {
        loc: dir.path().join("packages/app"),
        manifest: package("app", "1.0.0", &[("lodash", "^4.0.0")]),
    }], &report);

    let install = Install::new(&config, &report, &registry, root)
        .with_workspace_layout(Some(&layout));

    let request
        = install.fetch_request_from_cwd().unwrap();

    assert_eq!(request.patterns, vec![
        Pattern::new("workspace-aggregator-root@1.0.0"),
        Pattern::new("app@1.0.0"),
    ]);

    let outcome
        = install.run().await.unwrap();

    assert_eq!(placements(dir.path(), &outcome), vec![
        placement("node_modules/app", "1.0.0"),
        placement("node_modules/lodash", "4.17.21"),
    ]);

    assert!(outcome.lockfile.contains("lodash@^4.0.0:"));
    assert!(!outcome.lockfile.contains("workspace-aggregator"));
    assert!(!outcome.lockfile.contains("\napp@"));
}

#[derive(Default)]
struct RecordingHooks {
    calls: Mutex<Vec<String>>,
}

impl Hooks for RecordingHooks {
    fn before_step(&self, step: InstallStep) {
        self.calls.lock().unwrap().push(format!("before {}", step));
    }

    fn after_step(&self, step: InstallStep) {
        self.calls.lock().unwrap().push(format!("after {}", step));
    }
}

#[tokio::test]
async fn it_wraps_every_step_with_the_hooks() {
    let (_dir, config) = project();
    let report = Report::new();
    let registry = diamond();
    let hooks = RecordingHooks::default();

    let root = package("root", "1.0.0", &[("a", "^1.0.0")]);

    Install::new(&config, &report, &registry, root)
        .with_hooks(&hooks)
        .run().await.unwrap();

    assert_eq!(hooks.calls.lock().unwrap().clone(), vec![
        "before resolve",
        "after resolve",
        "before integrity-check",
        "after integrity-check",
        "before compatibility-check",
        "after compatibility-check",
        "before hoist",
        "after hoist",
        "before save-integrity",
        "after save-integrity",
        "before save-lockfile",
        "after save-lockfile",
    ]);
}

#[tokio::test]
async fn it_preserves_windows_line_endings() {
    let (dir, config) = project();
    let report = Report::new();
    let registry = diamond();

    std::fs::write(dir.path().join(LOCKFILE_FILENAME), "# yarn lockfile v1\r\n\r\n").unwrap();
    write_manifest(dir.path(), &package("root", "1.0.0", &[("a", "^1.0.0")]));

    let outcome = Install::load(&config, &report, &registry).await.unwrap()
        .run().await.unwrap();

    let written
        = std::fs::read_to_string(dir.path().join(LOCKFILE_FILENAME)).unwrap();

    assert!(outcome.lockfile_changed);
    assert_eq!(written, outcome.lockfile.replace('\n', "\r\n"));
}
