use std::path::PathBuf;

use crate::{
    manifest::{Manifest, RemoteType},
    report::Report,
    workspace::{WorkspaceEntry, WorkspaceLayout},
};

fn entry(loc: &str, name: &str, version: &str) -> WorkspaceEntry {
    WorkspaceEntry {
        loc: PathBuf::from(loc),
        manifest: Manifest::new(name, version),
    }
}

fn layout(report: &Report) -> WorkspaceLayout {
    let mut root = Manifest::new("monorepo", "");
    root.private = true;
    root.dependencies.insert("left-pad".to_string(), "^1.0.0".to_string());

    WorkspaceLayout::new(PathBuf::from("/repo"), &root, vec![
        entry("/repo/packages/a", "pkg-a", "1.2.0"),
        entry("/repo/packages/b", "pkg-b", "2.0.0"),
        entry("/repo/packages/broken", "", "1.0.0"),
    ], report)
}

#[test]
fn it_builds_the_virtual_manifest() {
    let report = Report::new();
    let layout = layout(&report);

    let aggregator = layout.virtual_manifest();

    assert_eq!(layout.virtual_manifest_name, "workspace-aggregator-monorepo");
    assert_eq!(aggregator.manifest.dependencies.get("pkg-a").map(String::as_str), Some("1.2.0"));
    assert_eq!(aggregator.manifest.dependencies.get("left-pad").map(String::as_str), Some("^1.0.0"));
    assert_eq!(aggregator.manifest.remote_type(), Some(RemoteType::Workspace));
    assert_eq!(layout.workspace_names().collect::<Vec<_>>(), vec!["pkg-a", "pkg-b"]);
}

#[test]
fn it_skips_workspaces_without_name() {
    let report = Report::new();
    let _ = layout(&report);

    assert_eq!(report.warnings().len(), 1);
}

#[test]
fn it_matches_patterns_against_workspace_versions() {
    let report = Report::new();
    let layout = layout(&report);

    assert!(layout.get_manifest_by_pattern("pkg-a@^1.0.0").is_some());
    assert!(layout.get_manifest_by_pattern("pkg-a@1.2.0").is_some());
    assert!(layout.get_manifest_by_pattern("pkg-a").is_some());
    assert!(layout.get_manifest_by_pattern("pkg-a@^2.0.0").is_none());
    assert!(layout.get_manifest_by_pattern("pkg-c@^1.0.0").is_none());
}
