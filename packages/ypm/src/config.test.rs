use std::path::PathBuf;

use crate::{
    config::Config,
    error::Error,
    manifest::{Manifest, WorkspacesConfig, WorkspacesField},
    report::Report,
};

#[tokio::test]
async fn it_loads_the_rc_file() {
    let dir = tempfile::tempdir().unwrap();

    tokio::fs::write(dir.path().join(".yarnrc.yml"), "production: true\nnetworkConcurrency: 3\nlinkedModules:\n  - foo\n").await.unwrap();

    let config = Config::load(dir.path()).await.unwrap();

    assert!(config.production);
    assert_eq!(config.network_concurrency, 3);
    assert_eq!(config.linked_modules, vec!["foo".to_string()]);
    assert_eq!(config.lockfile_folder, dir.path());
}

#[tokio::test]
async fn it_defaults_without_rc_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path()).await.unwrap();

    assert_eq!(config.modules_root(), dir.path().join("node_modules"));
    assert!(config.workspaces_enabled);
}

#[test]
fn it_applies_env_overrides() {
    let mut config = Config::new("/project");

    config.apply_env([
        ("YARN_IGNORE_SCRIPTS", "1"),
        ("YARN_NETWORK_CONCURRENCY", "16"),
        ("YARN_MODULES_FOLDER", "/tmp/modules"),
        ("UNRELATED", "whatever"),
    ]).unwrap();

    assert!(config.ignore_scripts);
    assert_eq!(config.network_concurrency, 16);
    assert_eq!(config.modules_root(), PathBuf::from("/tmp/modules"));
}

#[test]
fn it_rejects_invalid_env_values() {
    let mut config = Config::new("/project");
    let result = config.apply_env([("YARN_PRODUCTION", "maybe")]);

    assert!(matches!(result, Err(Error::InvalidConfigValue(key, _)) if key == "YARN_PRODUCTION"));
}

fn workspace_root(private: bool) -> Manifest {
    let mut manifest = Manifest::new("root", "1.0.0");
    manifest.private = private;
    manifest.workspaces = Some(WorkspacesField::Config(WorkspacesConfig {
        packages: vec!["packages/*".to_string()],
        nohoist: vec!["**/react-native".to_string()],
    }));
    manifest
}

#[test]
fn it_returns_valid_workspace_settings() {
    let config = Config::new("/project");
    let report = Report::new();

    let workspaces = config.get_workspaces(&workspace_root(true), &report).unwrap();

    assert_eq!(workspaces.nohoist, vec!["**/react-native".to_string()]);
    assert!(report.warnings().is_empty());
}

#[test]
fn it_requires_private_projects_for_workspaces() {
    let config = Config::new("/project");
    let report = Report::new();

    assert_eq!(config.get_workspaces(&workspace_root(false), &report), None);
    assert_eq!(report.warnings(), vec!["Workspaces can only be enabled in private projects.".to_string()]);
}

#[test]
fn it_drops_nohoist_when_disabled() {
    let mut config = Config::new("/project");
    config.workspaces_nohoist_enabled = false;

    let report = Report::new();
    let workspaces = config.get_workspaces(&workspace_root(true), &report).unwrap();

    assert!(workspaces.nohoist.is_empty());
    assert_eq!(report.warnings().len(), 1);

    config.workspaces_enabled = false;
    assert_eq!(config.get_workspaces(&workspace_root(true), &report), None);
}
