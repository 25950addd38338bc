use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    config::Config,
    lockfile::Lockfile,
    manifest::Manifest,
    pattern::Pattern,
    report::Report,
    workspace::{WorkspaceEntry, WorkspaceLayout},
};

use super::{IntegrityChecker, IntegrityError, IntegrityFile, IntegrityFlags};

const LOCKFILE: &str = concat!(
    "# yarn lockfile v1\n",
    "\n",
    "\n",
    "a@^1.0.0:\n",
    "  version \"1.0.0\"\n",
    "  resolved \"https://registry.example/a/-/a-1.0.0.tgz\"\n",
);

fn setup() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/a")).unwrap();
    std::fs::write(dir.path().join("node_modules/a/index.js"), "").unwrap();

    let config = Config::new(dir.path());

    (dir, config)
}

fn patterns() -> Vec<Pattern> {
    vec![Pattern::new("a@^1.0.0")]
}

#[tokio::test]
async fn it_reports_a_missing_integrity_file() {
    let (_dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();

    let result = IntegrityChecker::new(&config)
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert!(result.integrity_file_missing);
    assert!(!result.integrity_matches);
    assert!(result.missing_patterns.is_empty());
}

#[tokio::test]
async fn it_matches_right_after_saving() {
    let (_dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();
    let checker = IntegrityChecker::new(&config);

    checker.save(&patterns(), &lockfile, IntegrityFlags::default(), None, None).await.unwrap();

    let result = checker
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert!(result.integrity_matches);
    assert_eq!(result.integrity_error, None);
    assert!(!result.hard_refresh_required);
}

#[tokio::test]
async fn it_lists_patterns_missing_from_the_lockfile() {
    let (_dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();
    let checker = IntegrityChecker::new(&config);

    checker.save(&patterns(), &lockfile, IntegrityFlags::default(), None, None).await.unwrap();

    let mut requested = patterns();
    requested.push(Pattern::new("b@^2.0.0"));

    let result = checker
        .check(&requested, &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert!(!result.integrity_file_missing);
    assert!(!result.integrity_matches);
    assert_eq!(result.missing_patterns, vec![Pattern::new("b@^2.0.0")]);
}

#[tokio::test]
async fn it_detects_changed_inputs() {
    let (_dir, mut config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();

    IntegrityChecker::new(&config)
        .save(&patterns(), &lockfile, IntegrityFlags::default(), None, None).await.unwrap();

    config.production = true;

    let result = IntegrityChecker::new(&config)
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert_eq!(result.integrity_error, Some(IntegrityError::FlagsDontMatch));

    config.production = false;
    config.system.abi = "999".to_string();

    let result = IntegrityChecker::new(&config)
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert_eq!(result.integrity_error, Some(IntegrityError::SystemParamsDontMatch));
    assert!(result.hard_refresh_required);
}

#[tokio::test]
async fn it_detects_lockfile_changes() {
    let (_dir, config) = setup();
    let checker = IntegrityChecker::new(&config);

    checker.save(&patterns(), &Lockfile::parse(LOCKFILE).unwrap(), IntegrityFlags::default(), None, None).await.unwrap();

    let updated = Lockfile::parse(&LOCKFILE.replace("a-1.0.0.tgz", "a-1.0.1.tgz")).unwrap();

    let result = checker
        .check(&patterns(), &updated, IntegrityFlags::default(), None).await.unwrap();

    assert_eq!(result.integrity_error, Some(IntegrityError::LockfileDontMatch));
}

#[tokio::test]
async fn it_accepts_a_less_strict_install_after_check_files() {
    let (_dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();
    let checker = IntegrityChecker::new(&config);

    let strict = IntegrityFlags {check_files: true, flat: false};

    checker.save(&patterns(), &lockfile, strict, None, None).await.unwrap();

    let relaxed = checker
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();
    assert!(relaxed.integrity_matches);

    let still_strict = checker
        .check(&patterns(), &lockfile, strict, None).await.unwrap();
    assert!(still_strict.integrity_matches);

    std::fs::remove_file(config.lockfile_folder.join("node_modules/a/index.js")).unwrap();

    let after_removal = checker
        .check(&patterns(), &lockfile, strict, None).await.unwrap();
    assert_eq!(after_removal.integrity_error, Some(IntegrityError::FilesMissing));
}

#[tokio::test]
async fn it_rejects_invalid_integrity_files() {
    let (_dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();
    let checker = IntegrityChecker::new(&config);

    std::fs::write(checker.integrity_file_location(), "{ not json").unwrap();

    let result = checker
        .check(&patterns(), &lockfile, IntegrityFlags::default(), None).await.unwrap();

    assert_eq!(result.integrity_error, Some(IntegrityError::ExpectedIsNotAJson));
}

#[tokio::test]
async fn it_requires_recorded_modules_folders() {
    let (dir, config) = setup();
    let lockfile = Lockfile::parse(LOCKFILE).unwrap();
    let report = Report::new();

    let workspace_loc = dir.path().join("packages/ws");
    std::fs::create_dir_all(workspace_loc.join("node_modules")).unwrap();

    let root = Manifest::new("root", "1.0.0");
    let layout = WorkspaceLayout::new(dir.path().to_path_buf(), &root, vec![WorkspaceEntry {
        loc: workspace_loc.clone(),
        manifest: Manifest::new("ws", "1.0.0"),
    }], &report);

    let checker = IntegrityChecker::new(&config);

    checker.save(&patterns(), &lockfile, IntegrityFlags::default(), Some(&layout), None).await.unwrap();

    let saved: IntegrityFile
        = serde_json::from_str(&std::fs::read_to_string(checker.integrity_file_location()).unwrap()).unwrap();

    assert_eq!(saved.modules_folders, vec!["node_modules".to_string(), "packages/ws/node_modules".to_string()]);

    std::fs::remove_dir_all(workspace_loc.join("node_modules")).unwrap();

    let result = checker
        .check(&patterns(), &lockfile, IntegrityFlags::default(), Some(&layout)).await.unwrap();

    assert_eq!(result.integrity_error, Some(IntegrityError::ModulesFoldersMissing));
}

#[tokio::test]
async fn it_folds_workspace_dependencies_into_the_top_level_patterns() {
    let (dir, config) = setup();
    let report = Report::new();

    let mut workspace = Manifest::new("ws", "1.0.0");
    workspace.dependencies.insert("left-pad".to_string(), "^1.0.0".to_string());
    workspace.dev_dependencies.insert("jest".to_string(), "^29.0.0".to_string());

    let root = Manifest::new("root", "1.0.0");
    let layout = WorkspaceLayout::new(dir.path().to_path_buf(), &root, vec![WorkspaceEntry {
        loc: dir.path().join("packages/ws"),
        manifest: workspace,
    }], &report);

    let requested = vec![
        Pattern::new("a@^1.0.0"),
        Pattern::new(format!("{}@1.0.0", layout.virtual_manifest_name)),
    ];

    let integrity_file = IntegrityChecker::new(&config)
        .generate_integrity_file(&Lockfile::parse(LOCKFILE).unwrap(), &requested, IntegrityFlags::default(), Some(&layout), None).await.unwrap();

    assert_eq!(integrity_file.top_level_patterns, vec![
        "a@^1.0.0".to_string(),
        "jest@^29.0.0".to_string(),
        "left-pad@^1.0.0".to_string(),
        "ws@1.0.0".to_string(),
    ]);
}

#[tokio::test]
async fn it_round_trips_artifacts() {
    let (_dir, config) = setup();
    let checker = IntegrityChecker::new(&config);

    assert_eq!(checker.get_artifacts().await.unwrap(), None);

    let artifacts = BTreeMap::from([
        ("a@1.0.0".to_string(), vec!["build/Release/a.node".to_string()]),
    ]);

    checker.save(&patterns(), &Lockfile::parse(LOCKFILE).unwrap(), IntegrityFlags::default(), None, Some(artifacts.clone())).await.unwrap();

    assert_eq!(checker.get_artifacts().await.unwrap(), Some(artifacts));

    checker.remove_integrity_file().await.unwrap();
    checker.remove_integrity_file().await.unwrap();

    assert_eq!(checker.get_artifacts().await.unwrap(), None);
}

fn files(values: &[&str]) -> IntegrityFile {
    IntegrityFile {
        files: values.iter().map(|value| value.to_string()).collect(),
        ..Default::default()
    }
}

#[rstest]
#[case(&["a", "b", "c"], &["a", "b", "c"], true)]
#[case(&["a", "b", "c", "d"], &["a", "c"], true)]
#[case(&["a", "c"], &["a", "b"], false)]
#[case(&["a"], &["a", "b"], false)]
#[case(&["a", "b", "c"], &["c"], true)]
#[case(&[], &[], true)]
fn it_compares_file_listings(#[case] actual: &[&str], #[case] expected: &[&str], #[case] matches: bool) {
    let outcome = IntegrityChecker::compare_integrity_files(&files(actual), Some(&files(expected)), true);

    assert_eq!(outcome.is_ok(), matches);
}
