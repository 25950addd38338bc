use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use ypm_utils::FromFileString;

use crate::{
    manifest::RegistryName,
    pattern::Pattern,
    report::{Report, Severity},
    sri::Integrity,
};

use super::{explode_entry, implode_entry, LockManifest, LockedPackage, Lockfile, LockfileEntry, LockfileInput, ParseResultType};

fn locked(name: &str, version: &str, resolved: &str) -> LockedPackage {
    LockedPackage {
        name: name.to_string(),
        version: version.to_string(),
        uid: version.to_string(),
        resolved: Some(resolved.to_string()),
        ..Default::default()
    }
}

fn input(package: LockedPackage) -> LockfileInput {
    LockfileInput {
        remote_key: package.resolved.clone(),
        package,
    }
}

#[test]
fn it_omits_inferable_fields() {
    let mut package = locked("left-pad", "1.3.0", "https://example.com/left-pad-1.3.0.tgz");
    package.integrity = Some(Integrity::from_file_string("sha512-abc sha1-def").unwrap());

    let imploded = implode_entry("left-pad@^1.0.0", &package);

    assert_eq!(imploded.name, None);
    assert_eq!(imploded.uid, None);
    assert_eq!(imploded.registry, None);

    assert_eq!(explode_entry("left-pad@^1.0.0", &imploded), package);
}

#[test]
fn it_keeps_fields_that_cannot_be_inferred() {
    let mut package = locked("string-width", "4.2.3", "https://example.com/string-width-4.2.3.tgz");
    package.uid = "abcdef".to_string();
    package.registry = RegistryName::Yarn;
    package.permissions.insert("postinstall".to_string(), true);

    let imploded = implode_entry("string-width-cjs@npm:string-width@^4.2.0", &package);

    assert_eq!(imploded.name, Some("string-width".to_string()));
    assert_eq!(imploded.uid, Some("abcdef".to_string()));
    assert_eq!(imploded.registry, Some(RegistryName::Yarn));

    assert_eq!(explode_entry("string-width-cjs@npm:string-width@^4.2.0", &imploded), package);
}

#[test]
fn it_dedupes_patterns_sharing_a_remote() {
    let mut patterns = BTreeMap::new();
    patterns.insert(Pattern::new("b@^1.1.0"), input(locked("b", "1.1.0", "https://example.com/b-1.1.0.tgz")));
    patterns.insert(Pattern::new("b@^1.0.0"), input(locked("b", "1.1.0", "https://example.com/b-1.1.0.tgz")));
    patterns.insert(Pattern::new("a@^1.0.0"), input(locked("a", "1.0.0", "https://example.com/a-1.0.0.tgz")));

    let entries = Lockfile::get_lockfile(&patterns);

    assert!(matches!(entries.get("b@^1.0.0"), Some(LockfileEntry::Full(_))));
    assert_eq!(entries.get("b@^1.1.0"), Some(&LockfileEntry::Alias(Pattern::new("b@^1.0.0"))));

    let lockfile = Lockfile::from_entries(entries);

    assert_eq!(lockfile.get_locked("b@^1.1.0"), lockfile.get_locked("b@^1.0.0"));
    assert_eq!(lockfile.get_locked("b@^1.1.0").unwrap().version, "1.1.0");
}

#[test]
fn it_records_the_name_when_an_alias_infers_another_one() {
    let mut patterns = BTreeMap::new();
    patterns.insert(Pattern::new("b@^1.0.0"), input(locked("b", "1.0.0", "https://example.com/b-1.0.0.tgz")));
    patterns.insert(Pattern::new("c@npm:b@^1.0.0"), input(locked("b", "1.0.0", "https://example.com/b-1.0.0.tgz")));

    let entries = Lockfile::get_lockfile(&patterns);

    let Some(LockfileEntry::Full(manifest)) = entries.get("b@^1.0.0") else {
        panic!("expected a full entry");
    };

    assert_eq!(manifest.name, Some("b".to_string()));
}

#[test]
fn it_writes_aliases_as_key_groups() {
    let mut patterns = BTreeMap::new();
    patterns.insert(Pattern::new("b@^1.0.0"), input(locked("b", "1.1.0", "https://example.com/b-1.1.0.tgz")));
    patterns.insert(Pattern::new("b@~1.1.0"), input(locked("b", "1.1.0", "https://example.com/b-1.1.0.tgz")));

    let text = Lockfile::from_entries(Lockfile::get_lockfile(&patterns))
        .stringify();

    assert!(text.contains("b@^1.0.0, b@~1.1.0:\n  version \"1.1.0\"\n  resolved \"https://example.com/b-1.1.0.tgz\"\n"));

    let reparsed = Lockfile::parse(&text).unwrap();
    assert_eq!(reparsed.get_locked("b@~1.1.0").unwrap().resolved.as_deref(), Some("https://example.com/b-1.1.0.tgz"));
    assert_eq!(reparsed.stringify(), text);
}

#[test]
fn it_follows_string_aliases() {
    let mut cache = BTreeMap::new();
    cache.insert(Pattern::new("a@^1.0.0"), LockfileEntry::Full(LockManifest {
        version: "1.2.0".to_string(),
        ..Default::default()
    }));
    cache.insert(Pattern::new("a@1.x"), LockfileEntry::Alias(Pattern::new("a@^1.0.0")));
    cache.insert(Pattern::new("a@*"), LockfileEntry::Alias(Pattern::new("a@1.x")));

    let lockfile = Lockfile::from_entries(cache);
    let package = lockfile.get_locked("a@*").unwrap();

    assert_eq!(package.name, "a");
    assert_eq!(package.uid, "1.2.0");
    assert_eq!(package.registry, RegistryName::Npm);
}

#[test]
fn it_removes_patterns() {
    let mut lockfile = Lockfile::parse("a@^1.0.0:\n  version \"1.0.0\"\n").unwrap();
    assert!(lockfile.get_locked("a@^1.0.0").is_some());

    lockfile.remove_pattern("a@^1.0.0");
    assert!(lockfile.get_locked("a@^1.0.0").is_none());
    assert!(lockfile.is_empty());
}

#[test]
fn it_lists_resolved_urls() {
    let lockfile = Lockfile::parse("a@^1.0.0, a@^1.1.0:\n  version \"1.1.0\"\n  resolved \"https://example.com/a.tgz\"\n\n\"b@file:./b\":\n  version \"0.0.0\"\n").unwrap();

    let mut expected = BTreeMap::new();
    expected.insert("a@^1.0.0".to_string(), "https://example.com/a.tgz".to_string());
    expected.insert("a@^1.1.0".to_string(), "https://example.com/a.tgz".to_string());
    expected.insert("b@file:./b".to_string(), String::new());

    assert_eq!(lockfile.resolved_entries(), expected);
}

#[test]
fn it_ignores_berry_lockfiles() {
    let lockfile = Lockfile::parse("__metadata:\n  version: 6\n\n\"a@npm:^1.0.0\":\n  version: 1.0.0\n").unwrap();

    assert!(lockfile.is_empty());
}

#[tokio::test]
async fn it_loads_lockfiles_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let report = Report::new();

    let missing = Lockfile::from_directory(dir.path(), &report).await.unwrap();
    assert!(missing.is_empty());
    assert_eq!(missing.parse_result_type, None);

    std::fs::write(dir.path().join("yarn.lock"), "<<<<<<< HEAD\na@^1.0.0:\n  version \"1.0.0\"\n=======\na@^1.0.0:\n  version \"1.0.1\"\n>>>>>>> other\n").unwrap();

    let merged = Lockfile::from_directory(dir.path(), &report).await.unwrap();
    assert_eq!(merged.parse_result_type, Some(ParseResultType::Merge));
    assert_eq!(merged.get_locked("a@^1.0.0").unwrap().version, "1.0.1");

    assert_eq!(report.messages_with(Severity::Info).len(), 2);
}
