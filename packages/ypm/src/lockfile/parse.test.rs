use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::error::Error;

use super::{parse, LockObject, LockValue, ParseResultType};

fn string(value: &str) -> LockValue {
    LockValue::String(value.to_string())
}

#[test]
fn it_parses_a_simple_lockfile() {
    let source = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"left-pad@^1.0.0", left-pad@^1.1.0:
  version "1.3.0"
  resolved "https://registry.yarnpkg.com/left-pad/-/left-pad-1.3.0.tgz#5b8a3a7765dfe001261dde915589e782f8c94d1e"
  dependencies:
    foo "^2.0.0"

foo@^2.0.0:
  version "2.1.0"
  permissions:
    postinstall true
"#;

    let result = parse(source).unwrap();
    assert_eq!(result.result_type, ParseResultType::Success);

    let object = result.object;
    assert_eq!(object.groups.len(), 2);
    assert_eq!(object.groups[0].0, vec!["left-pad@^1.0.0".to_string(), "left-pad@^1.1.0".to_string()]);

    let left_pad = object.get_object("left-pad@^1.1.0").unwrap();
    assert_eq!(left_pad.get_str("version"), Some("1.3.0"));
    assert_eq!(left_pad.get_object("dependencies").unwrap().get_str("foo"), Some("^2.0.0"));

    let foo = object.get_object("foo@^2.0.0").unwrap();
    assert_eq!(foo.get_object("permissions").unwrap().get("postinstall"), Some(&LockValue::Boolean(true)));
}

#[test]
fn it_supports_crlf_and_a_bom() {
    let source = "\u{feff}foo@^1.0.0:\r\n  version \"1.0.0\"\r\n";

    let object = parse(source).unwrap().object;
    assert_eq!(object.get_object("foo@^1.0.0").unwrap().get_str("version"), Some("1.0.0"));
}

#[test]
fn it_parses_numbers_and_bare_values() {
    let object = parse("a 42\nb hello\nc false\n").unwrap().object;

    assert_eq!(object.get("a"), Some(&LockValue::Number(42)));
    assert_eq!(object.get("b"), Some(&string("hello")));
    assert_eq!(object.get("c"), Some(&LockValue::Boolean(false)));
}

#[test]
fn it_rejects_newer_lockfile_versions() {
    let result = parse("# yarn lockfile v2\nfoo@^1.0.0:\n  version \"1.0.0\"\n");

    assert!(matches!(result, Err(Error::UnsupportedLockfileVersion(2))));
}

#[rstest]
#[case("\"foo:\n")]
#[case("foo@^1.0.0:\n   version \"1.0.0\n")]
fn it_reports_syntax_errors(#[case] source: &str) {
    assert!(matches!(parse(source), Err(Error::LockfileParseError {..})));
}

#[test]
fn it_merges_conflicting_sides() {
    let source = r#"a@^1.0.0:
  version "1.0.0"

<<<<<<< HEAD
b@^1.0.0:
  version "1.0.0"
=======
b@^1.0.0:
  version "1.1.0"

c@^1.0.0:
  version "1.0.0"
>>>>>>> feature
"#;

    let result = parse(source).unwrap();
    assert_eq!(result.result_type, ParseResultType::Merge);

    let object = result.object;
    assert_eq!(object.get_object("a@^1.0.0").unwrap().get_str("version"), Some("1.0.0"));
    assert_eq!(object.get_object("b@^1.0.0").unwrap().get_str("version"), Some("1.1.0"));
    assert_eq!(object.get_object("c@^1.0.0").unwrap().get_str("version"), Some("1.0.0"));
}

#[test]
fn it_drops_the_common_ancestor_of_diff3_conflicts() {
    let source = r#"<<<<<<< HEAD
b@^1.0.0:
  version "1.0.0"
||||||| merged common ancestors
b@^1.0.0:
  version "0.9.0"
=======
b@^1.0.0:
  version "1.1.0"
>>>>>>> feature
"#;

    let result = parse(source).unwrap();

    assert_eq!(result.result_type, ParseResultType::Merge);
    assert_eq!(result.object.get_object("b@^1.0.0").unwrap().get_str("version"), Some("1.1.0"));
}

#[test]
fn it_flags_unmergeable_conflicts() {
    let source = "<<<<<<< HEAD\n\"broken:\n=======\nb@^1.0.0:\n  version \"1.1.0\"\n>>>>>>> feature\n";

    let result = parse(source).unwrap();

    assert_eq!(result.result_type, ParseResultType::Conflict);
    assert_eq!(result.object, LockObject::new());
}
