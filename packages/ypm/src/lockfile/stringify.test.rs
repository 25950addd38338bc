use pretty_assertions::assert_eq;
use rstest::rstest;

use super::{should_wrap_key, stringify};
use crate::lockfile::{parse::parse, LockObject, LockValue};

fn entry(fields: &[(&str, LockValue)]) -> LockValue {
    let mut object = LockObject::new();

    for (key, value) in fields {
        object.insert_one(*key, value.clone());
    }

    LockValue::Object(object)
}

fn string(value: &str) -> LockValue {
    LockValue::String(value.to_string())
}

#[rstest]
#[case("foo", false)]
#[case("foo@^1.0.0", false)]
#[case("@scope/foo", true)]
#[case("1.0.0", true)]
#[case("true-thing", true)]
#[case("falsey", true)]
#[case("has space", true)]
#[case("a,b", true)]
#[case("https://example.com/foo.tgz", true)]
#[case("resolved", false)]
fn it_quotes_ambiguous_keys(#[case] key: &str, #[case] expected: bool) {
    assert_eq!(should_wrap_key(key), expected);
}

#[test]
fn it_writes_the_expected_layout() {
    let mut object = LockObject::new();

    object.insert(vec!["b@^1.0.0".to_string(), "b@^1.1.0".to_string()], entry(&[
        ("dependencies", entry(&[("a", string("^2.0.0"))])),
        ("resolved", string("https://registry.yarnpkg.com/b/-/b-1.1.0.tgz")),
        ("version", string("1.1.0")),
    ]));

    object.insert_one("a@^2.0.0", entry(&[
        ("version", string("2.0.0")),
        ("optionalDependencies", entry(&[("fsevents", string("*"))])),
    ]));

    let expected = [
        "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.",
        "# yarn lockfile v1",
        "",
        "",
        "a@^2.0.0:",
        "  version \"2.0.0\"",
        "  optionalDependencies:",
        "    fsevents \"*\"",
        "",
        "b@^1.0.0, b@^1.1.0:",
        "  version \"1.1.0\"",
        "  resolved \"https://registry.yarnpkg.com/b/-/b-1.1.0.tgz\"",
        "  dependencies:",
        "    a \"^2.0.0\"",
        "",
    ].join("\n");

    assert_eq!(stringify(&object, false), expected);
}

#[test]
fn it_reads_back_what_it_writes() {
    let mut object = LockObject::new();

    object.insert(vec!["left-pad@^1.0.0".to_string(), "left-pad@~1.3.0".to_string()], entry(&[
        ("version", string("1.3.0")),
        ("permissions", entry(&[("postinstall", LockValue::Boolean(false))])),
    ]));

    let text = stringify(&object, false);
    let parsed = parse(&text).unwrap().object;

    assert_eq!(stringify(&parsed, false), text);
    assert_eq!(parsed.get_object("left-pad@~1.3.0").unwrap().get("permissions"), Some(&entry(&[("postinstall", LockValue::Boolean(false))])));
}
