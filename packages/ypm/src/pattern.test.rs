use rstest::rstest;

use crate::pattern::{normalize_pattern, NormalizedPattern, Pattern};

#[rstest]
#[case("lodash", "lodash", "latest", false)]
#[case("lodash@^4.0.0", "lodash", "^4.0.0", true)]
#[case("lodash@", "lodash", "*", false)]
#[case("@babel/core", "@babel/core", "latest", false)]
#[case("@babel/core@7.0.0", "@babel/core", "7.0.0", true)]
#[case("foo@npm:bar@1.0.0", "foo", "npm:bar@1.0.0", true)]
#[case("foo@git+ssh://git@github.com/a/b.git", "foo", "git+ssh://git@github.com/a/b.git", true)]
fn test_normalize_pattern(#[case] pattern: &str, #[case] name: &str, #[case] range: &str, #[case] has_version: bool) {
    assert_eq!(normalize_pattern(pattern), NormalizedPattern {
        name: name.to_string(),
        range: range.to_string(),
        has_version,
    });
}

#[test]
fn test_pattern_accessors() {
    let pattern = Pattern::from_parts("@scope/pkg", "^1.2.0");

    assert_eq!(pattern.as_str(), "@scope/pkg@^1.2.0");
    assert_eq!(pattern.name(), "@scope/pkg");
    assert_eq!(pattern.range(), "^1.2.0");
    assert!(pattern.exotic_kind().is_none());
}
