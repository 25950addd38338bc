use rstest::rstest;
use ypm_utils::FromFileString;

use crate::{range::{OperatorType, Token, TokenType}, Range, Version};

#[rstest]
#[case("1.2.3", "1.2.3", true)]

#[case("^1.2.3", "1.2.0", false)]
#[case("^1.2.3", "1.2.3", true)]
#[case("^1.2.3", "1.2.10", true)]
#[case("^1.2.3", "1.10.0", true)]
#[case("^1.2.3", "1.10.0-rc", false)]
#[case("^1.2.3", "2.0.0-rc", false)]
#[case("^1.2.3", "2.0.0-0", false)]
#[case("^1.2.3", "2.0.0", false)]
#[case("^1.2.3-rc.1", "1.2.3-rc.15", true)]
#[case("^1.2.3-rc.1", "1.3.0-rc.15", false)]
#[case("^1.2.3-rc.1", "2.0.0-rc.15", false)]

#[case("~1.2.3", "1.2.0", false)]
#[case("~1.2.3", "1.2.3", true)]
#[case("~1.2.3", "1.2.10", true)]
#[case("~1.2.3", "1.2.10-rc", false)]
#[case("~1.2.3", "1.10.0", false)]
#[case("~1.2.3", "2.0.0", false)]

#[case(">1.2.3", "1.2.3", false)]
#[case(">1.2.3", "1.2.10", true)]
#[case(">1.2", "1.2.10", false)]
#[case(">1.2", "1.3.0", true)]

#[case("^0.7.0", "0.7.45", true)]
#[case("^0.7.0", "0.8.0", false)]
#[case("^0.0.3", "0.0.3", true)]
#[case("^0.0.3", "0.0.4", false)]
#[case("^1.2", "1.9.0", true)]
#[case("^0", "0.9.0", true)]
#[case("^0", "1.0.0", false)]

#[case(">=1.2.3", "1.2.0", false)]
#[case(">=1.2.3", "2.0.0", true)]
#[case("<1.2.3", "1.2.0", true)]
#[case("<1.2.3", "1.2.3", false)]
#[case("<=1.2.3", "1.2.3", true)]
#[case("<=1.2", "1.2.9", true)]
#[case("<=1.2", "1.3.0", false)]

#[case(">=1.2.3 <1.10.3", "1.2.0", false)]
#[case(">=1.2.3 <1.10.3", "1.10.0", true)]
#[case(">=1.2.3 <1.10.3", "1.10.3", false)]
#[case(">= 1.2.3 < 1.10.3", "1.5.0", true)]

#[case("1.2.3 || 1.2.10", "1.2.0", false)]
#[case("1.2.3 || 1.2.10", "1.2.10", true)]
#[case("^1.0.0 || ^2.0.0", "2.4.0", true)]
#[case("(^1.5 || ^1.2 || ^1.3) && <1.4", "1.3.9", true)]
#[case("(^1.5 || ^1.2 || ^1.3) && <1.4", "1.5.0", false)]

#[case("1.2.3 - 2.3.4", "2.3.4", true)]
#[case("1.2.3 - 2.3.4", "2.3.5", false)]
#[case("1.2.3 - 2", "2.9.0", true)]

#[case("*", "1.2.0", true)]
#[case("*", "1.2.0-rc.1", false)]
#[case("", "1.2.0", true)]
#[case("x", "1.2.0", true)]
#[case("1.x", "1.2.0", true)]
#[case("1.x", "2.0.0", false)]
#[case("1.2.*", "1.2.9", true)]
#[case("1.2.X", "1.3.0", false)]
#[case("~1", "1.9.0", true)]
fn test_range_check(#[case] range: Range, #[case] version: Version, #[case] expected: bool) {
    assert_eq!(range.check(&version), expected);
}

#[rstest]
#[case("^1.2.3", "1.10.0-rc", true)]
#[case("^1.2.3", "2.0.0-rc", false)]
#[case("~1.2.3", "1.2.10-rc", true)]
#[case("~1.2.3", "1.3.0-rc", false)]
#[case("^0.0.3", "0.0.4-rc", false)]
fn test_range_check_ignore_rc(#[case] range: Range, #[case] version: Version, #[case] expected: bool) {
    assert_eq!(range.check_ignore_rc(version), expected);
}

#[rstest]
#[case("latest")]
#[case("next")]
#[case("git+https://github.com/foo/bar.git")]
#[case("file:../foo")]
#[case("1.2.3 ||")]
#[case("(1.2.3")]
#[case("1.2.3)")]
#[case("|| 1.2.3")]
fn test_range_invalid(#[case] input: &str) {
    assert!(Range::from_file_string(input).is_err());
}

#[test]
fn test_range_max_satisfying() {
    let versions: Vec<Version> = ["1.0.0", "1.4.2", "2.0.0", "1.5.0-rc.1"]
        .iter()
        .map(|v| Version::from_file_string(v).unwrap())
        .collect();

    let range = Range::from_file_string("^1.0.0").unwrap();
    assert_eq!(range.max_satisfying(&versions), Some(&versions[1]));

    let range = Range::from_file_string("^3.0.0").unwrap();
    assert_eq!(range.max_satisfying(&versions), None);
}

#[test]
fn test_range_tokenize() {
    let v = |s: &str| Version::from_file_string(s).unwrap();

    assert_eq!(Range::tokenize("  1.2.3  "), Some(vec![
        Token::Operation(OperatorType::Equal, v("1.2.3")),
    ]));

    assert_eq!(Range::tokenize("1.2.3 2.3.4"), Some(vec![
        Token::Operation(OperatorType::Equal, v("1.2.3")),
        Token::Syntax(TokenType::SAnd),
        Token::Operation(OperatorType::Equal, v("2.3.4")),
    ]));

    assert_eq!(Range::tokenize("1.2.3 - 2.3.4"), Some(vec![
        Token::Operation(OperatorType::GreaterThanOrEqual, v("1.2.3")),
        Token::Syntax(TokenType::SAnd),
        Token::Operation(OperatorType::LessThanOrEqual, v("2.3.4")),
    ]));

    assert_eq!(Range::tokenize("1.2"), Some(vec![
        Token::Operation(OperatorType::GreaterThanOrEqual, v("1.2.0")),
        Token::Syntax(TokenType::SAnd),
        Token::Operation(OperatorType::LessThan, v("1.3.0-0")),
    ]));

    assert_eq!(Range::tokenize("^1.2.3"), Some(vec![
        Token::Operation(OperatorType::GreaterThanOrEqual, v("1.2.3")),
        Token::Syntax(TokenType::SAnd),
        Token::Operation(OperatorType::LessThan, v("2.0.0-0")),
    ]));

    assert_eq!(Range::tokenize("(1.2.3)"), Some(vec![
        Token::Syntax(TokenType::LParen),
        Token::Operation(OperatorType::Equal, v("1.2.3")),
        Token::Syntax(TokenType::RParen),
    ]));
}

#[test]
fn test_satisfies_helper() {
    assert!(crate::satisfies("1.3.0", "1.3.0"));
    assert!(!crate::satisfies("1.3.0", "^1.4.0"));
    assert!(!crate::satisfies("not-a-version", "*"));
    assert!(!crate::satisfies("1.0.0", "github:foo/bar"));
}
