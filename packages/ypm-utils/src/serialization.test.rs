use rstest::rstest;

use crate::{FromFileString, SerializationError, ToFileString};

#[rstest]
#[case("true", Ok(true))]
#[case("1", Ok(true))]
#[case("false", Ok(false))]
#[case("0", Ok(false))]
#[case("yes", Err(SerializationError::InvalidValue("yes".to_string())))]
fn test_bool_from_file_string(#[case] input: &str, #[case] expected: Result<bool, SerializationError>) {
    assert_eq!(bool::from_file_string(input), expected);
}

#[rstest]
#[case("", None)]
#[case("null", None)]
#[case("12", Some(12))]
fn test_optional_usize(#[case] input: &str, #[case] expected: Option<usize>) {
    assert_eq!(Option::<usize>::from_file_string(input).unwrap(), expected);
}

#[test]
fn test_option_to_file_string() {
    assert_eq!(Some(true).to_file_string(), "true");
    assert_eq!(None::<bool>.to_file_string(), "null");
}

#[rstest]
#[case("8", Ok(8))]
#[case("-1", Err(SerializationError::InvalidValue("-1".to_string())))]
#[case("eight", Err(SerializationError::InvalidValue("eight".to_string())))]
fn test_usize_from_file_string(#[case] input: &str, #[case] expected: Result<usize, SerializationError>) {
    assert_eq!(usize::from_file_string(input), expected);
}
