use crate::error::Error;

#[test]
fn it_names_the_package_and_the_reason_when_a_fetch_fails() {
    let message
        = Error::FetchError("left-pad@^1.0.0".to_string(), "the package has no remote".to_string()).to_string();

    assert!(message.starts_with("Failed to fetch "));
    assert!(message.contains("left-pad@^1.0.0"));
    assert!(message.ends_with(": the package has no remote"));
}

#[test]
fn it_converts_glob_errors() {
    let error: Error
        = globset::Glob::new("a[").unwrap_err().into();

    assert!(matches!(error, Error::GlobError(_)));
}
