use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};
use ypm_utils::{DataType, ToHumanString};

use crate::exotics::{exotic_kind, ExoticKind};

#[cfg(test)]
#[path = "./pattern.test.rs"]
mod pattern_tests;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedPattern {
    pub name: String,
    pub range: String,
    pub has_version: bool,
}

/// Splits a `name@range` dependency string. A leading `@` is an npm scope
/// and belongs to the name; a missing range means `latest`.
pub fn normalize_pattern(pattern: &str) -> NormalizedPattern {
    let (scope, rest) = match pattern.strip_prefix('@') {
        Some(rest) => ("@", rest),
        None => ("", pattern),
    };

    match rest.split_once('@') {
        Some((name, range)) => {
            NormalizedPattern {
                name: format!("{}{}", scope, name),
                range: if range.is_empty() { "*".to_string() } else { range.to_string() },
                has_version: !range.is_empty(),
            }
        }

        None => {
            NormalizedPattern {
                name: format!("{}{}", scope, rest),
                range: "latest".to_string(),
                has_version: false,
            }
        }
    }
}

/// A `name@range` dependency specifier, the key used everywhere during
/// resolution.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(String);

impl Pattern {
    pub fn new<S: Into<String>>(pattern: S) -> Pattern {
        Pattern(pattern.into())
    }

    pub fn from_parts(name: &str, range: &str) -> Pattern {
        Pattern(format!("{}@{}", name, range))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalize(&self) -> NormalizedPattern {
        normalize_pattern(&self.0)
    }

    pub fn name(&self) -> String {
        self.normalize().name
    }

    pub fn range(&self) -> String {
        self.normalize().range
    }

    pub fn exotic_kind(&self) -> Option<ExoticKind> {
        exotic_kind(&self.range())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Pattern {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::new(value)
    }
}

impl ToHumanString for Pattern {
    fn to_print_string(&self) -> String {
        DataType::Pattern.colorize(&self.0)
    }
}
