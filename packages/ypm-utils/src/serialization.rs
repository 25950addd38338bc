use std::fmt;

use thiserror::Error;

use crate::DataType;

#[cfg(test)]
#[path = "./serialization.test.rs"]
mod serialization_tests;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Parses a value as it appears in yarn.lock, `.yarnrc.yml`, or a `YARN_*`
/// environment variable.
pub trait FromFileString: Sized {
    type Error;

    fn from_file_string(s: &str) -> Result<Self, Self::Error>;
}

/// The uncolored form a value is persisted with.
pub trait ToFileString {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result;

    fn to_file_string(&self) -> String {
        FileStringDisplay(self).to_string()
    }
}

/// Adapts a [`ToFileString`] value to `Display`.
pub struct FileStringDisplay<'a, T: ?Sized>(pub &'a T);

impl<T: ToFileString + ?Sized> fmt::Display for FileStringDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_file_string(f)
    }
}

pub trait ToHumanString {
    fn to_print_string(&self) -> String;
}

macro_rules! impl_scalar {
    ($type:ty, $data_type:expr, $parse:expr) => {
        impl FromFileString for $type {
            type Error = SerializationError;

            fn from_file_string(s: &str) -> Result<Self, Self::Error> {
                let parse: fn(&str) -> Option<$type> = $parse;

                parse(s)
                    .ok_or_else(|| SerializationError::InvalidValue(s.to_string()))
            }
        }

        impl ToFileString for $type {
            fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
                write!(out, "{}", self)
            }
        }

        impl ToHumanString for $type {
            fn to_print_string(&self) -> String {
                $data_type.colorize(&self.to_file_string())
            }
        }
    };
}

// Environment flags accept the numeric spelling too (`YARN_FLAT=1`).
impl_scalar!(bool, DataType::Boolean, |s| match s {
    "true" | "1" => Some(true),
    "false" | "0" => Some(false),
    _ => None,
});

impl_scalar!(usize, DataType::Number, |s| s.parse().ok());
impl_scalar!(String, DataType::String, |s| Some(s.to_string()));

/// Empty strings and the literal `null` both mean "unset".
impl<T: FromFileString> FromFileString for Option<T> {
    type Error = T::Error;

    fn from_file_string(s: &str) -> Result<Self, Self::Error> {
        match s {
            "" | "null" => Ok(None),
            s => T::from_file_string(s).map(Some),
        }
    }
}

impl<T: ToFileString> ToFileString for Option<T> {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            Some(value) => value.write_file_string(out),
            None => out.write_str("null"),
        }
    }
}

impl<T: ToHumanString> ToHumanString for Option<T> {
    fn to_print_string(&self) -> String {
        match self {
            Some(value) => value.to_print_string(),
            None => DataType::Null.colorize("null"),
        }
    }
}

/// Derives `FromStr`, `TryFrom<&str>`, `Display` and the serde traits of a
/// type from its [`FromFileString`] and [`ToFileString`] impls, so yarn.lock,
/// JSON manifests and log lines all agree on one textual form.
#[macro_export]
macro_rules! impl_serialization_traits(($type:ty) => {
    impl std::str::FromStr for $type {
        type Err = <$type as $crate::FromFileString>::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            <$type as $crate::FromFileString>::from_file_string(s)
        }
    }

    impl std::convert::TryFrom<&str> for $type {
        type Error = <$type as $crate::FromFileString>::Error;

        fn try_from(value: &str) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    impl std::fmt::Display for $type {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            $crate::ToFileString::write_file_string(self, f)
        }
    }

    impl serde::Serialize for $type {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(&$crate::FileStringDisplay(self))
        }
    }

    impl<'de> serde::Deserialize<'de> for $type {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw
                = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;

            <$type as $crate::FromFileString>::from_file_string(&raw)
                .map_err(serde::de::Error::custom)
        }
    }
});
