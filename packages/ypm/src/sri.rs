use std::{collections::BTreeSet, fmt};

use ypm_utils::{impl_serialization_traits, DataType, FromFileString, SerializationError, ToFileString, ToHumanString};

/// A subresource integrity value (`sha512-... sha1-...`).
///
/// Tokens are kept sorted so that two semantically equal values always
/// serialize to the same string, whatever order they were declared in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Integrity {
    tokens: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityEntry<'a> {
    pub algorithm: &'a str,
    pub digest: &'a str,
    pub options: Vec<&'a str>,
}

impl Integrity {
    pub fn entries(&self) -> impl Iterator<Item = IntegrityEntry<'_>> {
        self.tokens.iter().filter_map(|token| {
            let (algorithm, rest) = token.split_once('-')?;
            let mut segments = rest.split('?');

            Some(IntegrityEntry {
                algorithm,
                digest: segments.next()?,
                options: segments.collect(),
            })
        })
    }

    pub fn algorithms(&self) -> BTreeSet<&str> {
        self.entries().map(|entry| entry.algorithm).collect()
    }
}

impl FromFileString for Integrity {
    type Error = SerializationError;

    fn from_file_string(s: &str) -> Result<Self, Self::Error> {
        let tokens: BTreeSet<String> = s.split_whitespace()
            .filter(|token| token.split_once('-').is_some_and(|(algorithm, digest)| !algorithm.is_empty() && !digest.is_empty()))
            .map(|token| token.to_string())
            .collect();

        if tokens.is_empty() {
            return Err(SerializationError::InvalidValue(s.to_string()));
        }

        Ok(Integrity {tokens})
    }
}

impl ToFileString for Integrity {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (index, token) in self.tokens.iter().enumerate() {
            if index > 0 {
                out.write_char(' ')?;
            }

            out.write_str(token)?;
        }

        Ok(())
    }
}

impl ToHumanString for Integrity {
    fn to_print_string(&self) -> String {
        DataType::Integrity.colorize(&self.to_file_string())
    }
}

impl_serialization_traits!(Integrity);

#[cfg(test)]
mod tests {
    use ypm_utils::{FromFileString, ToFileString};

    use super::Integrity;

    #[test]
    fn it_sorts_tokens() {
        let a = Integrity::from_file_string("sha512-abc sha1-def").unwrap();
        let b = Integrity::from_file_string("sha1-def   sha512-abc").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.to_file_string(), "sha1-def sha512-abc");
    }

    #[test]
    fn it_parses_options() {
        let integrity = Integrity::from_file_string("sha512-abc?foo?bar").unwrap();
        let entry = integrity.entries().next().unwrap();

        assert_eq!(entry.algorithm, "sha512");
        assert_eq!(entry.digest, "abc");
        assert_eq!(entry.options, vec!["foo", "bar"]);
    }

    #[test]
    fn it_rejects_garbage() {
        assert!(Integrity::from_file_string("").is_err());
        assert!(Integrity::from_file_string("nodash").is_err());
    }
}
