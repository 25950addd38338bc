use std::fmt;

use ypm_utils::{impl_serialization_traits, FromFileString, ToFileString, ToHumanString, DataType};

use crate::{extract::extract_version, Error, MAX_LENGTH};

#[cfg(test)]
#[path = "./version.test.rs"]
mod version_tests;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionRc {
    Number(u32),
    String(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub rc: Option<Vec<VersionRc>>,
}

impl Version {
    pub fn new() -> Version {
        Version::default()
    }

    pub fn new_from_components(major: u32, minor: u32, patch: u32, rc: Option<Vec<VersionRc>>) -> Version {
        Version {
            major,
            minor,
            patch,
            rc,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        self.rc.is_some()
    }

    pub fn same_tuple(&self, other: &Version) -> bool {
        (self.major, self.minor, self.patch) == (other.major, other.minor, other.patch)
    }

    pub fn without_rc(&self) -> Version {
        Version::new_from_components(self.major, self.minor, self.patch, None)
    }

    pub fn next_major(&self) -> Version {
        Version::new_from_components(self.major + 1, 0, 0, None)
    }

    pub fn next_major_rc(&self) -> Version {
        Version::new_from_components(self.major + 1, 0, 0, Some(vec![VersionRc::Number(0)]))
    }

    pub fn next_minor(&self) -> Version {
        Version::new_from_components(self.major, self.minor + 1, 0, None)
    }

    pub fn next_minor_rc(&self) -> Version {
        Version::new_from_components(self.major, self.minor + 1, 0, Some(vec![VersionRc::Number(0)]))
    }

    pub fn next_patch(&self) -> Version {
        Version::new_from_components(self.major, self.minor, self.patch + 1, None)
    }

    pub fn next_patch_rc(&self) -> Version {
        Version::new_from_components(self.major, self.minor, self.patch + 1, Some(vec![VersionRc::Number(0)]))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major, self.minor, self.patch, self.rc.is_none(), &self.rc)
            .cmp(&(other.major, other.minor, other.patch, other.rc.is_none(), &other.rc))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromFileString for Version {
    type Error = Error;

    fn from_file_string(src: &str) -> Result<Self, Error> {
        let trimmed
            = src.trim();

        if trimmed.len() > MAX_LENGTH {
            return Err(Error::InvalidVersion(src.to_string()));
        }

        let mut iter = trimmed.strip_prefix('=')
            .unwrap_or(trimmed)
            .chars()
            .peekable();

        let (version, missing) = extract_version(&mut iter)
            .ok_or_else(|| Error::InvalidVersion(src.to_string()))?;

        if missing != 0 || iter.peek().is_some() {
            return Err(Error::InvalidVersion(src.to_string()))
        }

        Ok(version)
    }
}

impl ToFileString for Version {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if let Some(rc) = &self.rc {
            for (index, segment) in rc.iter().enumerate() {
                out.write_char(if index == 0 { '-' } else { '.' })?;

                match segment {
                    VersionRc::Number(n) => write!(out, "{}", n)?,
                    VersionRc::String(s) => out.write_str(s)?,
                }
            }
        }

        Ok(())
    }
}

impl ToHumanString for Version {
    fn to_print_string(&self) -> String {
        DataType::Version.colorize(&self.to_file_string())
    }
}

impl_serialization_traits!(Version);
