use std::sync::LazyLock;

use globset::{GlobBuilder, GlobMatcher};
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    error::Error,
    exotics::is_exotic,
    fetcher::DependencyRequest,
    lockfile::LockedPackage,
    manifest::PackageRemote,
    pattern::{normalize_pattern, Pattern},
    report::Report,
};

#[cfg(test)]
#[path = "./resolution_map.test.rs"]
mod resolution_map_tests;

const DIRECTORY_SEPARATOR: &str = "/";
const GLOBAL_NESTED_DEP_PATTERN: &str = "**/";

static INVALID_PACKAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/$|/{2,}|\*+$").unwrap()
});

static PACKAGE_PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(@[^/]+/)?([^/]+)").unwrap()
});

/// A path may not end with a slash or a wildcard, and may not contain
/// empty segments.
pub fn is_valid_package_path(path: &str) -> bool {
    !INVALID_PACKAGE_PATH.is_match(path)
}

/// Splits a `parent/@scope/child/name` path into its package names.
pub fn parse_package_path(path: &str) -> Vec<String> {
    PACKAGE_PATH_SEGMENT.find_iter(path)
        .map(|segment| segment.as_str().to_string())
        .collect()
}

#[derive(Clone, Debug)]
pub struct ResolutionEntry {
    pub name: String,
    pub range: String,
    pub glob_pattern: String,
    pub pattern: Pattern,
    matcher: GlobMatcher,
}

/// The `resolutions` field of the root manifest: ancestry globs pinning a
/// package to a given range.
#[derive(Clone, Debug, Default)]
pub struct ResolutionMap {
    pub resolutions_by_package: IndexMap<String, Vec<ResolutionEntry>>,
    delay_queue: Vec<DependencyRequest>,
}

impl ResolutionMap {
    pub fn new() -> ResolutionMap {
        ResolutionMap::default()
    }

    pub fn init(&mut self, resolutions: &IndexMap<String, String>, report: &Report) -> Result<(), Error> {
        for (glob_pattern, range) in resolutions {
            if let Some(entry) = ResolutionMap::parse_pattern_info(glob_pattern, range, report)? {
                self.resolutions_by_package.entry(entry.name.clone())
                    .or_default()
                    .push(entry);
            }
        }

        Ok(())
    }

    /// Validates a single `resolutions` entry. Invalid entries are reported
    /// and skipped rather than failing the install.
    pub fn parse_pattern_info(glob_pattern: &str, range: &str, report: &Report) -> Result<Option<ResolutionEntry>, Error> {
        if !is_valid_package_path(glob_pattern) {
            report.warn(format!("Resolution field \"{}\" does not end with a valid package name and will be ignored", glob_pattern));
            return Ok(None);
        }

        let Some(name) = parse_package_path(glob_pattern).pop() else {
            report.warn(format!("Resolution field \"{}\" does not end with a valid package name and will be ignored", glob_pattern));
            return Ok(None);
        };

        if !ypm_semver::is_valid_range(range) && !is_exotic(range) {
            report.warn(format!("Resolution field \"{}\" has an invalid version entry and may be ignored", range));
            return Ok(None);
        }

        // A bare package name applies at every depth
        let glob_pattern = match name == glob_pattern {
            true => format!("{}{}", GLOBAL_NESTED_DEP_PATTERN, name),
            false => glob_pattern.to_string(),
        };

        let matcher = GlobBuilder::new(&glob_pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();

        Ok(Some(ResolutionEntry {
            pattern: Pattern::from_parts(&name, range),
            name,
            range: range.to_string(),
            glob_pattern,
            matcher,
        }))
    }

    /// Returns the pattern forced for the given request, if any. The first
    /// matching entry wins.
    pub fn find(&self, pattern: &Pattern, parent_names: &[String], report: &Report) -> Option<Pattern> {
        let normalized
            = normalize_pattern(pattern.as_str());

        let resolutions
            = self.resolutions_by_package.get(&normalized.name)?;

        let module_path = parent_names.iter()
            .map(String::as_str)
            .chain(std::iter::once(normalized.name.as_str()))
            .collect::<Vec<_>>()
            .join(DIRECTORY_SEPARATOR);

        let entry = resolutions.iter()
            .find(|entry| entry.matcher.is_match(&module_path))?;

        if ypm_semver::is_valid_range(&normalized.range) && ypm_semver::is_valid_version(&entry.range) && !ypm_semver::satisfies(&entry.range, &normalized.range) {
            report.warn(format!("Resolution field \"{}\" is incompatible with requested version \"{}\"", entry.pattern, pattern));
        }

        Some(entry.pattern.clone())
    }

    pub fn add_to_delay_queue(&mut self, request: DependencyRequest) {
        if !self.delay_queue.contains(&request) {
            self.delay_queue.push(request);
        }
    }

    pub fn take_delay_queue(&mut self) -> Vec<DependencyRequest> {
        std::mem::take(&mut self.delay_queue)
    }

    /// Every pattern forced by the map, in declaration order.
    pub fn patterns(&self) -> impl Iterator<Item = (&String, &Pattern)> {
        self.resolutions_by_package.iter()
            .flat_map(|(name, entries)| entries.iter().map(move |entry| (name, &entry.pattern)))
    }
}

/// A locked entry must be dropped once a resolution points the pattern to
/// a different artifact.
pub fn should_update_lockfile(lockfile_entry: Option<&LockedPackage>, resolution_remote: Option<&PackageRemote>) -> bool {
    let (Some(lockfile_entry), Some(resolution_remote)) = (lockfile_entry, resolution_remote) else {
        return false;
    };

    lockfile_entry.resolved != resolution_remote.resolved
}
