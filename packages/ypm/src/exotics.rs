use std::sync::LazyLock;

use regex::Regex;
use url::Url;

#[cfg(test)]
#[path = "./exotics.test.rs"]
mod exotics_tests;

/// Range kinds that aren't resolved through the registry. The core only
/// needs to know that a range is exotic (so that it's compared as an
/// opaque identity); the fetch layer uses the kind to pick a strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExoticKind {
    Git,
    Tarball,
    Hosted,
    File,
    Link,
    Alias,
}

static GIT_PATTERN_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^git:", r"^git\+.+:", r"^ssh:", r"^https?:.+\.git$", r"^https?:.+\.git#.+"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Expected the git matchers to be valid regexes"))
        .collect()
});

static GITHUB_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:@%/\s.-][^:@%/\s]*/[^:@\s/%]+(?:#.*)?$")
        .expect("Expected the shorthand matcher to be a valid regex")
});

const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.com", "bitbucket.org"];

const HOSTED_PROTOCOLS: &[&str] = &["github:", "gitlab:", "bitbucket:", "gist:"];

fn is_git(range: &str) -> bool {
    if GIT_PATTERN_MATCHERS.iter().any(|matcher| matcher.is_match(range)) {
        return true;
    }

    let Ok(url) = Url::parse(range) else {
        return false;
    };

    match url.host_str() {
        Some(host) if GIT_HOSTS.contains(&host) => {
            // Only repositories, not files hosted inside them
            url.path().split('/').filter(|segment| !segment.is_empty()).count() == 2
        }

        _ => false,
    }
}

fn is_tarball(range: &str) -> bool {
    if range.starts_with("http://") || range.starts_with("https://") {
        return true;
    }

    !range.contains('@') && (range.ends_with(".tgz") || range.ends_with(".tar.gz"))
}

fn is_hosted(range: &str) -> bool {
    HOSTED_PROTOCOLS.iter().any(|protocol| range.starts_with(protocol))
        || GITHUB_SHORTHAND.is_match(range)
}

fn is_file(range: &str) -> bool {
    range.starts_with("file:")
        || range.starts_with("./")
        || range.starts_with("../")
        || std::path::Path::new(range).is_absolute()
}

/// Classifies a range; returns `None` for anything the registry resolver
/// handles (semver ranges and dist-tags).
pub fn exotic_kind(range: &str) -> Option<ExoticKind> {
    if is_git(range) {
        Some(ExoticKind::Git)
    } else if is_tarball(range) {
        Some(ExoticKind::Tarball)
    } else if is_file(range) {
        Some(ExoticKind::File)
    } else if range.starts_with("link:") {
        Some(ExoticKind::Link)
    } else if range.starts_with("npm:") {
        Some(ExoticKind::Alias)
    } else if is_hosted(range) {
        Some(ExoticKind::Hosted)
    } else {
        None
    }
}

pub fn is_exotic(range: &str) -> bool {
    exotic_kind(range).is_some()
}
