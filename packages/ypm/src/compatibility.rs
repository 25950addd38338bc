use indexmap::IndexMap;
use ypm_semver::{Range, Version};
use ypm_utils::FromFileString;

use crate::{
    config::Config,
    error::Error,
    manifest::Manifest,
    report::Report,
    resolver::PackageResolver,
};

#[cfg(test)]
#[path = "./compatibility.test.rs"]
mod compatibility_tests;

const ENGINE_ALIASES: &[(&str, &str)] = &[
    ("iojs", "node"),
];

/// Engines that used to be listed by some packages but that we never
/// enforce (nor warn about).
const IGNORED_ENGINES: &[&str] = &[
    "rhino",
    "cordovaDependencies",
    "npm",
    "teleport",
];

/// Allow lists accept an item if listed; deny lists (`!item`) accept
/// anything that isn't explicitly excluded.
pub fn is_valid(items: &[String], actual: &str) -> bool {
    let mut is_not_allowlisted = true;
    let mut is_denylisted = false;

    for item in items {
        if item == actual {
            return true;
        }

        if let Some(denied) = item.strip_prefix('!') {
            if denied == actual {
                return false;
            }

            is_denylisted = true;
        } else {
            is_not_allowlisted = false;
        }
    }

    is_denylisted && is_not_allowlisted
}

pub fn test_engine(name: &str, range: &str, versions: &IndexMap<String, String>) -> bool {
    let Some(actual) = versions.get(name) else {
        return false;
    };

    let Ok(actual) = Version::from_file_string(actual) else {
        return false;
    };

    let Ok(range) = Range::from_file_string(range) else {
        return false;
    };

    if range.check(&actual) {
        return true;
    }

    if name == "yarn" && range.check_ignore_rc(&actual) {
        return true;
    }

    // Some packages still declare node ranges such as ^0.12.0, written
    // before node reached 1.0.0; those get matched against 0.1x.<major>
    if name == "node" && actual > Version::new_from_components(1, 0, 0, None) {
        return (10..=13).any(|minor| {
            range.check(Version::new_from_components(0, minor, actual.major, None))
        });
    }

    false
}

fn should_check_platform(manifest: &Manifest, config: &Config) -> bool {
    !config.ignore_platform && !manifest.os.is_empty()
}

fn should_check_cpu(manifest: &Manifest, config: &Config) -> bool {
    !config.ignore_platform && !manifest.cpu.is_empty()
}

fn should_check_engines(manifest: &Manifest, config: &Config) -> bool {
    !config.ignore_engines && !manifest.engines.is_empty()
}

/// Whether the manifest declares any requirement the current settings
/// would enforce.
pub fn should_check(manifest: &Manifest, config: &Config) -> bool {
    should_check_platform(manifest, config)
        || should_check_cpu(manifest, config)
        || should_check_engines(manifest, config)
}

pub struct PackageCompatibility<'a> {
    config: &'a Config,
    report: &'a Report,
    versions: IndexMap<String, String>,
}

impl<'a> PackageCompatibility<'a> {
    pub fn new(config: &'a Config, report: &'a Report) -> PackageCompatibility<'a> {
        let versions = IndexMap::from([
            ("node".to_string(), config.system.node_version.clone()),
            ("yarn".to_string(), config.system.yarn_version.clone()),
        ]);

        PackageCompatibility {
            config,
            report,
            versions,
        }
    }

    /// Returns the reasons why the package can't be installed on this
    /// system. Unknown engines are only warned about.
    pub fn incompatibilities(&self, manifest: &Manifest) -> Vec<String> {
        let human
            = manifest.human();

        let mut reasons
            = vec![];

        if should_check_platform(manifest, self.config) && !is_valid(&manifest.os, &self.config.system.platform) {
            reasons.push(format!("The platform \"{}\" is incompatible with this module.", self.config.system.platform));
        }

        if should_check_cpu(manifest, self.config) && !is_valid(&manifest.cpu, &self.config.system.arch) {
            reasons.push(format!("The CPU architecture \"{}\" is incompatible with this module.", self.config.system.arch));
        }

        if should_check_engines(manifest, self.config) {
            for (name, range) in &manifest.engines {
                let name = ENGINE_ALIASES.iter()
                    .find(|(alias, _)| *alias == name.as_str())
                    .map_or(name.as_str(), |(_, target)| *target);

                match self.versions.get(name) {
                    Some(actual) => {
                        if !test_engine(name, range, &self.versions) {
                            reasons.push(format!("The engine \"{}\" is incompatible with this module. Expected version \"{}\". Got \"{}\"", name, range, actual));
                        }
                    },

                    None if !IGNORED_ENGINES.contains(&name) => {
                        self.report.warn(format!("{}: The engine \"{}\" appears to be invalid.", human, name));
                    },

                    None => {},
                }
            }
        }

        reasons
    }

    /// Checks a single manifest that isn't part of the resolved graph
    /// (typically the project itself).
    pub fn check_one(&self, manifest: &Manifest) -> Result<(), Error> {
        let reasons
            = self.incompatibilities(manifest);

        if reasons.is_empty() {
            return Ok(());
        }

        Err(self.fail(manifest, reasons))
    }

    fn fail(&self, manifest: &Manifest, reasons: Vec<String>) -> Error {
        let human
            = manifest.human();

        let messages = reasons.into_iter()
            .map(|reason| format!("{}: {}", human, reason))
            .collect::<Vec<_>>();

        for message in &messages {
            self.report.error(message.clone());
        }

        Error::IncompatiblePackages(messages)
    }

    /// Checks every resolved package. Incompatible optional packages are
    /// excluded from the install; the first incompatible required package
    /// aborts it.
    pub fn init(&self, resolver: &mut PackageResolver<'_>) -> Result<(), Error> {
        for id in resolver.get_manifests() {
            let reasons
                = self.incompatibilities(&resolver.package(id).manifest);

            if reasons.is_empty() {
                continue;
            }

            let package
                = resolver.package_mut(id);

            if !package.reference.is_optional() {
                return Err(self.fail(&package.manifest, reasons));
            }

            log::debug!("Excluding {}: {}", package.manifest.human(), reasons.join(", "));

            package.reference.ignore = true;
            package.reference.incompatible = true;

            self.report.info(format!("\"{}\" is an optional dependency and failed compatibility check. Excluding it from installation.", package.manifest.human()));
        }

        Ok(())
    }
}
