use std::{collections::BTreeMap, path::Path};

use ypm_utils::{FromFileString, ToFileString};

use crate::{
    config::LOCKFILE_FILENAME,
    error::Error,
    manifest::RegistryName,
    pattern::{normalize_pattern, Pattern},
    report::Report,
    sri::Integrity,
};

pub mod parse;
pub mod stringify;
pub mod value;

pub use parse::{ParseResult, ParseResultType};
pub use value::{LockObject, LockValue};

#[cfg(test)]
#[path = "./lockfile.test.rs"]
mod lockfile_tests;

/// A lockfile entry in its compact on-disk shape: every field equal to a
/// default that can be inferred from the pattern is left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockManifest {
    pub name: Option<String>,
    pub version: String,
    pub uid: Option<String>,
    pub resolved: Option<String>,
    pub integrity: Option<Integrity>,
    pub registry: Option<RegistryName>,
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub permissions: BTreeMap<String, bool>,
    pub prebuilt_variants: BTreeMap<String, String>,
}

/// A lockfile entry with every default filled in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    pub uid: String,
    pub resolved: Option<String>,
    pub integrity: Option<Integrity>,
    pub registry: RegistryName,
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub permissions: BTreeMap<String, bool>,
    pub prebuilt_variants: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockfileEntry {
    Alias(Pattern),
    Full(LockManifest),
}

/// What the resolver knows about a resolved pattern, as needed to write the
/// lockfile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockfileInput {
    pub package: LockedPackage,
    pub remote_key: Option<String>,
}

pub fn implode_entry(pattern: &str, package: &LockedPackage) -> LockManifest {
    let inferred_name
        = normalize_pattern(pattern).name;

    LockManifest {
        name: (inferred_name != package.name).then(|| package.name.clone()),
        version: package.version.clone(),
        uid: (package.uid != package.version).then(|| package.uid.clone()),
        resolved: package.resolved.clone(),
        integrity: package.integrity.clone(),
        registry: (package.registry != RegistryName::Npm).then_some(package.registry),
        dependencies: package.dependencies.clone(),
        optional_dependencies: package.optional_dependencies.clone(),
        permissions: package.permissions.clone(),
        prebuilt_variants: package.prebuilt_variants.clone(),
    }
}

pub fn explode_entry(pattern: &str, manifest: &LockManifest) -> LockedPackage {
    LockedPackage {
        name: manifest.name.clone()
            .unwrap_or_else(|| normalize_pattern(pattern).name),
        version: manifest.version.clone(),
        uid: manifest.uid.clone()
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| manifest.version.clone()),
        resolved: manifest.resolved.clone(),
        integrity: manifest.integrity.clone(),
        registry: manifest.registry.unwrap_or_default(),
        dependencies: manifest.dependencies.clone(),
        optional_dependencies: manifest.optional_dependencies.clone(),
        permissions: manifest.permissions.clone(),
        prebuilt_variants: manifest.prebuilt_variants.clone(),
    }
}

fn scalar_string(value: &LockValue) -> Option<String> {
    match value {
        LockValue::String(value) => Some(value.clone()),
        LockValue::Number(value) => Some(value.to_string()),
        LockValue::Boolean(value) => Some(value.to_string()),
        LockValue::Object(_) => None,
    }
}

fn string_map(object: Option<&LockObject>) -> BTreeMap<String, String> {
    object.into_iter()
        .flat_map(|object| object.entries())
        .filter_map(|(key, value)| Some((key.clone(), scalar_string(value)?)))
        .collect()
}

fn bool_map(object: Option<&LockObject>) -> BTreeMap<String, bool> {
    object.into_iter()
        .flat_map(|object| object.entries())
        .filter_map(|(key, value)| match value {
            LockValue::Boolean(value) => Some((key.clone(), *value)),
            LockValue::String(value) => bool::from_file_string(value).ok().map(|value| (key.clone(), value)),
            _ => None,
        })
        .collect()
}

fn string_object(map: &BTreeMap<String, String>) -> LockValue {
    let mut object = LockObject::new();

    for (key, value) in map {
        object.insert_one(key.clone(), LockValue::String(value.clone()));
    }

    LockValue::Object(object)
}

impl LockManifest {
    pub fn from_lock_object(object: &LockObject) -> LockManifest {
        let get_string = |key: &str| {
            object.get(key).and_then(scalar_string)
        };

        LockManifest {
            name: get_string("name"),
            version: get_string("version").unwrap_or_default(),
            uid: get_string("uid"),
            resolved: get_string("resolved"),
            integrity: get_string("integrity")
                .and_then(|integrity| Integrity::from_file_string(&integrity).ok()),
            registry: get_string("registry")
                .and_then(|registry| RegistryName::from_file_string(&registry).ok()),
            dependencies: string_map(object.get_object("dependencies")),
            optional_dependencies: string_map(object.get_object("optionalDependencies")),
            permissions: bool_map(object.get_object("permissions")),
            prebuilt_variants: string_map(object.get_object("prebuiltVariants")),
        }
    }

    pub fn to_lock_object(&self) -> LockObject {
        let mut object
            = LockObject::new();

        if let Some(name) = &self.name {
            object.insert_one("name", LockValue::String(name.clone()));
        }

        object.insert_one("version", LockValue::String(self.version.clone()));

        if let Some(uid) = &self.uid {
            object.insert_one("uid", LockValue::String(uid.clone()));
        }

        if let Some(resolved) = &self.resolved {
            object.insert_one("resolved", LockValue::String(resolved.clone()));
        }

        if let Some(integrity) = &self.integrity {
            object.insert_one("integrity", LockValue::String(integrity.to_file_string()));
        }

        if let Some(registry) = &self.registry {
            object.insert_one("registry", LockValue::String(registry.to_file_string()));
        }

        if !self.dependencies.is_empty() {
            object.insert_one("dependencies", string_object(&self.dependencies));
        }

        if !self.optional_dependencies.is_empty() {
            object.insert_one("optionalDependencies", string_object(&self.optional_dependencies));
        }

        if !self.permissions.is_empty() {
            let mut permissions = LockObject::new();
            for (key, value) in &self.permissions {
                permissions.insert_one(key.clone(), LockValue::Boolean(*value));
            }

            object.insert_one("permissions", LockValue::Object(permissions));
        }

        if !self.prebuilt_variants.is_empty() {
            object.insert_one("prebuiltVariants", string_object(&self.prebuilt_variants));
        }

        object
    }
}

/// A previously persisted resolution set, keyed by pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lockfile {
    pub cache: BTreeMap<Pattern, LockfileEntry>,
    pub source: String,
    pub parse_result_type: Option<ParseResultType>,
}

impl Lockfile {
    pub fn new() -> Lockfile {
        Lockfile::default()
    }

    pub fn from_entries(cache: BTreeMap<Pattern, LockfileEntry>) -> Lockfile {
        Lockfile {
            cache,
            ..Default::default()
        }
    }

    /// Converts a parsed lockfile document. Keys sharing a block become
    /// aliases of the first key of the block.
    pub fn from_object(object: &LockObject) -> Lockfile {
        let mut cache
            = BTreeMap::new();

        // Lockfiles written by the berry releases aren't compatible
        if object.get("__metadata").is_some() {
            return Lockfile::new();
        }

        for (keys, value) in &object.groups {
            let Some(first) = keys.first() else {
                continue;
            };

            match value {
                LockValue::Object(entry) => {
                    cache.insert(Pattern::new(first.clone()), LockfileEntry::Full(LockManifest::from_lock_object(entry)));

                    for key in keys.iter().skip(1) {
                        cache.insert(Pattern::new(key.clone()), LockfileEntry::Alias(Pattern::new(first.clone())));
                    }
                },

                LockValue::String(target) => {
                    for key in keys {
                        cache.insert(Pattern::new(key.clone()), LockfileEntry::Alias(Pattern::new(target.clone())));
                    }
                },

                _ => {},
            }
        }

        Lockfile {
            cache,
            ..Default::default()
        }
    }

    pub fn parse(source: &str) -> Result<Lockfile, Error> {
        let ParseResult {result_type, object}
            = parse::parse(source)?;

        Ok(Lockfile {
            source: source.to_string(),
            parse_result_type: Some(result_type),
            ..Lockfile::from_object(&object)
        })
    }

    /// Loads `yarn.lock` from the given folder. A missing file yields an
    /// empty lockfile.
    pub async fn from_directory(dir: &Path, report: &Report) -> Result<Lockfile, Error> {
        let lockfile_path
            = dir.join(LOCKFILE_FILENAME);

        let source = match tokio::fs::read_to_string(&lockfile_path).await {
            Ok(source) => source,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                report.info("No lockfile found.");
                return Ok(Lockfile::new());
            },
            Err(error) => {
                return Err(error.into());
            },
        };

        let lockfile
            = Lockfile::parse(&source)?;

        match lockfile.parse_result_type {
            Some(ParseResultType::Merge) => report.info(format!("Merge conflict detected in {} and successfully merged.", LOCKFILE_FILENAME)),
            Some(ParseResultType::Conflict) => report.warn(format!("A merge conflict was found in {} but it could not be successfully merged, regenerate it with an install", LOCKFILE_FILENAME)),
            _ => {},
        }

        Ok(lockfile)
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn resolve_entry(&self, pattern: &str) -> Option<(&Pattern, &LockManifest)> {
        let mut current
            = self.cache.get_key_value(pattern)?;

        // Guards against alias cycles in hand-edited files
        for _ in 0..=self.cache.len() {
            match current {
                (key, LockfileEntry::Full(manifest)) => return Some((key, manifest)),
                (_, LockfileEntry::Alias(target)) => current = self.cache.get_key_value(target.as_str())?,
            }
        }

        None
    }

    /// Returns the entry for a pattern, following aliases, with every
    /// inferable default filled back in.
    pub fn get_locked(&self, pattern: &str) -> Option<LockedPackage> {
        let (key, manifest)
            = self.resolve_entry(pattern)?;

        Some(explode_entry(key.as_str(), manifest))
    }

    pub fn remove_pattern(&mut self, pattern: &str) {
        self.cache.remove(pattern);
    }

    /// `pattern -> resolved url` for every entry, as recorded by the
    /// integrity file.
    pub fn resolved_entries(&self) -> BTreeMap<String, String> {
        self.cache.keys()
            .map(|pattern| {
                let resolved = self.resolve_entry(pattern.as_str())
                    .and_then(|(_, manifest)| manifest.resolved.clone())
                    .unwrap_or_default();

                (pattern.to_string(), resolved)
            })
            .collect()
    }

    /// Whether some registry entry was locked without an integrity hash.
    /// Local folders and remote tarballs never carry one.
    pub fn has_entries_without_integrity(&self) -> bool {
        self.cache.keys()
            .filter(|pattern| !pattern.as_str().contains("@file:") && !pattern.as_str().contains("@http"))
            .filter_map(|pattern| self.resolve_entry(pattern.as_str()))
            .any(|(_, manifest)| manifest.integrity.is_none())
    }

    /// Builds the compact lockfile entries for the given resolved patterns.
    ///
    /// Patterns are processed alphabetically; when two patterns share the
    /// same remote, the second one becomes an alias of the first.
    pub fn get_lockfile(patterns: &BTreeMap<Pattern, LockfileInput>) -> BTreeMap<Pattern, LockfileEntry> {
        let mut lockfile
            = BTreeMap::new();
        let mut seen: BTreeMap<String, Pattern>
            = BTreeMap::new();

        for (pattern, input) in patterns {
            let seen_pattern = input.remote_key.as_ref()
                .and_then(|remote_key| seen.get(remote_key));

            if let Some(seen_pattern) = seen_pattern {
                if let Some(LockfileEntry::Full(seen_manifest)) = lockfile.get_mut(seen_pattern) {
                    if seen_manifest.name.is_none() && pattern.name() != input.package.name {
                        seen_manifest.name = Some(input.package.name.clone());
                    }
                }

                lockfile.insert(pattern.clone(), LockfileEntry::Alias(seen_pattern.clone()));
                continue;
            }

            lockfile.insert(pattern.clone(), LockfileEntry::Full(implode_entry(pattern.as_str(), &input.package)));

            if let Some(remote_key) = &input.remote_key {
                seen.insert(remote_key.clone(), pattern.clone());
            }
        }

        lockfile
    }

    /// Converts the entries back into a document, grouping every alias with
    /// the block it points to.
    pub fn to_object(&self) -> LockObject {
        let mut aliases: BTreeMap<&Pattern, Vec<String>>
            = BTreeMap::new();

        for pattern in self.cache.keys() {
            if let Some((canonical, _)) = self.resolve_entry(pattern.as_str()) {
                aliases.entry(canonical)
                    .or_default()
                    .push(pattern.to_string());
            }
        }

        let mut object
            = LockObject::new();

        for (canonical, keys) in aliases {
            if let Some(LockfileEntry::Full(manifest)) = self.cache.get(canonical) {
                object.insert(keys, LockValue::Object(manifest.to_lock_object()));
            }
        }

        object
    }

    pub fn stringify(&self) -> String {
        stringify::stringify(&self.to_object(), false)
    }
}
