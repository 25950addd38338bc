use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    fetcher::{DependencyHint, DependencyRequest},
    lockfile::LockedPackage,
    manifest::{Manifest, PackageRemote, RegistryName},
    pattern::Pattern,
};

/// Per-resolution state shared by every pattern resolving to the same
/// package. Attaching and detaching patterns goes through the resolver,
/// which owns the pattern index.
#[derive(Clone, Debug, PartialEq)]
pub struct PackageReference {
    pub name: String,
    pub version: String,
    pub uid: String,
    pub remote: PackageRemote,
    pub registry: RegistryName,
    pub hint: Option<DependencyHint>,
    pub dependencies: Vec<Pattern>,
    pub permissions: BTreeMap<String, bool>,
    pub patterns: Vec<Pattern>,
    pub optional: Option<bool>,
    pub level: usize,
    pub ignore: bool,
    pub incompatible: bool,
    pub fresh: bool,
    pub locations: Vec<PathBuf>,
}

impl PackageReference {
    pub fn new(request: &DependencyRequest, manifest: &Manifest, remote: PackageRemote) -> PackageReference {
        PackageReference {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            uid: manifest.uid.clone(),
            registry: remote.registry,
            remote,
            hint: request.hint,
            dependencies: vec![],
            permissions: BTreeMap::new(),
            patterns: vec![],
            optional: None,
            level: request.parent_names.len(),
            ignore: false,
            incompatible: false,
            fresh: false,
            locations: vec![],
        }
    }

    pub fn is_optional(&self) -> bool {
        self.optional == Some(true)
    }

    pub fn set_fresh(&mut self, fresh: bool) {
        self.fresh = fresh;
    }

    /// Records another request for this package; the level is the depth
    /// of the shallowest one.
    pub fn add_request(&mut self, request: &DependencyRequest) {
        self.level = self.level.min(request.parent_names.len());
    }

    pub fn add_location(&mut self, loc: PathBuf) {
        if !self.locations.contains(&loc) {
            self.locations.push(loc);
        }
    }

    pub fn add_dependencies<I: IntoIterator<Item = Pattern>>(&mut self, dependencies: I) {
        self.dependencies.extend(dependencies);
    }

    pub fn set_permission<K: Into<String>>(&mut self, key: K, value: bool) {
        self.permissions.insert(key.into(), value);
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.get(key).copied().unwrap_or(false)
    }

    pub(crate) fn push_pattern(&mut self, pattern: Pattern, locked: Option<&LockedPackage>) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }

        if let Some(locked) = locked {
            for (key, value) in &locked.permissions {
                self.set_permission(key.clone(), *value);
            }
        }
    }

    /// The first request decides; afterwards only a non-optional request
    /// can change the flag.
    pub fn add_optional(&mut self, optional: bool) {
        match self.optional {
            None => self.optional = Some(optional),
            Some(_) if !optional => self.optional = Some(false),
            Some(_) => {},
        }
    }
}
