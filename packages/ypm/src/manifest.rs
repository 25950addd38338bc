use std::{collections::BTreeMap, fmt, path::PathBuf, sync::LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ypm_utils::{impl_serialization_traits, DataType, FromFileString, SerializationError, ToFileString, ToHumanString};

use crate::{lockfile::LockedPackage, pattern::Pattern, sri::Integrity};

static GIT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git(\+[a-z0-9]+)?://").unwrap()
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryName {
    #[default]
    Npm,
    Yarn,
}

impl FromFileString for RegistryName {
    type Error = SerializationError;

    fn from_file_string(s: &str) -> Result<Self, Self::Error> {
        match s {
            "npm" => Ok(RegistryName::Npm),
            "yarn" => Ok(RegistryName::Yarn),
            _ => Err(SerializationError::InvalidValue(s.to_string())),
        }
    }
}

impl ToFileString for RegistryName {
    fn write_file_string<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        out.write_str(match self {
            RegistryName::Npm => "npm",
            RegistryName::Yarn => "yarn",
        })
    }
}

impl ToHumanString for RegistryName {
    fn to_print_string(&self) -> String {
        DataType::String.colorize(&self.to_file_string())
    }
}

impl_serialization_traits!(RegistryName);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteType {
    Tarball,
    Git,
    Copy,
    Link,
    Workspace,
}

/// Where a resolved package comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageRemote {
    pub remote_type: RemoteType,
    pub registry: RegistryName,
    pub reference: String,
    pub resolved: Option<String>,
    pub hash: Option<String>,
    pub integrity: Option<Integrity>,

    /// For workspaces installed in focus mode, the registry artifact
    /// standing in for the local copy.
    pub registry_remote: Option<Box<PackageRemote>>,
}

impl PackageRemote {
    pub fn tarball(resolved: &str) -> PackageRemote {
        let (reference, hash) = match resolved.split_once('#') {
            Some((reference, hash)) => (reference.to_string(), Some(hash.to_string())),
            None => (resolved.to_string(), None),
        };

        PackageRemote {
            remote_type: RemoteType::Tarball,
            registry: RegistryName::Npm,
            reference,
            resolved: Some(resolved.to_string()),
            hash,
            integrity: None,
            registry_remote: None,
        }
    }

    /// Rebuilds the remote of a locked entry. Git urls keep their git
    /// nature so that the fetch layer picks the right strategy.
    pub fn from_locked(resolved: &str, registry: RegistryName, integrity: Option<Integrity>) -> PackageRemote {
        let mut remote
            = PackageRemote::tarball(resolved);

        if GIT_URL.is_match(&remote.reference) {
            remote.remote_type = RemoteType::Git;
        }

        remote.registry = registry;
        remote.integrity = integrity;
        remote
    }

    /// Identity used to detect that two patterns share the same artifact.
    pub fn remote_key(&self) -> Option<String> {
        if let Some(resolved) = &self.resolved {
            return Some(resolved.clone());
        }

        self.hash.as_ref()
            .map(|hash| format!("{}#{}", self.reference, hash))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacesConfig {
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(default)]
    pub nohoist: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkspacesField {
    Packages(Vec<String>),
    Config(WorkspacesConfig),
}

impl WorkspacesField {
    pub fn to_config(&self) -> WorkspacesConfig {
        match self {
            WorkspacesField::Packages(packages) => WorkspacesConfig {
                packages: packages.clone(),
                nohoist: vec![],
            },

            WorkspacesField::Config(config) => {
                config.clone()
            },
        }
    }
}

/// Normalized package metadata.
///
/// The fields prefixed with `_` in `package.json` terms (remote, uid,
/// freshness, location) aren't part of the serialized manifest; they're
/// filled during resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependencies: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub optional_dependencies: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dev_dependencies: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub scripts: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub engines: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<String>,

    #[serde(default)]
    pub private: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<WorkspacesField>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub resolutions: IndexMap<String, String>,

    #[serde(default)]
    pub flat: bool,

    #[serde(skip)]
    pub uid: String,

    #[serde(skip)]
    pub remote: Option<PackageRemote>,

    #[serde(skip)]
    pub fresh: bool,

    #[serde(skip)]
    pub prebuilt_variants: BTreeMap<String, String>,

    #[serde(skip)]
    pub loc: Option<PathBuf>,
}

impl Manifest {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Manifest {
        let version = version.into();

        Manifest {
            name: name.into(),
            uid: version.clone(),
            version,
            ..Default::default()
        }
    }

    pub fn from_json(content: &str) -> Result<Manifest, crate::error::Error> {
        let mut manifest: Manifest
            = serde_json::from_str(content)?;

        if manifest.uid.is_empty() {
            manifest.uid = manifest.version.clone();
        }

        Ok(manifest)
    }

    pub fn human(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn registry(&self) -> RegistryName {
        self.remote.as_ref()
            .map(|remote| remote.registry)
            .unwrap_or_default()
    }

    pub fn remote_type(&self) -> Option<RemoteType> {
        self.remote.as_ref().map(|remote| remote.remote_type)
    }

    pub fn is_workspace(&self) -> bool {
        self.remote_type() == Some(RemoteType::Workspace)
    }

    pub fn workspaces_config(&self) -> Option<WorkspacesConfig> {
        self.workspaces.as_ref().map(WorkspacesField::to_config)
    }

    /// Removes the entries listed in more than one dependency field:
    /// optional dependencies win over regular ones, which win over dev ones.
    pub fn clean_dependencies(&mut self) {
        let optional_dependencies
            = &self.optional_dependencies;
        let dependencies
            = &mut self.dependencies;

        dependencies.retain(|name, _| !optional_dependencies.contains_key(name));

        self.dev_dependencies.retain(|name, _| {
            !optional_dependencies.contains_key(name) && !dependencies.contains_key(name)
        });
    }

    /// Builds the manifest a locked entry stands for, without hitting the
    /// network.
    pub fn from_locked(locked: &LockedPackage) -> Manifest {
        Manifest {
            name: locked.name.clone(),
            version: locked.version.clone(),
            uid: locked.uid.clone(),
            remote: locked.resolved.as_deref()
                .map(|resolved| PackageRemote::from_locked(resolved, locked.registry, locked.integrity.clone())),
            dependencies: locked.dependencies.clone().into_iter().collect(),
            optional_dependencies: locked.optional_dependencies.clone().into_iter().collect(),
            prebuilt_variants: locked.prebuilt_variants.clone(),
            fresh: false,
            ..Default::default()
        }
    }

    /// The exploded lockfile shape of this manifest.
    pub fn to_locked(&self, permissions: &BTreeMap<String, bool>) -> LockedPackage {
        let remote
            = self.remote.as_ref();

        LockedPackage {
            name: self.name.clone(),
            version: self.version.clone(),
            uid: self.uid.clone(),
            resolved: remote.and_then(|remote| remote.resolved.clone()),
            integrity: remote.and_then(|remote| remote.integrity.clone()),
            registry: self.registry(),
            dependencies: self.dependencies.iter()
                .filter(|(name, _)| !self.optional_dependencies.contains_key(*name))
                .map(|(name, range)| (name.clone(), range.clone()))
                .collect(),
            optional_dependencies: self.optional_dependencies.clone().into_iter().collect(),
            permissions: permissions.clone(),
            prebuilt_variants: self.prebuilt_variants.clone(),
        }
    }

    /// Dependency patterns in declaration order. Dependencies that are also
    /// listed as optional are only requested through the optional list.
    pub fn dependency_patterns(&self) -> Vec<Pattern> {
        self.dependencies.iter()
            .filter(|(name, _)| !self.optional_dependencies.contains_key(*name))
            .map(|(name, range)| Pattern::from_parts(name, range))
            .collect()
    }

    pub fn optional_dependency_patterns(&self) -> Vec<Pattern> {
        self.optional_dependencies.iter()
            .map(|(name, range)| Pattern::from_parts(name, range))
            .collect()
    }

    pub fn dev_dependency_patterns(&self) -> Vec<Pattern> {
        self.dev_dependencies.iter()
            .filter(|(name, _)| !self.dependencies.contains_key(*name) && !self.optional_dependencies.contains_key(*name))
            .map(|(name, range)| Pattern::from_parts(name, range))
            .collect()
    }
}
