use std::path::PathBuf;

use indexmap::IndexMap;
use ypm_semver::Range;
use ypm_utils::FromFileString;

use crate::{
    manifest::{Manifest, PackageRemote, RegistryName, RemoteType},
    pattern::normalize_pattern,
    report::Report,
};

#[cfg(test)]
#[path = "./workspace.test.rs"]
mod workspace_tests;

pub const VIRTUAL_MANIFEST_PREFIX: &str = "workspace-aggregator";

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceEntry {
    pub loc: PathBuf,
    pub manifest: Manifest,
}

/// The workspaces of a project, plus a synthetic "aggregator" package that
/// depends on every one of them so that the resolver and the hoister can
/// treat the monorepo as a single dependency tree.
#[derive(Clone, Debug)]
pub struct WorkspaceLayout {
    pub workspaces: IndexMap<String, WorkspaceEntry>,
    pub virtual_manifest_name: String,
}

fn workspace_remote(loc: &PathBuf) -> PackageRemote {
    PackageRemote {
        remote_type: RemoteType::Workspace,
        registry: RegistryName::Npm,
        reference: loc.to_string_lossy().into_owned(),
        resolved: None,
        hash: None,
        integrity: None,
        registry_remote: None,
    }
}

impl WorkspaceLayout {
    /// Builds the layout from the root manifest and the manifests of the
    /// workspaces discovered on disk. Workspaces missing a name or a version
    /// are skipped with a warning.
    pub fn new(root_loc: PathBuf, root_manifest: &Manifest, candidates: Vec<WorkspaceEntry>, report: &Report) -> WorkspaceLayout {
        let mut workspaces
            = IndexMap::new();

        for WorkspaceEntry {loc, mut manifest} in candidates {
            if manifest.name.is_empty() || manifest.version.is_empty() {
                report.warn(format!("Missing name or version in workspace at {}, ignoring", loc.display()));
                continue;
            }

            manifest.remote = Some(workspace_remote(&loc));
            manifest.loc = Some(loc.clone());

            if manifest.uid.is_empty() {
                manifest.uid = manifest.version.clone();
            }

            workspaces.insert(manifest.name.clone(), WorkspaceEntry {loc, manifest});
        }

        let virtual_manifest_name = match root_manifest.name.as_str() {
            "" => VIRTUAL_MANIFEST_PREFIX.to_string(),
            name => format!("{}-{}", VIRTUAL_MANIFEST_PREFIX, name.replace('/', "-").trim_start_matches('@')),
        };

        let mut dependencies
            = root_manifest.dependencies.clone();

        for (name, entry) in workspaces.iter() {
            dependencies.insert(name.clone(), entry.manifest.version.clone());
        }

        let mut virtual_manifest
            = Manifest::new(virtual_manifest_name.clone(), "1.0.0");

        virtual_manifest.uid = String::new();
        virtual_manifest.dependencies = dependencies;
        virtual_manifest.dev_dependencies = root_manifest.dev_dependencies.clone();
        virtual_manifest.optional_dependencies = root_manifest.optional_dependencies.clone();
        virtual_manifest.private = root_manifest.private;
        virtual_manifest.workspaces = root_manifest.workspaces.clone();
        virtual_manifest.remote = Some(workspace_remote(&root_loc));
        virtual_manifest.loc = Some(root_loc.clone());

        workspaces.insert(virtual_manifest_name.clone(), WorkspaceEntry {
            loc: root_loc,
            manifest: virtual_manifest,
        });

        WorkspaceLayout {
            workspaces,
            virtual_manifest_name,
        }
    }

    pub fn get_workspace_manifest(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.workspaces.get(name)
    }

    pub fn virtual_manifest(&self) -> &WorkspaceEntry {
        self.workspaces.get(&self.virtual_manifest_name)
            .expect("Expected the virtual manifest to be part of the layout")
    }

    /// Returns the workspace a pattern refers to, provided its version
    /// satisfies the requested range.
    pub fn get_manifest_by_pattern(&self, pattern: &str) -> Option<&WorkspaceEntry> {
        let normalized
            = normalize_pattern(pattern);

        let workspace
            = self.get_workspace_manifest(&normalized.name)?;

        if !normalized.has_version {
            return Some(workspace);
        }

        let range = Range::from_file_string(&normalized.range).ok()?;
        let version = ypm_semver::Version::from_file_string(&workspace.manifest.version).ok()?;

        range.check(&version).then_some(workspace)
    }

    /// Names of the real workspaces (the aggregator excluded).
    pub fn workspace_names(&self) -> impl Iterator<Item = &String> {
        self.workspaces.keys()
            .filter(|name| **name != self.virtual_manifest_name)
    }
}
