use globset::GlobBuilder;

use crate::{
    config::Config,
    error::Error,
    manifest::Manifest,
    report::Report,
    workspace::WorkspaceLayout,
};

use super::HoistManifest;

/// Alias of the workspace aggregator in nohoist paths, so that globs
/// don't depend on the generated aggregator name.
pub const WS_ROOT_ALIAS: &str = "_project_";

/// Nohoist state inherited from the parent of a tree entry: its glob list
/// and its original path.
pub type ParentNohoist = (Option<Vec<String>>, String);

/// Decides which tree entries must stay inside their workspace branch.
///
/// Nohoist globs are matched against the "original path" of an entry,
/// i.e. the `/`-joined chain of package names that required it before any
/// hoisting happened (`/_project_/my-workspace/react-native`).
pub struct NohoistResolver<'a> {
    config: &'a Config,
    report: &'a Report,
    ws_root_package_name: Option<String>,
    ws_root_nohoist_list: Option<Vec<String>>,
}

impl<'a> NohoistResolver<'a> {
    pub fn new(config: &'a Config, report: &'a Report, workspace_layout: Option<&WorkspaceLayout>) -> NohoistResolver<'a> {
        let mut resolver = NohoistResolver {
            config,
            report,
            ws_root_package_name: None,
            ws_root_nohoist_list: None,
        };

        if let Some(workspace_layout) = workspace_layout {
            let manifest
                = &workspace_layout.virtual_manifest().manifest;

            resolver.ws_root_package_name = Some(workspace_layout.virtual_manifest_name.clone());
            resolver.ws_root_nohoist_list = resolver.extract_nohoist_list(manifest, &manifest.name);
        }

        resolver
    }

    pub fn init_nohoist(&self, info: &mut HoistManifest, manifest: &Manifest, parent: Option<ParentNohoist>) -> Result<(), Error> {
        let mut parent_nohoist_list
            = None;
        let mut original_parent_path
            = info.original_parent_path.clone();

        match parent {
            Some((nohoist_list, path)) => {
                parent_nohoist_list = nohoist_list;
                original_parent_path = path;
            },

            None => {
                debug_assert!(self.is_top_package(info), "{} has neither a parent nor a top-level position", info.key);

                if self.ws_root_package_name.as_deref() != Some(info.name.as_str()) {
                    parent_nohoist_list = self.ws_root_nohoist_list.clone();
                    original_parent_path = self.ws_root_package_name.clone().unwrap_or_default();
                }
            },
        }

        info.original_parent_path = original_parent_path;

        let mut nohoist_list
            = self.extract_nohoist_list(manifest, &self.original_path(info)).unwrap_or_default();

        if let Some(parent_nohoist_list) = parent_nohoist_list {
            nohoist_list.extend(parent_nohoist_list);
        }

        info.nohoist_list = (!nohoist_list.is_empty()).then_some(nohoist_list);
        info.is_nohoist = self.is_nohoist(info)?;

        Ok(())
    }

    /// Nohoist entries may not rise above the top of their branch, which
    /// is the first segment of their key.
    pub fn highest_hoisting_point(&self, info: &HoistManifest) -> usize {
        match info.is_nohoist && info.parts.len() > 1 {
            true => 1,
            false => 0,
        }
    }

    pub fn original_path(&self, info: &HoistManifest) -> String {
        self.make_path(&[&info.original_parent_path, &info.name])
    }

    fn is_nohoist(&self, info: &HoistManifest) -> Result<bool, Error> {
        if self.is_top_package(info) {
            return Ok(false);
        }

        if let Some(nohoist_list) = &info.nohoist_list {
            let path
                = self.original_path(info);

            for glob in nohoist_list {
                let matcher = GlobBuilder::new(glob)
                    .literal_separator(true)
                    .build()?
                    .compile_matcher();

                if matcher.is_match(&path) {
                    return Ok(true);
                }
            }
        }

        Ok(self.config.plugnplay)
    }

    fn is_top_package(&self, info: &HoistManifest) -> bool {
        let parent_parts
            = &info.parts[..info.parts.len().saturating_sub(1)];

        match parent_parts {
            [] => true,
            [parent] => self.ws_root_package_name.as_deref() == Some(parent.as_str()),
            _ => false,
        }
    }

    fn make_path(&self, segments: &[&str]) -> String {
        let path = segments.iter()
            .map(|segment| match self.ws_root_package_name.as_deref() == Some(*segment) {
                true => WS_ROOT_ALIAS,
                false => segment,
            })
            .collect::<Vec<_>>()
            .join("/");

        match path.starts_with('/') {
            true => path,
            false => format!("/{}", path),
        }
    }

    /// The nohoist globs declared by a workspace root, rebased on the
    /// branch they apply to.
    fn extract_nohoist_list(&self, manifest: &Manifest, path_prefix: &str) -> Option<Vec<String>> {
        let workspaces
            = self.config.get_workspaces(manifest, self.report)?;

        Some(workspaces.nohoist.iter()
            .map(|glob| self.make_path(&[path_prefix, glob]))
            .collect())
    }
}
