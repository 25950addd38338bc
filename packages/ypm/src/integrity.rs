use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, INTEGRITY_FILENAME, MODULES_FOLDER},
    error::Error,
    lockfile::Lockfile,
    pattern::Pattern,
    workspace::WorkspaceLayout,
};

#[cfg(test)]
#[path = "./integrity.test.rs"]
mod integrity_tests;

/// Why an integrity check didn't pass. Only the first failing comparison
/// is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityError {
    ExpectedIsNotAJson,
    FilesMissing,
    LockfileDontMatch,
    FlagsDontMatch,
    LinkedModulesDontMatch,
    PatternsDontMatch,
    ModulesFoldersMissing,
    SystemParamsDontMatch,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntegrityError::ExpectedIsNotAJson => "EXPECTED_IS_NOT_A_JSON",
            IntegrityError::FilesMissing => "FILES_MISSING",
            IntegrityError::LockfileDontMatch => "LOCKFILE_DONT_MATCH",
            IntegrityError::FlagsDontMatch => "FLAGS_DONT_MATCH",
            IntegrityError::LinkedModulesDontMatch => "LINKED_MODULES_DONT_MATCH",
            IntegrityError::PatternsDontMatch => "PATTERNS_DONT_MATCH",
            IntegrityError::ModulesFoldersMissing => "MODULES_FOLDERS_MISSING",
            IntegrityError::SystemParamsDontMatch => "SYSTEM_PARAMS_DONT_MATCH",
        })
    }
}

/// The install options that change the shape of the installation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrityFlags {
    pub check_files: bool,
    pub flat: bool,
}

impl IntegrityFlags {
    pub fn from_config(config: &Config) -> IntegrityFlags {
        IntegrityFlags {
            check_files: config.check_files,
            flat: config.flat,
        }
    }
}

/// Contents of `.yarn-integrity`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrityFile {
    pub system_params: String,
    pub modules_folders: Vec<String>,
    pub flags: Vec<String>,
    pub linked_modules: Vec<String>,
    pub top_level_patterns: Vec<String>,
    pub lockfile_entries: BTreeMap<String, String>,
    pub files: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrityCheckResult {
    pub integrity_file_missing: bool,
    pub integrity_matches: bool,
    pub integrity_error: Option<IntegrityError>,
    pub missing_patterns: Vec<Pattern>,
    pub hard_refresh_required: bool,
}

/// Compares the inputs of the current install with the ones recorded by
/// the previous one, so that an install with nothing to do can bail out.
pub struct IntegrityChecker<'a> {
    config: &'a Config,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(config: &'a Config) -> IntegrityChecker<'a> {
        IntegrityChecker {
            config,
        }
    }

    pub fn integrity_file_location(&self) -> PathBuf {
        self.config.modules_root().join(INTEGRITY_FILENAME)
    }

    /// The module folders of the project, whether they exist or not.
    fn modules_folder_candidates(&self, workspace_layout: Option<&WorkspaceLayout>) -> Vec<PathBuf> {
        let mut locations
            = vec![self.config.modules_root()];

        if let Some(workspace_layout) = workspace_layout {
            for entry in workspace_layout.workspaces.values() {
                locations.push(entry.loc.join(MODULES_FOLDER));
            }
        }

        locations
    }

    async fn existing_modules_folders(&self, workspace_layout: Option<&WorkspaceLayout>) -> Vec<String> {
        let candidates
            = self.modules_folder_candidates(workspace_layout);

        let existence = futures::future::join_all(candidates.iter().map(|candidate| {
            tokio::fs::try_exists(candidate)
        })).await;

        candidates.iter()
            .zip(existence)
            .filter(|(_, exists)| matches!(exists, Ok(true)))
            .map(|(folder, _)| relative_path(&self.config.lockfile_folder, folder))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every file below the modules root, as sorted `/`-separated relative
    /// paths. Metadata files such as the integrity file itself are skipped.
    async fn files_deep(&self, root: &Path) -> Result<Vec<String>, Error> {
        let mut files
            = vec![];
        let mut pending
            = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => return Err(error.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path
                    = entry.path();

                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let is_ignored = entry.file_name().to_str()
                    .is_some_and(|name| self.config.integrity_ignored_files.iter().any(|ignored| ignored == name));

                if !is_ignored {
                    files.push(relative_path(root, &path));
                }
            }
        }

        files.sort();

        Ok(files)
    }

    /// Builds the integrity snapshot of the current install inputs.
    pub async fn generate_integrity_file(&self, lockfile: &Lockfile, patterns: &[Pattern], flags: IntegrityFlags, workspace_layout: Option<&WorkspaceLayout>, artifacts: Option<BTreeMap<String, Vec<String>>>) -> Result<IntegrityFile, Error> {
        let mut top_level_patterns = patterns.iter()
            .filter(|pattern| workspace_layout.is_none_or(|layout| layout.get_manifest_by_pattern(pattern.as_str()).is_none()))
            .map(Pattern::to_string)
            .collect::<Vec<_>>();

        // Workspaces aren't part of the lockfile; their dependencies are
        // recorded here so that editing them invalidates the snapshot
        if let Some(workspace_layout) = workspace_layout {
            for entry in workspace_layout.workspaces.values() {
                let manifest
                    = &entry.manifest;

                for dependencies in [&manifest.dev_dependencies, &manifest.dependencies, &manifest.optional_dependencies, &manifest.peer_dependencies] {
                    for (name, range) in dependencies {
                        top_level_patterns.push(format!("{}@{}", name, range));
                    }
                }
            }
        }

        top_level_patterns.sort();

        let mut result_flags
            = vec![];

        if flags.check_files {
            result_flags.push("checkFiles".to_string());
        }

        if flags.flat {
            result_flags.push("flat".to_string());
        }

        if self.config.ignore_scripts {
            result_flags.push("ignoreScripts".to_string());
        }

        if self.config.focus {
            result_flags.push(format!("focus: {}", self.config.focused_workspace_name.as_deref().unwrap_or_default()));
        }

        if self.config.production {
            result_flags.push("production".to_string());
        }

        if self.config.plugnplay {
            result_flags.push("plugnplay".to_string());
        }

        let mut linked_modules
            = self.config.linked_modules.clone();
        linked_modules.sort();

        let files = match flags.check_files {
            true => self.files_deep(&self.config.modules_root()).await?,
            false => vec![],
        };

        Ok(IntegrityFile {
            system_params: self.config.system.system_params(),
            modules_folders: self.existing_modules_folders(workspace_layout).await,
            flags: result_flags,
            linked_modules,
            top_level_patterns,
            lockfile_entries: lockfile.resolved_entries(),
            files,
            artifacts,
        })
    }

    /// Reads the integrity file; `None` if it isn't valid JSON.
    async fn read_integrity_file(&self, path: &Path) -> Result<Option<IntegrityFile>, Error> {
        let content
            = tokio::fs::read_to_string(path).await?;

        let Ok(mut integrity_file) = serde_json::from_str::<IntegrityFile>(&content) else {
            return Ok(None);
        };

        if integrity_file.system_params.is_empty() {
            integrity_file.system_params = self.config.system.system_params();
        }

        Ok(Some(integrity_file))
    }

    pub fn compare_integrity_files(actual: &IntegrityFile, expected: Option<&IntegrityFile>, check_files: bool) -> Result<(), IntegrityError> {
        let Some(expected) = expected else {
            return Err(IntegrityError::ExpectedIsNotAJson);
        };

        if actual.linked_modules != expected.linked_modules {
            return Err(IntegrityError::LinkedModulesDontMatch);
        }

        if actual.system_params != expected.system_params {
            return Err(IntegrityError::SystemParamsDontMatch);
        }

        // A previous --check-files run doesn't invalidate a less strict one
        let relevant_expected_flags = expected.flags.iter()
            .filter(|flag| *flag != "checkFiles" || actual.flags.iter().any(|flag| flag == "checkFiles"))
            .collect::<Vec<_>>();

        if !actual.flags.iter().eq(relevant_expected_flags) {
            return Err(IntegrityError::FlagsDontMatch);
        }

        if actual.top_level_patterns != expected.top_level_patterns {
            return Err(IntegrityError::PatternsDontMatch);
        }

        let lockfile_keys = actual.lockfile_entries.keys()
            .chain(expected.lockfile_entries.keys());

        for key in lockfile_keys {
            if actual.lockfile_entries.get(key) != expected.lockfile_entries.get(key) {
                return Err(IntegrityError::LockfileDontMatch);
            }
        }

        if check_files {
            if expected.files.len() > actual.files.len() {
                return Err(IntegrityError::FilesMissing);
            }

            // Both lists are sorted, so a single forward scan is enough;
            // `max` is the last position from which the remaining expected
            // files could still all be found
            let mut v = 0;

            for (u, expected_file) in expected.files.iter().enumerate() {
                let max
                    = actual.files.len() - (expected.files.len() - u) + 1;

                while v < max && actual.files[v] != *expected_file {
                    v += 1;
                }

                if v == max {
                    return Err(IntegrityError::FilesMissing);
                }
            }
        }

        Ok(())
    }

    pub async fn check(&self, patterns: &[Pattern], lockfile: &Lockfile, flags: IntegrityFlags, workspace_layout: Option<&WorkspaceLayout>) -> Result<IntegrityCheckResult, Error> {
        let missing_patterns = patterns.iter()
            .filter(|pattern| !lockfile.cache.contains_key(*pattern))
            .filter(|pattern| workspace_layout.is_none_or(|layout| layout.get_manifest_by_pattern(pattern.as_str()).is_none()))
            .cloned()
            .collect::<Vec<_>>();

        let location
            = self.integrity_file_location();
        let exists
            = tokio::fs::try_exists(&location).await?;

        if !missing_patterns.is_empty() || !exists {
            return Ok(IntegrityCheckResult {
                integrity_file_missing: !exists,
                missing_patterns,
                ..Default::default()
            });
        }

        let actual
            = self.generate_integrity_file(lockfile, patterns, flags, workspace_layout, None).await?;
        let expected
            = self.read_integrity_file(&location).await?;

        let mut outcome
            = IntegrityChecker::compare_integrity_files(&actual, expected.as_ref(), flags.check_files);

        if let (Ok(()), Some(expected)) = (&outcome, &expected) {
            for modules_folder in &expected.modules_folders {
                if !tokio::fs::try_exists(self.config.lockfile_folder.join(modules_folder)).await? {
                    outcome = Err(IntegrityError::ModulesFoldersMissing);
                }
            }
        }

        log::debug!("Integrity check for {}: {:?}", location.display(), outcome);

        Ok(IntegrityCheckResult {
            integrity_file_missing: false,
            integrity_matches: outcome.is_ok(),
            integrity_error: outcome.err(),
            missing_patterns,
            hard_refresh_required: outcome == Err(IntegrityError::SystemParamsDontMatch),
        })
    }

    /// Artifacts recorded by the previous install, if any.
    pub async fn get_artifacts(&self) -> Result<Option<BTreeMap<String, Vec<String>>>, Error> {
        let location
            = self.integrity_file_location();

        if !tokio::fs::try_exists(&location).await? {
            return Ok(None);
        }

        Ok(self.read_integrity_file(&location).await?
            .and_then(|integrity_file| integrity_file.artifacts))
    }

    pub async fn save(&self, patterns: &[Pattern], lockfile: &Lockfile, flags: IntegrityFlags, workspace_layout: Option<&WorkspaceLayout>, artifacts: Option<BTreeMap<String, Vec<String>>>) -> Result<(), Error> {
        let location
            = self.integrity_file_location();

        if let Some(parent) = location.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let integrity_file
            = self.generate_integrity_file(lockfile, patterns, flags, workspace_layout, artifacts).await?;

        tokio::fs::write(&location, serde_json::to_string_pretty(&integrity_file)?).await?;

        Ok(())
    }

    pub async fn remove_integrity_file(&self) -> Result<(), Error> {
        match tokio::fs::remove_file(self.integrity_file_location()).await {
            Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}

fn relative_path(base: &Path, path: &Path) -> String {
    let relative
        = path.strip_prefix(base).unwrap_or(path);

    relative.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
