use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ypm_utils::FromFileString;

use crate::{
    error::Error,
    manifest::{Manifest, RegistryName, RemoteType, WorkspacesConfig},
    report::Report,
};

#[cfg(test)]
#[path = "./config.test.rs"]
mod config_tests;

pub const RC_FILENAME: &str = ".yarnrc.yml";
pub const LOCKFILE_FILENAME: &str = "yarn.lock";
pub const INTEGRITY_FILENAME: &str = ".yarn-integrity";
pub const MODULES_FOLDER: &str = "node_modules";

/// Description of the host the packages get installed on, used by the
/// compatibility checks and the integrity fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub platform: String,
    pub arch: String,
    pub abi: String,
    pub node_version: String,
    pub yarn_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        let platform = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "win32",
            os => os,
        };

        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "x86" => "ia32",
            "aarch64" => "arm64",
            arch => arch,
        };

        SystemInfo {
            platform: platform.to_string(),
            arch: arch.to_string(),
            abi: "115".to_string(),
            node_version: "20.0.0".to_string(),
            yarn_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl SystemInfo {
    /// `platform-arch-abi`, the part of the integrity fingerprint that
    /// invalidates native builds.
    pub fn system_params(&self) -> String {
        format!("{}-{}-{}", self.platform, self.arch, self.abi)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(skip)]
    pub cwd: PathBuf,

    #[serde(skip)]
    pub lockfile_folder: PathBuf,

    pub modules_folder: Option<PathBuf>,
    pub production: bool,
    pub ignore_scripts: bool,
    pub ignore_optional: bool,
    pub ignore_platform: bool,
    pub ignore_engines: bool,
    pub frozen_lockfile: bool,
    pub flat: bool,
    pub check_files: bool,
    pub focus: bool,
    pub focused_workspace_name: Option<String>,
    pub plugnplay: bool,
    pub workspaces_enabled: bool,
    pub workspaces_nohoist_enabled: bool,
    pub linked_modules: Vec<String>,
    pub network_concurrency: usize,
    pub integrity_ignored_files: Vec<String>,
    pub system: SystemInfo,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cwd: PathBuf::new(),
            lockfile_folder: PathBuf::new(),
            modules_folder: None,
            production: false,
            ignore_scripts: false,
            ignore_optional: false,
            ignore_platform: false,
            ignore_engines: false,
            frozen_lockfile: false,
            flat: false,
            check_files: false,
            focus: false,
            focused_workspace_name: None,
            plugnplay: false,
            workspaces_enabled: true,
            workspaces_nohoist_enabled: true,
            linked_modules: vec![],
            network_concurrency: 8,
            integrity_ignored_files: vec![INTEGRITY_FILENAME.to_string(), ".yarn-state.yml".to_string()],
            system: SystemInfo::default(),
        }
    }
}

fn env_value<T>(key: &str, value: &str) -> Result<T, Error> where T: FromFileString {
    T::from_file_string(value)
        .map_err(|_| Error::InvalidConfigValue(key.to_string(), value.to_string()))
}

impl Config {
    pub fn new<P: AsRef<Path>>(cwd: P) -> Config {
        Config {
            cwd: cwd.as_ref().to_path_buf(),
            lockfile_folder: cwd.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    fn import_config(content: &str) -> Result<Config, Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_yaml::from_str::<Config>(content)?)
    }

    /// Reads `.yarnrc.yml` from the project folder (if any), then applies the
    /// `YARN_*` environment overrides.
    pub async fn load<P: AsRef<Path>>(cwd: P) -> Result<Config, Error> {
        let cwd = cwd.as_ref();

        let content = match tokio::fs::read_to_string(cwd.join(RC_FILENAME)).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => return Err(error.into()),
        };

        let mut config
            = Config::import_config(&content)?;

        config.cwd = cwd.to_path_buf();
        config.lockfile_folder = cwd.to_path_buf();
        config.apply_env(std::env::vars())?;

        Ok(config)
    }

    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), Error> where I: IntoIterator<Item = (K, V)>, K: AsRef<str>, V: AsRef<str> {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());

            match key {
                "YARN_PRODUCTION" => self.production = env_value(key, value)?,
                "YARN_IGNORE_SCRIPTS" => self.ignore_scripts = env_value(key, value)?,
                "YARN_IGNORE_OPTIONAL" => self.ignore_optional = env_value(key, value)?,
                "YARN_IGNORE_PLATFORM" => self.ignore_platform = env_value(key, value)?,
                "YARN_IGNORE_ENGINES" => self.ignore_engines = env_value(key, value)?,
                "YARN_FROZEN_LOCKFILE" => self.frozen_lockfile = env_value(key, value)?,
                "YARN_FLAT" => self.flat = env_value(key, value)?,
                "YARN_CHECK_FILES" => self.check_files = env_value(key, value)?,
                "YARN_PLUGNPLAY" => self.plugnplay = env_value(key, value)?,
                "YARN_NETWORK_CONCURRENCY" => self.network_concurrency = env_value::<usize>(key, value)?.max(1),
                "YARN_MODULES_FOLDER" => self.modules_folder = env_value::<Option<String>>(key, value)?.map(PathBuf::from),
                _ => {},
            }
        }

        Ok(())
    }

    /// Name of the folder packages from the given registry are installed in.
    pub fn folder_for(&self, _registry: RegistryName) -> &'static str {
        MODULES_FOLDER
    }

    /// Root folder of the installation tree.
    pub fn modules_root(&self) -> PathBuf {
        self.modules_folder.clone()
            .unwrap_or_else(|| self.lockfile_folder.join(MODULES_FOLDER))
    }

    /// A stable identity for the artifact a manifest was resolved to; two
    /// hoisting candidates with the same key are the same package on disk.
    pub fn module_cache_key(&self, manifest: &Manifest) -> String {
        let Some(remote) = &manifest.remote else {
            return format!("npm-{}-{}-{}", manifest.name.replace('/', "-"), manifest.version, manifest.uid);
        };

        if let RemoteType::Workspace | RemoteType::Link = remote.remote_type {
            return remote.reference.clone();
        }

        let suffix = remote.hash.as_deref()
            .filter(|hash| !hash.is_empty())
            .unwrap_or(&manifest.uid);

        format!("{}-{}-{}-{}", match remote.registry {
            RegistryName::Npm => "npm",
            RegistryName::Yarn => "yarn",
        }, manifest.name.replace('/', "-"), manifest.version, suffix)
    }

    /// The workspace settings of a manifest, once validated against the
    /// project settings. Invalid parts are dropped with a warning.
    pub fn get_workspaces(&self, manifest: &Manifest, report: &Report) -> Option<WorkspacesConfig> {
        if !self.workspaces_enabled {
            return None;
        }

        let mut workspaces
            = manifest.workspaces_config()?;

        if !workspaces.packages.is_empty() && !manifest.private {
            report.warn("Workspaces can only be enabled in private projects.");
            return None;
        }

        if !workspaces.nohoist.is_empty() {
            if !self.workspaces_nohoist_enabled {
                report.warn(format!("{} defines \"workspaces.nohoist\", but nohoist is disabled in the configuration.", manifest.name));
                workspaces.nohoist.clear();
            } else if !manifest.private {
                report.warn(format!("{} defines \"workspaces.nohoist\", but nohoist can only be enabled in private projects.", manifest.name));
                workspaces.nohoist.clear();
            }
        }

        Some(workspaces)
    }
}
