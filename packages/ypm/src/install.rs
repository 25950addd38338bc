use std::{collections::BTreeMap, future::Future, path::PathBuf};

use indexmap::IndexMap;
use ypm_semver::Version;
use ypm_utils::FromFileString;

use crate::{
    compatibility::{should_check, PackageCompatibility},
    config::{Config, LOCKFILE_FILENAME},
    error::Error,
    fetcher::{DependencyHint, DependencyRequest, PackageFetcher},
    hoist::PackageHoister,
    hooks::{Hooks, InstallStep, NoopHooks},
    integrity::{IntegrityChecker, IntegrityFlags},
    lockfile::{Lockfile, LockfileEntry, ParseResultType},
    manifest::Manifest,
    pattern::Pattern,
    report::Report,
    resolution_map::ResolutionMap,
    resolver::{PackageResolver, ResolverOptions},
    workspace::WorkspaceLayout,
};

#[cfg(test)]
#[path = "./install.test.rs"]
mod install_tests;

/// The top-level requests of a project, as derived from its manifest.
#[derive(Clone, Debug, Default)]
pub struct InstallRequest {
    pub requests: Vec<DependencyRequest>,
    pub patterns: Vec<Pattern>,
    pub used_patterns: Vec<Pattern>,
    pub ignore_patterns: Vec<Pattern>,
    pub resolution_map: ResolutionMap,
}

/// A row of the install tree, ready to be handed to a linker.
#[derive(Clone, Debug, PartialEq)]
pub struct HoistedPackage {
    pub loc: PathBuf,
    pub key: String,
    pub manifest: Manifest,
    pub is_shallow: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InstallOutcome {
    /// Set when the integrity file proved that nothing had to be done; the
    /// tree is left empty in that case.
    pub up_to_date: bool,
    pub top_level_patterns: Vec<Pattern>,
    pub flat_tree: Vec<HoistedPackage>,
    pub lockfile: String,
    pub lockfile_changed: bool,
    /// The root resolutions, completed with the versions picked when
    /// installing flat.
    pub flat_resolutions: IndexMap<String, String>,
}

pub struct Install<'a> {
    config: &'a Config,
    report: &'a Report,
    fetcher: &'a dyn PackageFetcher,
    hooks: &'a dyn Hooks,

    root_manifest: Manifest,
    lockfile: Lockfile,
    workspace_layout: Option<&'a WorkspaceLayout>,
}

impl<'a> Install<'a> {
    pub fn new(config: &'a Config, report: &'a Report, fetcher: &'a dyn PackageFetcher, root_manifest: Manifest) -> Install<'a> {
        Install {
            config,
            report,
            fetcher,
            hooks: &NoopHooks,

            root_manifest,
            lockfile: Lockfile::new(),
            workspace_layout: None,
        }
    }

    /// Reads the project manifest and the lockfile from the configured
    /// folders. A missing `package.json` is treated as an empty project.
    pub async fn load(config: &'a Config, report: &'a Report, fetcher: &'a dyn PackageFetcher) -> Result<Install<'a>, Error> {
        let manifest_path
            = config.cwd.join("package.json");

        let root_manifest = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(content) => Manifest::from_json(&content)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(error) => return Err(error.into()),
        };

        let lockfile
            = Lockfile::from_directory(&config.lockfile_folder, report).await?;

        Ok(Install::new(config, report, fetcher, root_manifest).with_lockfile(lockfile))
    }

    pub fn with_hooks(mut self, hooks: &'a dyn Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_lockfile(mut self, lockfile: Lockfile) -> Self {
        self.lockfile = lockfile;
        self
    }

    pub fn with_workspace_layout(mut self, workspace_layout: Option<&'a WorkspaceLayout>) -> Self {
        self.workspace_layout = workspace_layout;
        self
    }

    fn workspace_layout(&self) -> Option<&'a WorkspaceLayout> {
        self.workspace_layout.filter(|_| self.config.workspaces_enabled)
    }

    /// Lists the requests for the root manifest: resolution overrides first,
    /// then the regular, dev, and optional dependencies, then the workspace
    /// aggregator when the project is a monorepo.
    ///
    /// Dev dependencies are still requested in production, but listed in
    /// `ignore_patterns` so that they can be excluded from the tree.
    pub fn fetch_request_from_cwd(&self) -> Result<InstallRequest, Error> {
        let mut request
            = InstallRequest::default();

        request.resolution_map.init(&self.root_manifest.resolutions, self.report)?;

        for (name, pattern) in request.resolution_map.patterns() {
            let optional = self.root_manifest.optional_dependencies.contains_key(name)
                && self.config.ignore_optional;

            request.requests.push(DependencyRequest::new(pattern.clone())
                .with_hint(DependencyHint::Resolution)
                .set_optional(optional));
        }

        let root_manifest
            = &self.root_manifest;

        self.push_dependencies(&mut request, &root_manifest.dependencies, None, false, true);
        self.push_dependencies(&mut request, &root_manifest.dev_dependencies, Some(DependencyHint::Dev), false, !self.config.production);
        self.push_dependencies(&mut request, &root_manifest.optional_dependencies, Some(DependencyHint::Optional), true, true);

        if let Some(workspace_layout) = self.workspace_layout() {
            let virtual_manifest
                = &workspace_layout.virtual_manifest().manifest;

            let aggregator
                = IndexMap::from([(virtual_manifest.name.clone(), virtual_manifest.version.clone())]);

            self.push_dependencies(&mut request, &aggregator, Some(DependencyHint::Workspaces), false, true);

            let implicit_dependencies = virtual_manifest.dependencies.iter()
                .filter(|(name, _)| {
                    !root_manifest.dependencies.contains_key(*name)
                        && !root_manifest.dev_dependencies.contains_key(*name)
                        && !root_manifest.optional_dependencies.contains_key(*name)
                })
                .map(|(name, range)| (name.clone(), range.clone()))
                .collect::<IndexMap<_, _>>();

            self.push_dependencies(&mut request, &implicit_dependencies, Some(DependencyHint::Workspaces), false, true);
        }

        Ok(request)
    }

    fn push_dependencies(&self, request: &mut InstallRequest, dependencies: &IndexMap<String, String>, hint: Option<DependencyHint>, optional: bool, is_used: bool) {
        if self.config.flat && !is_used {
            return;
        }

        for (name, range) in dependencies {
            // A bare name is only kept when the lockfile already knows it
            let pattern = match self.lockfile.get_locked(name) {
                Some(_) => Pattern::new(name.clone()),
                None => Pattern::from_parts(name, range),
            };

            match is_used {
                true => request.used_patterns.push(pattern.clone()),
                false => request.ignore_patterns.push(pattern.clone()),
            }

            request.patterns.push(pattern.clone());

            let mut dependency_request = DependencyRequest::new(pattern)
                .set_optional(optional);

            dependency_request.hint = hint;

            request.requests.push(dependency_request);
        }
    }

    async fn step<T, F>(&self, step: InstallStep, future: F) -> Result<T, Error> where F: Future<Output = Result<T, Error>> {
        log::debug!("Entering the {} step", step);

        self.hooks.before_step(step);
        let result = future.await;
        self.hooks.after_step(step);

        result
    }

    pub async fn run(self) -> Result<InstallOutcome, Error> {
        let config
            = self.config;
        let report
            = self.report;
        let workspace_layout
            = self.workspace_layout();

        let integrity_checker
            = IntegrityChecker::new(config);
        let compatibility
            = PackageCompatibility::new(config, report);

        let artifacts
            = integrity_checker.get_artifacts().await?;

        if should_check(&self.root_manifest, config) {
            compatibility.check_one(&self.root_manifest)?;
        }

        let InstallRequest {requests, patterns: top_level_patterns, ignore_patterns, resolution_map, ..}
            = self.fetch_request_from_cwd()?;

        let mut resolver = PackageResolver::new(config, report, self.fetcher, self.lockfile.clone(), resolution_map)
            .with_workspace_layout(workspace_layout);

        let mut flat_resolutions
            = self.root_manifest.resolutions.clone();

        let is_flat
            = config.flat || self.root_manifest.flat;

        let flattened_patterns = self.step(InstallStep::Resolve, async {
            resolver.init(requests, ResolverOptions {is_flat, is_frozen: config.frozen_lockfile}).await?;

            match is_flat {
                true => self.flatten(&mut resolver, &top_level_patterns, &mut flat_resolutions),
                false => Ok(top_level_patterns.clone()),
            }
        }).await?;

        let up_to_date = self.step(InstallStep::IntegrityCheck, async {
            self.bailout(&resolver, &top_level_patterns, &integrity_checker, artifacts.clone()).await
        }).await?;

        if up_to_date {
            return Ok(InstallOutcome {
                up_to_date,
                top_level_patterns,
                lockfile: resolver.lockfile.source.clone(),
                flat_resolutions,
                ..Default::default()
            });
        }

        self.mark_ignored(&mut resolver, &ignore_patterns);

        self.step(InstallStep::CompatibilityCheck, async {
            compatibility.init(&mut resolver)
        }).await?;

        let flat_tree = self.step(InstallStep::Hoist, async {
            integrity_checker.remove_integrity_file().await?;

            let mut hoister
                = PackageHoister::new(config, report, &resolver, config.ignore_optional, workspace_layout);

            hoister.seed(&flattened_patterns)?;

            if config.focus {
                hoister.mark_shallow_workspace_entries();
            }

            Ok::<_, Error>(hoister.init())
        }).await?;

        let flat_tree = flat_tree.into_iter()
            .map(|(loc, info)| {
                let package
                    = resolver.package_mut(info.pkg);

                package.reference.add_location(loc.clone());

                HoistedPackage {
                    loc,
                    key: info.key,
                    manifest: package.manifest.clone(),
                    is_shallow: info.is_shallow,
                }
            })
            .collect::<Vec<_>>();

        let (lockfile, lockfile_changed)
            = self.save_lockfile_and_integrity(&resolver, &top_level_patterns, &integrity_checker, artifacts).await?;

        Ok(InstallOutcome {
            up_to_date: false,
            top_level_patterns,
            flat_tree,
            lockfile,
            lockfile_changed,
            flat_resolutions,
        })
    }

    /// Decides whether the install can stop right after resolution, either
    /// because the integrity file matches or because there's nothing to
    /// install at all.
    async fn bailout(&self, resolver: &PackageResolver<'_>, patterns: &[Pattern], integrity_checker: &IntegrityChecker<'_>, artifacts: Option<BTreeMap<String, Vec<String>>>) -> Result<bool, Error> {
        let lockfile
            = &resolver.lockfile;

        if self.config.plugnplay || lockfile.parse_result_type.is_none() {
            return Ok(false);
        }

        let lockfile_clean
            = lockfile.parse_result_type == Some(ParseResultType::Success);

        let result = integrity_checker
            .check(patterns, lockfile, IntegrityFlags::from_config(self.config), resolver.workspace_layout).await?;

        if self.config.frozen_lockfile && (!lockfile_clean || !result.missing_patterns.is_empty()) {
            return Err(Error::FrozenLockfileOutdated);
        }

        let have_lockfile
            = tokio::fs::try_exists(self.config.lockfile_folder.join(LOCKFILE_FILENAME)).await?;

        if result.integrity_matches && have_lockfile && lockfile_clean && !lockfile.has_entries_without_integrity() {
            self.report.info("Already up-to-date.");
            return Ok(true);
        }

        if result.integrity_file_missing && have_lockfile {
            return Ok(false);
        }

        if result.hard_refresh_required {
            return Ok(false);
        }

        if patterns.is_empty() && !result.integrity_file_missing {
            self.report.info("Nothing to install.");
            self.save_lockfile_and_integrity(resolver, patterns, integrity_checker, artifacts).await?;
            return Ok(true);
        }

        Ok(false)
    }

    fn mark_ignored(&self, resolver: &mut PackageResolver<'_>, patterns: &[Pattern]) {
        for pattern in patterns {
            let id
                = resolver.get_strict_resolved_pattern(pattern);

            resolver.package_mut(id).reference.ignore = true;
        }
    }

    /// Collapses every package to a single version. Versions listed in the
    /// root `resolutions` win; otherwise the highest version is picked and
    /// recorded so that the next install makes the same choice.
    fn flatten(&self, resolver: &mut PackageResolver<'_>, patterns: &[Pattern], resolutions: &mut IndexMap<String, String>) -> Result<Vec<Pattern>, Error> {
        let mut flattened_patterns
            = vec![];

        for name in resolver.get_all_dependency_names_by_level_order(patterns) {
            let versions = resolver.get_all_info_for_package_name(&name).into_iter()
                .filter(|id| !resolver.package(*id).reference.ignore)
                .map(|id| resolver.package(id).manifest.version.clone())
                .collect::<Vec<_>>();

            match versions.as_slice() {
                [] => continue,

                [_] => {
                    let pattern = resolver.patterns_for_package(&name).first()
                        .expect("Expected a resolved package to have at least one pattern")
                        .clone();

                    flattened_patterns.push(pattern);
                },

                _ => {
                    let version = match resolutions.get(&name) {
                        Some(version) if versions.contains(version) => version.clone(),
                        _ => highest_version(&versions),
                    };

                    log::debug!("Flattening {} to {} (candidates: {})", name, version, versions.join(", "));

                    resolutions.insert(name.clone(), version.clone());
                    flattened_patterns.push(resolver.collapse_all_versions_of_package(&name, &version)?);
                },
            }
        }

        Ok(flattened_patterns)
    }

    /// Writes the integrity file and, unless it would be identical or the
    /// lockfile is frozen, `yarn.lock`. Returns the lockfile content along
    /// with whether it was written.
    async fn save_lockfile_and_integrity(&self, resolver: &PackageResolver<'_>, patterns: &[Pattern], integrity_checker: &IntegrityChecker<'_>, artifacts: Option<BTreeMap<String, Vec<String>>>) -> Result<(String, bool), Error> {
        let workspace_layout
            = resolver.workspace_layout;

        let is_workspace_pattern = |pattern: &Pattern| {
            workspace_layout.is_some_and(|layout| layout.get_manifest_by_pattern(pattern.as_str()).is_some())
        };

        let patterns = patterns.iter()
            .filter(|pattern| !is_workspace_pattern(pattern))
            .cloned()
            .collect::<Vec<_>>();

        let lockfile_based_on_resolver = Lockfile::from_entries(Lockfile::get_lockfile(
            &resolver.lockfile_inputs(|pattern| !is_workspace_pattern(pattern)),
        ));

        self.step(InstallStep::SaveIntegrity, async {
            if self.config.plugnplay {
                return Ok(());
            }

            integrity_checker.save(&patterns, &lockfile_based_on_resolver, IntegrityFlags::from_config(self.config), workspace_layout, artifacts).await
        }).await?;

        self.step(InstallStep::SaveLockfile, async {
            self.save_lockfile(&resolver.lockfile, &lockfile_based_on_resolver, &patterns).await
        }).await
    }

    async fn save_lockfile(&self, lockfile: &Lockfile, lockfile_based_on_resolver: &Lockfile, patterns: &[Pattern]) -> Result<(String, bool), Error> {
        let source
            = lockfile_based_on_resolver.stringify();

        if self.config.frozen_lockfile {
            return Ok((source, false));
        }

        let lockfile_has_all_patterns = patterns.iter()
            .all(|pattern| lockfile.get_locked(pattern.as_str()).is_some());

        let lockfile_patterns_match = lockfile.cache.keys()
            .all(|pattern| lockfile_based_on_resolver.cache.contains_key(pattern));

        let resolver_patterns_are_same_as_in_lockfile = lockfile_based_on_resolver.cache.keys().all(|pattern| {
            let (Some(existing), Some(generated)) = (lockfile.get_locked(pattern.as_str()), lockfile_based_on_resolver.get_locked(pattern.as_str())) else {
                return false;
            };

            existing.resolved == generated.resolved
                && existing.prebuilt_variants == generated.prebuilt_variants
                && (generated.integrity.is_none() || existing.integrity == generated.integrity)
        });

        let unchanged = lockfile.parse_result_type == Some(ParseResultType::Success)
            && lockfile_has_all_patterns
            && lockfile_patterns_match
            && resolver_patterns_are_same_as_in_lockfile
            && !patterns.is_empty();

        if unchanged {
            return Ok((source, false));
        }

        let lockfile_path
            = self.config.lockfile_folder.join(LOCKFILE_FILENAME);

        // Keep the line endings of the file being replaced
        let content = match lockfile.source.contains("\r\n") {
            true => source.replace('\n', "\r\n"),
            false => source.clone(),
        };

        tokio::fs::write(&lockfile_path, content).await?;

        let entry_count = lockfile_based_on_resolver.cache.values()
            .filter(|entry| matches!(entry, LockfileEntry::Full(_)))
            .count();

        self.report.info(format!("Saved lockfile ({} entries).", entry_count));

        Ok((source, true))
    }
}

fn highest_version(versions: &[String]) -> String {
    versions.iter()
        .max_by(|a, b| match (Version::from_file_string(a), Version::from_file_string(b)) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        })
        .cloned()
        .unwrap_or_default()
}
