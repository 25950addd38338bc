use std::collections::{BTreeMap, HashSet, VecDeque};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use ypm_semver::{Range, Version};
use ypm_utils::FromFileString;

use crate::{
    config::Config,
    error::Error,
    exotics::is_exotic,
    fetcher::{DependencyRequest, FetchRequest, PackageFetcher},
    lockfile::{Lockfile, LockfileInput},
    manifest::{Manifest, PackageRemote, RemoteType},
    package_reference::PackageReference,
    pattern::{normalize_pattern, Pattern},
    report::Report,
    resolution_map::{should_update_lockfile, ResolutionMap},
    workspace::WorkspaceLayout,
};

#[cfg(test)]
#[path = "./resolver.test.rs"]
mod resolver_tests;

/// Handle to a package of the resolver arena. Ids are never reused; a
/// pruned package keeps its slot but no pattern points to it anymore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(usize);

#[derive(Clone, Debug)]
pub struct ResolvedPackage {
    pub manifest: Manifest,
    pub reference: PackageReference,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResolverOptions {
    pub is_flat: bool,
    pub is_frozen: bool,
}

type FetchFuture<'a> = BoxFuture<'a, (DependencyRequest, bool, Result<Manifest, Error>)>;

/// A lockfile entry is outdated when it records a version that doesn't
/// satisfy the range it's keyed by anymore (typically after a manual edit
/// of the manifest).
fn is_lockfile_entry_outdated(version: &str, range: &str, has_version: bool) -> bool {
    ypm_semver::is_valid_range(range)
        && ypm_semver::is_valid_version(version)
        && !is_exotic(range)
        && has_version
        && !ypm_semver::satisfies(version, range)
}

fn max_satisfying<'v>(versions: &'v [String], range: &str) -> Option<&'v str> {
    let range
        = Range::from_file_string(range).ok()?;

    let parsed = versions.iter()
        .filter_map(|version| Version::from_file_string(version).ok())
        .collect::<Vec<_>>();

    let best
        = range.max_satisfying(&parsed)?;

    versions.iter()
        .find(|version| Version::from_file_string(version).ok().as_ref() == Some(best))
        .map(String::as_str)
}

fn rcompare(a: &str, b: &str) -> std::cmp::Ordering {
    match (Version::from_file_string(a), Version::from_file_string(b)) {
        (Ok(a), Ok(b)) => b.cmp(&a),
        _ => b.cmp(a),
    }
}

pub struct PackageResolver<'a> {
    config: &'a Config,
    report: &'a Report,
    fetcher: &'a dyn PackageFetcher,

    pub lockfile: Lockfile,
    pub resolution_map: ResolutionMap,
    pub workspace_layout: Option<&'a WorkspaceLayout>,

    packages: Vec<ResolvedPackage>,
    patterns: IndexMap<Pattern, PackageId>,
    patterns_by_package: IndexMap<String, Vec<Pattern>>,

    fetching_patterns: HashSet<Pattern>,
    duplicate_requests: Vec<DependencyRequest>,
    delayed_resolve_queue: Vec<(DependencyRequest, Manifest)>,

    flat: bool,
    frozen: bool,
}

impl<'a> PackageResolver<'a> {
    pub fn new(config: &'a Config, report: &'a Report, fetcher: &'a dyn PackageFetcher, lockfile: Lockfile, resolution_map: ResolutionMap) -> PackageResolver<'a> {
        PackageResolver {
            config,
            report,
            fetcher,

            lockfile,
            resolution_map,
            workspace_layout: None,

            packages: vec![],
            patterns: IndexMap::new(),
            patterns_by_package: IndexMap::new(),

            fetching_patterns: HashSet::new(),
            duplicate_requests: vec![],
            delayed_resolve_queue: vec![],

            flat: false,
            frozen: false,
        }
    }

    pub fn with_workspace_layout(mut self, workspace_layout: Option<&'a WorkspaceLayout>) -> Self {
        self.workspace_layout = workspace_layout;
        self
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Resolves every request and their transitive dependencies.
    ///
    /// Each top-level request is discovered to completion before the next
    /// one starts; within a request, fetches run concurrently. Decisions
    /// that depend on the full candidate set (reusing an existing version,
    /// applying resolutions that weren't available yet) only run once
    /// everything has been discovered.
    pub async fn init(&mut self, requests: Vec<DependencyRequest>, options: ResolverOptions) -> Result<(), Error> {
        self.flat = options.is_flat;
        self.frozen = options.is_frozen;

        for request in requests.iter().cloned() {
            self.discover(request).await?;
        }

        self.resolve_packages_with_existing_versions();
        self.resolve_duplicate_requests();

        loop {
            let delay_queue
                = self.resolution_map.take_delay_queue();

            if delay_queue.is_empty() {
                break;
            }

            for request in delay_queue {
                self.resolve_delayed_resolution(request).await?;
            }
        }

        if self.flat {
            for request in &requests {
                self.optimize_resolutions(&request.pattern.name())?;
            }
        }

        Ok(())
    }

    async fn discover(&mut self, request: DependencyRequest) -> Result<(), Error> {
        let concurrency
            = self.config.network_concurrency.max(1);

        let mut pending
            = VecDeque::from([request]);
        let mut running: FuturesUnordered<FetchFuture<'a>>
            = FuturesUnordered::new();

        loop {
            while running.len() < concurrency {
                let Some(request) = pending.pop_front() else {
                    break;
                };

                if let Some(future) = self.find(request) {
                    running.push(future);
                }
            }

            let Some((request, fresh, result)) = running.next().await else {
                break;
            };

            let manifest
                = result?;

            pending.extend(self.accept(request, fresh, manifest)?);
        }

        Ok(())
    }

    fn find(&mut self, request: DependencyRequest) -> Option<FetchFuture<'a>> {
        let request
            = self.resolve_to_resolution(request)?;

        if !self.fetching_patterns.insert(request.pattern.clone()) {
            self.duplicate_requests.push(request);
            return None;
        }

        let mut fresh
            = false;

        match self.lockfile.get_locked(request.pattern.as_str()) {
            Some(locked) => {
                let normalized
                    = request.pattern.normalize();

                if is_lockfile_entry_outdated(&locked.version, &normalized.range, normalized.has_version) {
                    self.report.warn(format!("Lockfile has incorrect entry for \"{}\". Ignoring it.", request.pattern));
                    self.remove_pattern(&request.pattern);
                    self.lockfile.remove_pattern(request.pattern.as_str());
                    fresh = true;
                }
            },

            None => {
                fresh = true;
            },
        }

        log::debug!("Resolving {} (fresh: {})", request.pattern, fresh);

        Some(self.find_version_info(request, fresh))
    }

    fn find_version_info(&self, request: DependencyRequest, fresh: bool) -> FetchFuture<'a> {
        let fetcher
            = self.fetcher;

        let workspace = match request.pattern.exotic_kind() {
            Some(_) => None,
            None => self.workspace_layout.and_then(|layout| layout.get_manifest_by_pattern(request.pattern.as_str()).map(|entry| (layout, entry))),
        };

        if let Some((layout, entry)) = workspace {
            let manifest
                = entry.manifest.clone();

            let is_focused_away = self.config.focus
                && !request.pattern.as_str().contains(&layout.virtual_manifest_name)
                && !self.config.focused_workspace_name.as_ref().is_some_and(|name| request.pattern.as_str().starts_with(&format!("{}@", name)));

            if !is_focused_away {
                return futures::future::ready((request, fresh, Ok(manifest))).boxed();
            }

            // Workspaces outside of the focus get installed from the registry
            let registry_pattern
                = Pattern::from_parts(&manifest.name, &manifest.version);
            let fetch_request
                = FetchRequest::from_request(&request, &registry_pattern);

            return async move {
                let result = fetcher.fetch(fetch_request).await.map(|registry_manifest| {
                    let mut manifest = manifest;

                    if let Some(remote) = manifest.remote.as_mut() {
                        remote.registry_remote = registry_manifest.remote.map(Box::new);
                    }

                    manifest
                });

                (request, fresh, result)
            }.boxed();
        }

        if let Some(locked) = self.lockfile.get_locked(request.pattern.as_str()) {
            if locked.resolved.is_some() {
                return futures::future::ready((request, fresh, Ok(Manifest::from_locked(&locked)))).boxed();
            }
        }

        let fetch_request
            = FetchRequest::from_request(&request, &request.pattern);

        fetcher.fetch(fetch_request)
            .map(move |result| (request, fresh, result))
            .boxed()
    }

    /// Registers a freshly obtained manifest, unless a package already in
    /// the graph can serve the request. Returns the requests for the
    /// dependencies of the new package.
    fn accept(&mut self, request: DependencyRequest, fresh: bool, mut manifest: Manifest) -> Result<Vec<DependencyRequest>, Error> {
        if !ypm_semver::is_valid_version(&manifest.version) {
            return Err(Error::InvalidPackageVersion(manifest.name, manifest.version));
        }

        manifest.fresh = fresh;
        manifest.clean_dependencies();

        if manifest.uid.is_empty() {
            manifest.uid = manifest.version.clone();
        }

        let normalized
            = request.pattern.normalize();

        let solved_range = match ypm_semver::is_valid_range(&normalized.range) {
            true => manifest.version.clone(),
            false => normalized.range.clone(),
        };

        let existing = match !fresh || self.frozen {
            true => self.get_exact_version_match(&normalized.name, &solved_range, Some(&mut manifest)),
            false => self.get_highest_range_version_match(&normalized.name, &solved_range, Some(&mut manifest)),
        };

        if existing.is_some() {
            self.delayed_resolve_queue.push((request, manifest));
            return Ok(vec![]);
        }

        if manifest.flat && !self.flat {
            return Err(Error::FlatGlobal(manifest.human()));
        }

        let remote = manifest.remote.clone()
            .ok_or_else(|| Error::FetchError(request.pattern.to_string(), "the package has no remote".to_string()))?;

        let mut reference
            = PackageReference::new(&request, &manifest, remote.clone());

        reference.add_optional(request.optional);
        reference.set_fresh(fresh);

        let mut parent_names
            = request.parent_names.clone();
        parent_names.push(normalized.name.clone());

        let make_request = |pattern: Pattern, optional: bool| DependencyRequest {
            pattern,
            registry: remote.registry,
            optional,
            hint: None,
            parent_names: parent_names.clone(),
        };

        let mut dependencies = vec![];

        for pattern in manifest.dependency_patterns() {
            dependencies.push(make_request(pattern, request.optional));
        }

        for pattern in manifest.optional_dependency_patterns() {
            dependencies.push(make_request(pattern, true));
        }

        if remote.remote_type == RemoteType::Workspace && !self.config.production {
            for pattern in manifest.dev_dependency_patterns() {
                dependencies.push(make_request(pattern, false));
            }
        }

        reference.add_dependencies(dependencies.iter().map(|dependency| dependency.pattern.clone()));

        let id
            = self.push_package(manifest, reference);

        self.add_pattern_to_reference(id, request.pattern.clone());

        Ok(dependencies)
    }

    fn push_package(&mut self, manifest: Manifest, reference: PackageReference) -> PackageId {
        let id
            = PackageId(self.packages.len());

        self.packages.push(ResolvedPackage {manifest, reference});

        id
    }

    fn resolve_packages_with_existing_versions(&mut self) {
        for (request, manifest) in std::mem::take(&mut self.delayed_resolve_queue) {
            self.resolve_to_existing_version(&request, manifest);
        }
    }

    fn resolve_to_existing_version(&mut self, request: &DependencyRequest, mut manifest: Manifest) {
        let normalized
            = request.pattern.normalize();

        let solved_range = match ypm_semver::is_valid_range(&normalized.range) {
            true => manifest.version.clone(),
            false => normalized.range.clone(),
        };

        let id = self.get_highest_range_version_match(&normalized.name, &solved_range, Some(&mut manifest))
            .expect("Expected a package matching an existing version to still be resolvable");

        self.packages[id.0].reference.add_request(request);
        self.add_pattern_to_reference(id, request.pattern.clone());
        self.packages[id.0].reference.add_optional(request.optional);
    }

    fn resolve_duplicate_requests(&mut self) {
        for request in std::mem::take(&mut self.duplicate_requests) {
            if let Some(&id) = self.patterns.get(&request.pattern) {
                let reference
                    = &mut self.packages[id.0].reference;

                reference.add_request(&request);
                reference.add_optional(request.optional);
            }
        }
    }

    /// Routes the request to the package forced by the `resolutions` field,
    /// if any. Returns the request back when it must be resolved normally.
    fn resolve_to_resolution(&mut self, request: DependencyRequest) -> Option<DependencyRequest> {
        if request.parent_names.is_empty() || self.flat {
            return Some(request);
        }

        let Some(resolution) = self.resolution_map.find(&request.pattern, &request.parent_names, self.report) else {
            return Some(request);
        };

        match self.get_resolved_pattern(&resolution) {
            Some(id) => {
                self.packages[id.0].reference.push_pattern(request.pattern.clone(), None);
                self.add_pattern(request.pattern.clone(), id);

                let locked
                    = self.lockfile.get_locked(request.pattern.as_str());

                if should_update_lockfile(locked.as_ref(), Some(&self.packages[id.0].reference.remote)) {
                    self.lockfile.remove_pattern(request.pattern.as_str());
                }
            },

            None => {
                self.resolution_map.add_to_delay_queue(request);
            },
        }

        None
    }

    /// Applies a resolution whose target wasn't part of the graph when the
    /// request got discovered. The target itself gets resolved if nothing
    /// else requested it.
    async fn resolve_delayed_resolution(&mut self, request: DependencyRequest) -> Result<(), Error> {
        let Some(resolution) = self.resolution_map.find(&request.pattern, &request.parent_names, self.report) else {
            return Ok(());
        };

        if self.get_resolved_pattern(&resolution).is_none() {
            let target = DependencyRequest {
                pattern: resolution.clone(),
                parent_names: vec![],
                ..request.clone()
            };

            self.discover(target).await?;
            self.resolve_packages_with_existing_versions();
            self.resolve_duplicate_requests();

            if self.get_resolved_pattern(&resolution).is_none() {
                return Err(Error::PackageNotFound(resolution.to_string()));
            }
        }

        self.resolve_to_resolution(request);

        Ok(())
    }

    pub fn get_resolved_pattern(&self, pattern: &Pattern) -> Option<PackageId> {
        self.patterns.get(pattern).copied()
    }

    pub fn get_strict_resolved_pattern(&self, pattern: &Pattern) -> PackageId {
        self.get_resolved_pattern(pattern)
            .unwrap_or_else(|| panic!("Expected {} to have been resolved", pattern))
    }

    pub fn package(&self, id: PackageId) -> &ResolvedPackage {
        &self.packages[id.0]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut ResolvedPackage {
        &mut self.packages[id.0]
    }

    pub fn manifest(&self, pattern: &Pattern) -> Option<&Manifest> {
        self.get_resolved_pattern(pattern)
            .map(|id| &self.packages[id.0].manifest)
    }

    pub fn reference(&self, pattern: &Pattern) -> Option<&PackageReference> {
        self.get_resolved_pattern(pattern)
            .map(|id| &self.packages[id.0].reference)
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&Pattern, PackageId)> {
        self.patterns.iter().map(|(pattern, id)| (pattern, *id))
    }

    pub fn patterns_for_package(&self, name: &str) -> &[Pattern] {
        self.patterns_by_package.get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_new_pattern(&self, pattern: &Pattern) -> bool {
        self.manifest(pattern)
            .is_some_and(|manifest| manifest.fresh)
    }

    pub fn add_pattern(&mut self, pattern: Pattern, id: PackageId) {
        let name
            = self.packages[id.0].manifest.name.clone();

        self.patterns.insert(pattern.clone(), id);

        let by_name
            = self.patterns_by_package.entry(name).or_default();

        if !by_name.contains(&pattern) {
            by_name.push(pattern);
        }
    }

    pub fn remove_pattern(&mut self, pattern: &Pattern) {
        let Some(id) = self.patterns.get(pattern).copied() else {
            return;
        };

        let name
            = &self.packages[id.0].manifest.name;

        if let Some(by_name) = self.patterns_by_package.get_mut(name) {
            by_name.retain(|candidate| candidate != pattern);
        }

        self.patterns.shift_remove(pattern);
    }

    /// Attaches a pattern to a package reference, inheriting the
    /// permissions its lockfile entry granted.
    pub fn add_pattern_to_reference(&mut self, id: PackageId, pattern: Pattern) {
        self.add_pattern(pattern.clone(), id);

        let locked
            = self.lockfile.get_locked(pattern.as_str());

        self.packages[id.0].reference.push_pattern(pattern, locked.as_ref());
    }

    /// Detaches every pattern of a reference from the resolver.
    pub fn prune(&mut self, id: PackageId) {
        for pattern in self.packages[id.0].reference.patterns.clone() {
            self.remove_pattern(&pattern);
        }
    }

    /// Repoints a pattern, e.g. `name` to `name@^1.0.1`.
    pub fn replace_pattern(&mut self, pattern: &Pattern, new_pattern: Pattern) {
        let id = self.get_resolved_pattern(pattern)
            .unwrap_or_else(|| panic!("Expected {} to have been resolved", pattern));

        self.packages[id.0].reference.patterns = vec![new_pattern.clone()];
        self.add_pattern(new_pattern, id);
        self.remove_pattern(pattern);
    }

    /// Swaps the manifest of a package, keeping the fields decided during
    /// resolution.
    pub fn update_manifest(&mut self, id: PackageId, mut manifest: Manifest) {
        let package
            = &mut self.packages[id.0];

        manifest.remote = Some(package.reference.remote.clone());
        manifest.name = package.manifest.name.clone();
        manifest.fresh = package.manifest.fresh;
        manifest.prebuilt_variants = package.manifest.prebuilt_variants.clone();

        package.manifest = manifest;
    }

    pub fn update_manifests<I: IntoIterator<Item = (PackageId, Manifest)>>(&mut self, manifests: I) {
        for (id, mut manifest) in manifests {
            let package
                = &mut self.packages[id.0];

            manifest.prebuilt_variants = package.manifest.prebuilt_variants.clone();
            package.manifest = manifest;
        }
    }

    /// Keeps one pattern per distinct package, in first-seen order.
    pub fn dedupe_patterns<'p, I: IntoIterator<Item = &'p Pattern>>(&self, patterns: I) -> Vec<Pattern> {
        let mut seen
            = HashSet::new();

        patterns.into_iter()
            .filter(|pattern| seen.insert(self.get_resolved_pattern(pattern)))
            .cloned()
            .collect()
    }

    /// Every live package, in resolution order.
    pub fn get_manifests(&self) -> Vec<PackageId> {
        self.patterns.values()
            .copied()
            .unique()
            .collect()
    }

    pub fn get_all_info_for_package_name(&self, name: &str) -> Vec<PackageId> {
        self.get_all_info_for_patterns(self.patterns_for_package(name))
    }

    pub fn get_all_info_for_patterns(&self, patterns: &[Pattern]) -> Vec<PackageId> {
        patterns.iter()
            .filter_map(|pattern| self.get_resolved_pattern(pattern))
            .unique()
            .collect()
    }

    /// Dependencies before their dependents.
    pub fn get_topological_manifests(&self, seed_patterns: &[Pattern]) -> Vec<PackageId> {
        fn add(resolver: &PackageResolver<'_>, patterns: &[Pattern], skip: &mut HashSet<PackageId>, packages: &mut IndexSet<PackageId>) {
            for pattern in patterns {
                let id
                    = resolver.get_strict_resolved_pattern(pattern);

                if !skip.insert(id) {
                    continue;
                }

                add(resolver, &resolver.packages[id.0].reference.dependencies, skip, packages);
                packages.insert(id);
            }
        }

        let mut packages = IndexSet::new();
        add(self, seed_patterns, &mut HashSet::new(), &mut packages);

        packages.into_iter().collect()
    }

    /// Every package of a level before the packages of the next one.
    pub fn get_level_order_manifests(&self, seed_patterns: &[Pattern]) -> Vec<PackageId> {
        fn add(resolver: &PackageResolver<'_>, patterns: &[Pattern], skip: &mut HashSet<PackageId>, packages: &mut IndexSet<PackageId>) {
            let mut level = vec![];

            for pattern in patterns {
                let id
                    = resolver.get_strict_resolved_pattern(pattern);

                if !skip.insert(id) {
                    continue;
                }

                level.push(id);
                packages.insert(id);
            }

            for id in level {
                add(resolver, &resolver.packages[id.0].reference.dependencies, skip, packages);
            }
        }

        let mut packages = IndexSet::new();
        add(self, seed_patterns, &mut HashSet::new(), &mut packages);

        packages.into_iter().collect()
    }

    pub fn get_all_dependency_names_by_level_order(&self, seed_patterns: &[Pattern]) -> Vec<String> {
        self.get_level_order_manifests(seed_patterns).into_iter()
            .map(|id| self.packages[id.0].manifest.name.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// The first package of the given name with exactly this version.
    pub fn get_exact_version_match(&self, name: &str, version: &str, manifest: Option<&mut Manifest>) -> Option<PackageId> {
        let patterns
            = self.patterns_by_package.get(name)?;

        for pattern in patterns {
            let id = self.get_strict_resolved_pattern(pattern);

            if self.packages[id.0].manifest.version == version {
                return Some(id);
            }
        }

        match (manifest, is_exotic(version)) {
            (Some(manifest), true) => self.exotic_range_match(patterns, manifest),
            _ => None,
        }
    }

    /// The package of the given name with the highest version satisfying
    /// the range.
    pub fn get_highest_range_version_match(&self, name: &str, range: &str, manifest: Option<&mut Manifest>) -> Option<PackageId> {
        let patterns
            = self.patterns_by_package.get(name)?;

        let ids = patterns.iter()
            .map(|pattern| self.get_strict_resolved_pattern(pattern))
            .collect::<Vec<_>>();

        let versions = ids.iter()
            .map(|id| self.packages[id.0].manifest.version.clone())
            .collect::<Vec<_>>();

        let Some(max_valid_range) = max_satisfying(&versions, range) else {
            return match (manifest, is_exotic(range)) {
                (Some(manifest), true) => self.exotic_range_match(patterns, manifest),
                _ => None,
            };
        };

        versions.iter()
            .position(|version| version == max_valid_range)
            .map(|index| ids[index])
    }

    /// Local copies are identified by their reference rather than their
    /// version.
    fn exotic_range_match(&self, patterns: &[Pattern], manifest: &mut Manifest) -> Option<PackageId> {
        let remote = manifest.remote.as_ref()
            .filter(|remote| !remote.reference.is_empty() && remote.remote_type == RemoteType::Copy)?;

        let matched = patterns.iter()
            .filter_map(|pattern| self.get_resolved_pattern(pattern))
            .find(|id| {
                self.packages[id.0].manifest.remote.as_ref().is_some_and(|candidate| {
                    candidate.reference == remote.reference && candidate.remote_type == RemoteType::Copy
                })
            })?;

        manifest.remote = self.packages[matched.0].manifest.remote.clone();

        Some(matched)
    }

    /// In flat mode, tries to serve every range of a package with a single
    /// version: the highest one satisfying all of them.
    pub fn optimize_resolutions(&mut self, name: &str) -> Result<(), Error> {
        let patterns
            = self.dedupe_patterns(self.patterns_for_package(name));

        let collapsable_patterns = patterns.into_iter()
            .filter(|pattern| {
                let is_workspace = self.manifest(pattern)
                    .and_then(|manifest| manifest.remote.as_ref())
                    .is_some_and(|remote| remote.remote_type == RemoteType::Workspace);

                self.lockfile.get_locked(pattern.as_str()).is_none() && !is_workspace
            })
            .collect::<Vec<_>>();

        if collapsable_patterns.len() < 2 {
            return Ok(());
        }

        let mut available_versions = self.get_all_info_for_patterns(&collapsable_patterns).into_iter()
            .map(|id| self.packages[id.0].manifest.version.clone())
            .collect::<Vec<_>>();

        available_versions.sort_by(|a, b| rcompare(a, b));

        let ranges = collapsable_patterns.iter()
            .map(|pattern| normalize_pattern(pattern.as_str()).range)
            .collect::<Vec<_>>();

        let target = available_versions.into_iter()
            .find(|version| ranges.iter().all(|range| ypm_semver::satisfies(version, range)));

        if let Some(version) = target {
            self.collapse_package_versions(name, &version, &collapsable_patterns)?;
        }

        Ok(())
    }

    pub fn collapse_all_versions_of_package(&mut self, name: &str, version: &str) -> Result<Pattern, Error> {
        let patterns
            = self.dedupe_patterns(self.patterns_for_package(name));

        self.collapse_package_versions(name, version, &patterns)
    }

    /// Points every given pattern to the package of the given version.
    pub fn collapse_package_versions(&mut self, name: &str, version: &str, patterns: &[Pattern]) -> Result<Pattern, Error> {
        let collapse_to = patterns.iter()
            .filter_map(|pattern| self.get_resolved_pattern(pattern).map(|id| (pattern, id)))
            .find(|(_, id)| self.packages[id.0].manifest.version == version)
            .map(|(pattern, id)| (pattern.clone(), id));

        let Some((collapse_to_pattern, collapse_to_id)) = collapse_to else {
            return Err(Error::CollapseTargetMissing(format!("{}@{}", name, version)));
        };

        for pattern in patterns {
            let id
                = self.get_strict_resolved_pattern(pattern);

            if id == collapse_to_id {
                continue;
            }

            let reference_patterns
                = self.packages[id.0].reference.patterns.clone();

            self.prune(id);

            for reference_pattern in reference_patterns {
                self.add_pattern_to_reference(collapse_to_id, reference_pattern);
            }
        }

        Ok(collapse_to_pattern)
    }

    /// Snapshot of every resolved pattern accepted by the filter, in the
    /// shape needed to write the lockfile.
    pub fn lockfile_inputs<F: Fn(&Pattern) -> bool>(&self, filter: F) -> BTreeMap<Pattern, LockfileInput> {
        self.patterns.iter()
            .filter(|(pattern, _)| filter(pattern))
            .map(|(pattern, id)| {
                let package
                    = &self.packages[id.0];

                (pattern.clone(), LockfileInput {
                    package: package.manifest.to_locked(&package.reference.permissions),
                    remote_key: package.manifest.remote.as_ref().and_then(PackageRemote::remote_key),
                })
            })
            .collect()
    }
}
