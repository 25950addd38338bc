use std::{collections::{BTreeMap, HashMap, HashSet, VecDeque}, path::PathBuf};

use indexmap::{IndexMap, IndexSet};

use crate::{
    config::Config,
    error::Error,
    fetcher::DependencyHint,
    pattern::Pattern,
    report::Report,
    resolver::{PackageId, PackageResolver},
    workspace::WorkspaceLayout,
};

pub mod nohoist;

use nohoist::{NohoistResolver, WS_ROOT_ALIAS};

#[cfg(test)]
#[path = "./hoist.test.rs"]
mod hoist_tests;

/// Handle to an entry of the hoister arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HoistId(usize);

/// A package placed somewhere in the install tree. The same package may be
/// seeded several times (once per parent requiring it); duplicates get
/// merged into a single entry while hoisting.
#[derive(Clone, Debug)]
pub struct HoistManifest {
    pub key: String,
    pub parts: Vec<String>,
    pub original_key: String,
    pub pkg: PackageId,
    pub name: String,
    pub loc: String,

    pub is_direct_require: bool,
    pub is_required: bool,
    pub is_incompatible: bool,

    pub is_nohoist: bool,
    pub nohoist_list: Option<Vec<String>>,
    pub original_parent_path: String,

    pub previous_paths: Vec<String>,
    pub history: Vec<String>,

    /// Set on workspace entries installed inside the focused workspace
    /// rather than at the root. `None` means directly in its modules folder,
    /// `Some(workspace)` under that workspace's own modules folder.
    pub shallow_paths: Vec<Option<String>>,
    pub is_shallow: bool,
}

/// One row of `PackageHoister::why`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoistExplanation {
    pub key: String,
    pub original_key: String,
    pub previous_paths: Vec<String>,
    pub history: Vec<String>,
}

pub type FlatTree = Vec<(PathBuf, HoistManifest)>;

fn implode_key(parts: &[String]) -> String {
    parts.join("#")
}

fn with_name(parts: &[String], name: &str) -> Vec<String> {
    let mut parts
        = parts.to_vec();

    parts.push(name.to_string());
    parts
}

/// Flattens the resolved graph into a node_modules layout.
///
/// Every dependency starts right under the package requiring it and is
/// moved up as far as it can go without colliding with a different version
/// of the same package (or shadowing one that a package in between relies
/// on). Packages are processed level by level in a stable order so that the
/// output only depends on the resolved graph.
pub struct PackageHoister<'a> {
    config: &'a Config,
    resolver: &'a PackageResolver<'a>,
    workspace_layout: Option<&'a WorkspaceLayout>,
    ignore_optional: bool,

    infos: Vec<HoistManifest>,
    tree: IndexMap<String, HoistId>,
    tainted_keys: HashMap<String, HoistId>,
    level_queue: Vec<(Pattern, HoistId)>,
    history_counter: usize,

    nohoist_resolver: NohoistResolver<'a>,
}

/// Counts, per package name and version, the distinct parents requiring
/// each version anywhere in the graph.
struct Prepass<'r, 'a> {
    resolver: &'r PackageResolver<'a>,
    visited: HashMap<Pattern, Vec<(PackageId, Vec<PackageId>)>>,
    occurrences: BTreeMap<String, BTreeMap<String, (Pattern, IndexSet<PackageId>)>>,
}

impl<'r, 'a> Prepass<'r, 'a> {
    fn visit_add(&mut self, pkg: PackageId, ancestry: &[PackageId], pattern: &Pattern) {
        let resolver
            = self.resolver;
        let manifest
            = &resolver.package(pkg).manifest;

        let (_, parents) = self.occurrences
            .entry(manifest.name.clone())
            .or_default()
            .entry(manifest.version.clone())
            .or_insert_with(|| (pattern.clone(), IndexSet::new()));

        if let Some(parent) = ancestry.last() {
            parents.insert(*parent);
        }
    }

    fn add(&mut self, pattern: &Pattern, ancestry: &[PackageId], ancestry_patterns: &[Pattern]) {
        let resolver
            = self.resolver;
        let pkg
            = resolver.get_strict_resolved_pattern(pattern);

        if ancestry.contains(&pkg) {
            return;
        }

        if let Some(visited) = self.visited.get(pattern).cloned() {
            for (visited_pkg, visited_ancestry) in visited {
                self.visit_add(visited_pkg, &visited_ancestry, pattern);
            }

            self.visit_add(pkg, ancestry, pattern);
            return;
        }

        self.visit_add(pkg, ancestry, pattern);

        let child_ancestry
            = [ancestry, &[pkg]].concat();

        for dependency in &resolver.package(pkg).reference.dependencies {
            let child_patterns
                = [ancestry_patterns, std::slice::from_ref(dependency)].concat();

            self.add(dependency, &child_ancestry, &child_patterns);
        }

        self.visited.entry(pattern.clone()).or_default().push((pkg, ancestry.to_vec()));

        for ancestry_pattern in ancestry_patterns {
            if let Some(visited) = self.visited.get_mut(ancestry_pattern) {
                visited.push((pkg, ancestry.to_vec()));
            }
        }
    }
}

impl<'a> PackageHoister<'a> {
    pub fn new(config: &'a Config, report: &'a Report, resolver: &'a PackageResolver<'a>, ignore_optional: bool, workspace_layout: Option<&'a WorkspaceLayout>) -> PackageHoister<'a> {
        PackageHoister {
            config,
            resolver,
            workspace_layout,
            ignore_optional,

            infos: vec![],
            tree: IndexMap::new(),
            tainted_keys: HashMap::new(),
            level_queue: vec![],
            history_counter: 0,

            nohoist_resolver: NohoistResolver::new(config, report, workspace_layout),
        }
    }

    pub fn info(&self, id: HoistId) -> &HoistManifest {
        &self.infos[id.0]
    }

    pub fn get(&self, key: &str) -> Option<&HoistManifest> {
        self.tree.get(key).map(|id| &self.infos[id.0])
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.tree.keys()
    }

    fn add_history(&mut self, id: HoistId, message: String) {
        self.history_counter += 1;
        self.infos[id.0].history.push(format!("{}: {}", self.history_counter, message));
    }

    /// Reserves a key for a package. Fails if a different package already
    /// holds it.
    fn taint_key(&mut self, key: &str, id: HoistId) -> bool {
        if let Some(existing) = self.tainted_keys.get(key) {
            if self.infos[existing.0].loc != self.infos[id.0].loc {
                return false;
            }
        }

        self.tainted_keys.insert(key.to_string(), id);
        true
    }

    /// Seeds the tree with the given top-level patterns, then walks the
    /// graph level by level, hoisting each entry as soon as it's added.
    pub fn seed(&mut self, patterns: &[Pattern]) -> Result<(), Error> {
        self.prepass(patterns)?;

        for pattern in self.resolver.dedupe_patterns(patterns) {
            self.seed_pattern(&pattern, true, None)?;
        }

        loop {
            let mut queue
                = std::mem::take(&mut self.level_queue);

            if queue.is_empty() {
                break;
            }

            queue.sort_by(|(a, _), (b, _)| a.cmp(b));

            // Packages whose peer dependencies are seeded in this same level
            // must come after them, or they'd be hoisted past their peers.
            // Peers are matched by package name, so a package becomes
            // available to its dependents as soon as it's been emitted.
            let mut sorted_queue
                = vec![];
            let mut available
                = HashSet::new();

            let mut has_changed
                = true;

            while !queue.is_empty() && has_changed {
                has_changed = false;

                let mut remaining
                    = vec![];

                for item in queue {
                    let manifest
                        = &self.resolver.package(self.resolver.get_strict_resolved_pattern(&item.0)).manifest;

                    if manifest.peer_dependencies.keys().all(|peer| available.contains(peer)) {
                        available.insert(manifest.name.clone());
                        sorted_queue.push(item);
                        has_changed = true;
                    } else {
                        remaining.push(item);
                    }
                }

                queue = remaining;
            }

            sorted_queue.extend(queue);

            for (pattern, parent) in sorted_queue {
                if let Some(id) = self.seed_pattern(&pattern, false, Some(parent))? {
                    self.hoist(id);
                }
            }
        }

        self.propagate_required();

        Ok(())
    }

    fn seed_pattern(&mut self, pattern: &Pattern, is_direct_require: bool, parent: Option<HoistId>) -> Result<Option<HoistId>, Error> {
        let resolver
            = self.resolver;

        let pkg
            = resolver.get_strict_resolved_pattern(pattern);
        let package
            = resolver.package(pkg);

        let is_incompatible
            = package.reference.incompatible;
        let is_marked_as_optional
            = package.reference.is_optional() && self.ignore_optional;

        let mut is_required
            = is_direct_require && !package.reference.ignore && !is_incompatible && !is_marked_as_optional;

        let mut parent_parts
            = vec![];
        let mut parent_nohoist
            = None;

        if let Some(parent) = parent {
            let parent_info
                = &self.infos[parent.0];

            // The parent was merged into another entry, which already
            // brought its own copy of these dependencies
            if !self.tree.contains_key(&parent_info.key) {
                return Ok(None);
            }

            if !is_direct_require && !is_incompatible && parent_info.is_required && !is_marked_as_optional {
                is_required = true;
            }

            parent_parts = parent_info.parts.clone();
            parent_nohoist = Some((parent_info.nohoist_list.clone(), self.nohoist_resolver.original_path(parent_info)));
        }

        let parts
            = with_name(&parent_parts, &package.manifest.name);
        let key
            = implode_key(&parts);

        let id
            = HoistId(self.infos.len());

        self.infos.push(HoistManifest {
            key: key.clone(),
            parts,
            original_key: key.clone(),
            pkg,
            name: package.manifest.name.clone(),
            loc: self.config.module_cache_key(&package.manifest),

            is_direct_require,
            is_required,
            is_incompatible,

            is_nohoist: false,
            nohoist_list: None,
            original_parent_path: String::new(),

            previous_paths: vec![],
            history: vec![],

            shallow_paths: vec![],
            is_shallow: false,
        });

        self.add_history(id, format!("Start position = {}", key));

        self.nohoist_resolver.init_nohoist(&mut self.infos[id.0], &package.manifest, parent_nohoist)?;

        self.tree.insert(key.clone(), id);
        self.taint_key(&key, id);

        // A pattern listed twice only needs one entry; seeding it again
        // would just overwrite the first one at the same key
        let mut pushed
            = HashSet::new();

        for dependency in &package.reference.dependencies {
            if pushed.insert(dependency) {
                self.level_queue.push((dependency.clone(), id));
            }
        }

        Ok(Some(id))
    }

    /// Entries start as ignored unless directly required; this marks as
    /// required everything reachable from a required entry.
    fn propagate_required(&mut self) {
        let resolver
            = self.resolver;

        let mut to_visit = self.tree.values()
            .copied()
            .filter(|id| self.infos[id.0].is_required)
            .collect::<VecDeque<_>>();

        while let Some(id) = to_visit.pop_front() {
            let reference
                = &resolver.package(self.infos[id.0].pkg).reference;

            for dependency in &reference.dependencies {
                let Some(dependency_id) = self.lookup_dependency(id, dependency) else {
                    continue;
                };

                let dependency_reference
                    = &resolver.package(self.infos[dependency_id.0].pkg).reference;

                let is_marked_as_optional
                    = dependency_reference.is_optional()
                        && self.ignore_optional
                        && !(self.infos[id.0].is_required && dependency_reference.hint != Some(DependencyHint::Optional));

                let dependency_info
                    = &self.infos[dependency_id.0];

                if !dependency_info.is_required && !dependency_info.is_incompatible && !is_marked_as_optional {
                    self.infos[dependency_id.0].is_required = true;
                    self.add_history(dependency_id, format!("Mark as non-ignored because of usage by {}", self.infos[id.0].key));
                    to_visit.push_back(dependency_id);
                }
            }
        }
    }

    /// The entry a dependency of the given entry resolves to, following
    /// the node_modules lookup rules.
    fn lookup_dependency(&self, id: HoistId, pattern: &Pattern) -> Option<HoistId> {
        let name
            = &self.resolver.package(self.resolver.get_strict_resolved_pattern(pattern)).manifest.name;

        let parts
            = &self.infos[id.0].parts;

        (0..=parts.len()).rev()
            .find_map(|i| self.tree.get(&implode_key(&with_name(&parts[..i], name))).copied())
    }

    /// Finds the highest position the entry can move to. Returns the new
    /// parts, and whether an identical package already sits there.
    fn get_new_parts(&mut self, key: &str, id: HoistId, mut parts: Vec<String>) -> (Vec<String>, bool) {
        let resolver
            = self.resolver;

        let highest_hoisting_point
            = self.nohoist_resolver.highest_hoisting_point(&self.infos[id.0]);

        let full_key
            = implode_key(&parts);
        let loc
            = self.infos[id.0].loc.clone();

        let Some(name) = parts.pop() else {
            return (parts, false);
        };

        if self.infos[id.0].is_nohoist {
            let boundary
                = implode_key(&parts[..highest_hoisting_point.min(parts.len())]);

            self.add_history(id, format!("Marked as nohoist, will not be hoisted above '{}'", boundary));
        }

        for i in (highest_hoisting_point..parts.len()).rev() {
            let check_parts
                = with_name(&parts[..i], &name);
            let check_key
                = implode_key(&check_parts);

            self.add_history(id, format!("Looked at {} for a match", check_key));

            if let Some(&existing) = self.tree.get(&check_key) {
                if self.infos[existing.0].loc == loc {
                    if !self.infos[existing.0].is_required && self.infos[id.0].is_required {
                        self.add_history(existing, format!("Deduped {} to this item, marking as required", full_key));
                        self.infos[existing.0].is_required = true;
                    } else {
                        self.add_history(existing, format!("Deduped {} to this item", full_key));
                    }

                    return (check_parts, true);
                }

                self.add_history(id, format!("Found a collision at {}", check_key));
                break;
            }

            if let Some(&existing) = self.tainted_keys.get(&check_key) {
                if self.infos[existing.0].loc != loc {
                    self.add_history(id, format!("Broken by {}", check_key));
                    break;
                }
            }
        }

        let peer_dependencies = resolver.package(self.infos[id.0].pkg).manifest.peer_dependencies.keys()
            .cloned()
            .collect::<Vec<_>>();

        let mut stack
            = vec![];
        let mut step_up
            = false;

        'hoist: while parts.len() > highest_hoisting_point {
            for peer in &peer_dependencies {
                let check_key
                    = implode_key(&with_name(&parts, peer));

                self.add_history(id, format!("Looked at {} for a peer dependency match", check_key));

                if self.tree.contains_key(&check_key) {
                    self.add_history(id, format!("Found a peer dependency requirement at {}", check_key));
                    break 'hoist;
                }
            }

            let check_key
                = implode_key(&with_name(&parts, &name));

            if self.tree.contains_key(&check_key) {
                step_up = true;
                break;
            }

            if key != check_key && self.tainted_keys.contains_key(&check_key) {
                step_up = true;
                break;
            }

            if let Some(part) = parts.pop() {
                stack.push(part);
            }
        }

        parts.push(name.clone());

        if !self.is_valid_position(&parts, highest_hoisting_point, &loc) {
            step_up = true;
        }

        while step_up {
            let Some(part) = stack.pop() else {
                break;
            };

            self.add_history(id, format!("Stepping up from {}", implode_key(&parts)));

            parts.pop();
            parts.push(part);
            parts.push(name.clone());

            if self.is_valid_position(&parts, highest_hoisting_point, &loc) {
                self.add_history(id, format!("Found valid position {}", implode_key(&parts)));
                step_up = false;
            }
        }

        (parts, false)
    }

    fn is_valid_position(&self, parts: &[String], highest_hoisting_point: usize, loc: &str) -> bool {
        if parts.len() <= highest_hoisting_point {
            return false;
        }

        let key
            = implode_key(parts);

        if let Some(existing) = self.tree.get(&key) {
            if self.infos[existing.0].loc == loc {
                return true;
            }
        }

        if let Some(existing) = self.tainted_keys.get(&key) {
            if self.infos[existing.0].loc != loc {
                return false;
            }
        }

        true
    }

    fn hoist(&mut self, id: HoistId) {
        let old_key
            = self.infos[id.0].key.clone();
        let raw_parts
            = self.infos[id.0].parts.clone();

        self.tree.shift_remove(&old_key);

        let (parts, is_duplicate)
            = self.get_new_parts(&old_key, id, raw_parts.clone());

        let new_key
            = implode_key(&parts);

        if is_duplicate {
            self.add_history(id, format!("Satisfied from above by {}", new_key));
            self.declare_rename(id, &raw_parts, &parts);

            let original_path
                = self.nohoist_resolver.original_path(&self.infos[id.0]);

            self.update_hoist_history(original_path, &new_key);
            return;
        }

        if old_key == new_key {
            self.add_history(id, "Didn't hoist - see reason above".to_string());
            self.set_key(id, old_key, raw_parts);
            return;
        }

        self.declare_rename(id, &raw_parts, &parts);
        self.set_key(id, new_key, parts);
    }

    fn declare_rename(&mut self, id: HoistId, old_parts: &[String], new_parts: &[String]) {
        let old_parent_parts
            = &old_parts[..old_parts.len().saturating_sub(1)];

        self.taint_parents(id, old_parent_parts, new_parts.len().saturating_sub(1));
    }

    /// Reserves the entry's name at every level between its old and new
    /// position, so that packages below it keep resolving to it.
    fn taint_parents(&mut self, id: HoistId, process_parts: &[String], start: usize) {
        let name
            = self.infos[id.0].name.clone();

        for i in start..process_parts.len() {
            let key
                = implode_key(&with_name(&process_parts[..i], &name));

            if self.taint_key(&key, id) {
                self.add_history(id, format!("Tainted {} to prevent collisions", key));
            }
        }
    }

    fn update_hoist_history(&mut self, from_path: String, to_key: &str) {
        if let Some(&id) = self.tree.get(to_key) {
            self.infos[id.0].previous_paths.push(from_path);
        }
    }

    fn set_key(&mut self, id: HoistId, new_key: String, parts: Vec<String>) {
        let old_key
            = std::mem::replace(&mut self.infos[id.0].key, new_key.clone());

        self.infos[id.0].parts = parts;
        self.tree.insert(new_key.clone(), id);

        if old_key == new_key {
            return;
        }

        let original_path
            = self.nohoist_resolver.original_path(&self.infos[id.0]);

        self.infos[id.0].previous_paths.push(original_path);
        self.add_history(id, format!("New position = {}", new_key));
    }

    /// Seeds at the top level, ahead of the regular walk, the version of
    /// each package that is required by the most parents. Without this the
    /// top-level slot would go to whichever version the walk meets first.
    fn prepass(&mut self, patterns: &[Pattern]) -> Result<(), Error> {
        let mut patterns
            = self.resolver.dedupe_patterns(patterns);

        patterns.sort();

        let mut prepass = Prepass {
            resolver: self.resolver,
            visited: HashMap::new(),
            occurrences: BTreeMap::new(),
        };

        let mut root_package_names
            = HashSet::new();

        for pattern in &patterns {
            let pkg
                = self.resolver.get_strict_resolved_pattern(pattern);

            root_package_names.insert(self.resolver.package(pkg).manifest.name.clone());
            prepass.add(pattern, &[], &[]);
        }

        for (name, versions) in prepass.occurrences {
            if versions.len() == 1 {
                continue;
            }

            if self.tree.contains_key(&name) || root_package_names.contains(&name) {
                continue;
            }

            let mut most_occurrences: Option<(usize, Pattern)>
                = None;

            for (pattern, parents) in versions.into_values() {
                let is_better = match &most_occurrences {
                    Some((count, _)) if *count > 0 => parents.len() > *count,
                    _ => true,
                };

                if is_better {
                    most_occurrences = Some((parents.len(), pattern));
                }
            }

            if let Some((count, pattern)) = most_occurrences {
                if count > 1 {
                    self.seed_pattern(&pattern, false, None)?;
                }
            }
        }

        Ok(())
    }

    /// In focus mode, the focused workspace gets its own copy of the
    /// workspaces it depends on (and of the packages they need that were
    /// hoisted out of them), so that it can be installed without the rest of
    /// the monorepo.
    pub fn mark_shallow_workspace_entries(&mut self) {
        let Some(target_workspace) = self.config.focused_workspace_name.clone() else {
            return;
        };

        let Some(&target_id) = self.tree.get(&target_workspace) else {
            return;
        };

        let dependent_workspaces = self.get_dependent_workspaces(target_id, true, &mut HashSet::new())
            .into_iter()
            .collect::<IndexSet<_>>();

        let entries = self.tree.iter()
            .map(|(key, id)| (key.clone(), *id))
            .collect::<Vec<_>>();

        for (key, id) in entries {
            let split_path
                = key.split('#').collect::<Vec<_>>();

            let is_shallow_dependency = dependent_workspaces.iter().any(|workspace| {
                if split_path[0] != workspace.as_str() {
                    return false;
                }

                let Some(child) = split_path.get(1) else {
                    return true;
                };

                let Some(&workspace_id) = self.tree.get(workspace) else {
                    return false;
                };

                let workspace_manifest
                    = &self.resolver.package(self.infos[workspace_id.0].pkg).manifest;

                !self.infos[id.0].is_nohoist && !workspace_manifest.dev_dependencies.contains_key(*child)
            });

            if is_shallow_dependency {
                self.infos[id.0].shallow_paths = vec![None];
                continue;
            }

            if split_path.len() != 2 || split_path[0] != target_workspace {
                continue;
            }

            let unhoisted_name
                = split_path[1];

            let Some(&unhoisted_id) = self.tree.get(unhoisted_name) else {
                continue;
            };

            for workspace in &dependent_workspaces {
                if self.package_depends_on_hoisted_package(workspace, unhoisted_name, false, &mut HashSet::new()) {
                    self.infos[unhoisted_id.0].shallow_paths.push(Some(workspace.clone()));
                }
            }
        }
    }

    /// The workspaces the given entry depends on, directly or through other
    /// workspaces. Dev dependencies only count for the first level.
    fn get_dependent_workspaces(&self, parent_id: HoistId, allow_dev_deps: bool, already_seen: &mut HashSet<String>) -> Vec<String> {
        let Some(workspace_layout) = self.workspace_layout else {
            return vec![];
        };

        let parent_name
            = self.infos[parent_id.0].name.clone();

        if !already_seen.insert(parent_name.clone()) {
            return vec![];
        }

        let parent_manifest
            = &self.resolver.package(self.infos[parent_id.0].pkg).manifest;

        let search_path
            = format!("/{}/{}", WS_ROOT_ALIAS, parent_name);

        let mut direct_dependencies
            = vec![];
        let mut ignored_workspaces
            = vec![];

        for (workspace_name, entry) in &workspace_layout.workspaces {
            if already_seen.contains(workspace_name) || *workspace_name == workspace_layout.virtual_manifest_name {
                continue;
            }

            if let Some(&nested_id) = self.tree.get(&format!("{}#{}", parent_name, workspace_name)) {
                let nested
                    = &self.infos[nested_id.0];
                let nested_version
                    = &self.resolver.package(nested.pkg).manifest.version;

                if nested.is_nohoist && nested.original_parent_path.starts_with(&search_path) && *nested_version == entry.manifest.version {
                    direct_dependencies.push(nested.key.clone());
                } else {
                    ignored_workspaces.push(workspace_name.clone());
                }

                continue;
            }

            let Some(&workspace_id) = self.tree.get(workspace_name) else {
                continue;
            };

            let required_by_parent = self.infos[workspace_id.0].previous_paths.iter()
                .any(|path| path.starts_with(&search_path));

            if required_by_parent && (allow_dev_deps || !parent_manifest.dev_dependencies.contains_key(workspace_name)) {
                direct_dependencies.push(workspace_name.clone());
            }
        }

        let mut nested_dependencies
            = vec![];

        for dependency in &direct_dependencies {
            if let Some(&dependency_id) = self.tree.get(dependency) {
                nested_dependencies.extend(self.get_dependent_workspaces(dependency_id, false, already_seen));
            }
        }

        direct_dependencies.iter()
            .map(|key| key.rsplit('#').next().unwrap_or(key).to_string())
            .chain(nested_dependencies)
            .filter(|workspace| !ignored_workspaces.contains(workspace))
            .collect()
    }

    fn package_depends_on_hoisted_package(&self, package_name: &str, hoisted_name: &str, check_dev_deps: bool, checked: &mut HashSet<String>) -> bool {
        if checked.contains(package_name) || self.tree.contains_key(&format!("{}#{}", package_name, hoisted_name)) {
            return false;
        }

        checked.insert(package_name.to_string());

        let Some(&id) = self.tree.get(package_name) else {
            return false;
        };

        let manifest
            = &self.resolver.package(self.infos[id.0].pkg).manifest;

        let mut dependencies
            = manifest.dependencies.keys().collect::<Vec<_>>();

        if check_dev_deps {
            dependencies.extend(manifest.dev_dependencies.keys());
        }

        if dependencies.iter().any(|dependency| *dependency == hoisted_name) {
            return true;
        }

        for dependency in dependencies {
            if self.package_depends_on_hoisted_package(dependency, hoisted_name, false, checked) {
                return true;
            }
        }

        false
    }

    /// Computes the on-disk location of every required entry, in tree
    /// order. Entries that were never marked as required are dropped.
    pub fn init(&mut self) -> FlatTree {
        let resolver
            = self.resolver;

        let mut flat_tree
            = vec![];

        let entries = self.tree.iter()
            .map(|(key, id)| (key.clone(), *id))
            .collect::<Vec<_>>();

        for (key, id) in entries {
            if !self.infos[id.0].is_required {
                self.add_history(id, "Deleted as this module was ignored".to_string());
                continue;
            }

            let key_parts
                = key.split('#').collect::<Vec<_>>();

            // The aggregator and the workspaces themselves live in the
            // project; only their dependencies get installed
            if let Some(workspace_layout) = self.workspace_layout {
                if key_parts[0] == workspace_layout.virtual_manifest_name && key_parts.len() <= 2 {
                    continue;
                }
            }

            let folder_of = |prefix: &[&str]| {
                let ancestor
                    = self.tree.get(&prefix.join("#")).map(|id| &self.infos[id.0]);

                let registry = ancestor
                    .map(|ancestor| resolver.package(ancestor.pkg).manifest.registry())
                    .unwrap_or_default();

                self.config.folder_for(registry)
            };

            let mut parts
                = vec![];

            for i in 0..key_parts.len() {
                parts.push(PathBuf::from(folder_of(&key_parts[..=i])));
                parts.push(PathBuf::from(key_parts[i]));
            }

            match &self.config.modules_folder {
                Some(modules_folder) => parts[0] = modules_folder.clone(),
                None => parts.insert(0, self.config.lockfile_folder.clone()),
            }

            let info
                = &self.infos[id.0];

            let mut shallow_locs
                = vec![];

            for shallow_path in &info.shallow_paths {
                let mut shallow_parts
                    = parts.clone();

                shallow_parts[0] = self.config.cwd.clone();

                if self.config.modules_folder.is_some() {
                    shallow_parts.insert(1, PathBuf::from(folder_of(&key_parts[..1])));
                }

                if let Some(shallow_path) = shallow_path {
                    shallow_parts.insert(1, PathBuf::from(folder_of(&[shallow_path.as_str()])));
                    shallow_parts.insert(2, PathBuf::from(shallow_path));
                }

                shallow_locs.push(shallow_parts.iter().collect::<PathBuf>());
            }

            flat_tree.push((parts.iter().collect::<PathBuf>(), info.clone()));

            for shallow_loc in shallow_locs {
                let mut shallow_info
                    = info.clone();

                shallow_info.is_shallow = true;
                flat_tree.push((shallow_loc, shallow_info));
            }
        }

        flat_tree
    }

    /// Explains where every copy of a package ended up and why.
    pub fn why(&self, name: &str) -> Vec<HoistExplanation> {
        self.tree.values()
            .map(|id| &self.infos[id.0])
            .filter(|info| info.name == name)
            .map(|info| HoistExplanation {
                key: info.key.clone(),
                original_key: info.original_key.clone(),
                previous_paths: info.previous_paths.clone(),
                history: info.history.clone(),
            })
            .collect()
    }
}
