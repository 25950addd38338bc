use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use futures::{future::BoxFuture, FutureExt};
use indexmap::IndexMap;
use ypm_semver::{Range, Version};
use ypm_utils::FromFileString;

use crate::{
    error::Error,
    fetcher::{FetchRequest, PackageFetcher},
    manifest::{Manifest, PackageRemote, RemoteType},
    pattern::Pattern,
    sri::Integrity,
};

/// Routes `log` output through the test harness; safe to call from every
/// test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn tarball_url(name: &str, version: &str) -> String {
    let basename = name.rsplit('/').next().unwrap_or(name);
    format!("https://registry.example/{}/-/{}-{}.tgz", name, basename, version)
}

/// A fake but well-formed integrity value, unique per package version.
pub fn integrity_of(name: &str, version: &str) -> Integrity {
    Integrity::from_file_string(&format!("sha512-{}-{}", name.replace('/', "-"), version))
        .expect("Expected the generated integrity to be valid")
}

pub fn package(name: &str, version: &str, dependencies: &[(&str, &str)]) -> Manifest {
    let mut manifest
        = Manifest::new(name, version);

    manifest.dependencies = dependencies.iter()
        .map(|(name, range)| (name.to_string(), range.to_string()))
        .collect();

    manifest
}

/// A registry living in memory. Every fetch is recorded so that tests can
/// assert on the network traffic an install would have generated.
#[derive(Default)]
pub struct MemoryRegistry {
    packages: IndexMap<String, Vec<Manifest>>,
    exotics: IndexMap<String, Manifest>,
    fetch_count: AtomicUsize,
    fetched: Mutex<Vec<Pattern>>,
}

impl MemoryRegistry {
    pub fn new() -> MemoryRegistry {
        MemoryRegistry::default()
    }

    pub fn with(mut self, manifest: Manifest) -> Self {
        self.add(manifest);
        self
    }

    pub fn with_package(self, name: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        self.with(package(name, version, dependencies))
    }

    pub fn add(&mut self, mut manifest: Manifest) {
        if manifest.remote.is_none() {
            manifest.remote = Some(PackageRemote {
                integrity: Some(integrity_of(&manifest.name, &manifest.version)),
                ..PackageRemote::tarball(&tarball_url(&manifest.name, &manifest.version))
            });
        }

        self.packages.entry(manifest.name.clone())
            .or_default()
            .push(manifest);
    }

    /// Registers a package served from a non-registry range (a local
    /// folder, a git repository).
    pub fn with_exotic(mut self, range: &str, mut manifest: Manifest, remote_type: RemoteType) -> Self {
        manifest.remote = Some(PackageRemote {
            remote_type,
            reference: range.to_string(),
            resolved: match remote_type {
                RemoteType::Copy => None,
                _ => Some(range.to_string()),
            },
            ..PackageRemote::tarball(range)
        });

        self.exotics.insert(range.to_string(), manifest);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<Pattern> {
        self.fetched.lock().unwrap().clone()
    }

    fn lookup(&self, request: &FetchRequest) -> Option<Manifest> {
        if request.exotic.is_some() {
            return self.exotics.get(&request.range).cloned();
        }

        let candidates
            = self.packages.get(&request.name)?;

        let versions = candidates.iter()
            .filter_map(|manifest| Version::from_file_string(&manifest.version).ok())
            .collect::<Vec<_>>();

        let best = match request.range.as_str() {
            "latest" | "*" => versions.iter().max(),
            range => Range::from_file_string(range).ok()?.max_satisfying(&versions),
        }?;

        candidates.iter()
            .find(|manifest| Version::from_file_string(&manifest.version).ok().as_ref() == Some(best))
            .cloned()
    }
}

impl PackageFetcher for MemoryRegistry {
    fn fetch<'a>(&'a self, request: FetchRequest) -> BoxFuture<'a, Result<Manifest, Error>> {
        async move {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            self.fetched.lock().unwrap().push(request.pattern.clone());

            tokio::task::yield_now().await;

            self.lookup(&request)
                .ok_or_else(|| Error::PackageNotFound(request.pattern.to_string()))
        }.boxed()
    }
}
