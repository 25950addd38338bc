use futures::future::BoxFuture;

use crate::{
    error::Error,
    exotics::ExoticKind,
    manifest::{Manifest, RegistryName},
    pattern::Pattern,
};

/// Why a dependency got requested, when it isn't a plain dependency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependencyHint {
    Dev,
    Optional,
    Resolution,
    Workspaces,
}

/// A pattern to resolve, along with the chain of package names that led
/// to it (empty for the top-level requests).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRequest {
    pub pattern: Pattern,
    pub registry: RegistryName,
    pub optional: bool,
    pub hint: Option<DependencyHint>,
    pub parent_names: Vec<String>,
}

impl DependencyRequest {
    pub fn new<P: Into<Pattern>>(pattern: P) -> DependencyRequest {
        DependencyRequest {
            pattern: pattern.into(),
            registry: RegistryName::Npm,
            optional: false,
            hint: None,
            parent_names: vec![],
        }
    }

    pub fn with_hint(mut self, hint: DependencyHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_parent_names(mut self, parent_names: Vec<String>) -> Self {
        self.parent_names = parent_names;
        self
    }
}

impl From<Pattern> for DependencyRequest {
    fn from(pattern: Pattern) -> Self {
        DependencyRequest::new(pattern)
    }
}

/// What the fetch layer receives: the request, already split into its
/// name and range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub pattern: Pattern,
    pub name: String,
    pub range: String,
    pub registry: RegistryName,
    pub optional: bool,
    pub exotic: Option<ExoticKind>,
    pub parent_names: Vec<String>,
}

impl FetchRequest {
    pub fn from_request(request: &DependencyRequest, pattern: &Pattern) -> FetchRequest {
        let normalized
            = pattern.normalize();

        FetchRequest {
            pattern: pattern.clone(),
            exotic: pattern.exotic_kind(),
            name: normalized.name,
            range: normalized.range,
            registry: request.registry,
            optional: request.optional,
            parent_names: request.parent_names.clone(),
        }
    }
}

/// Turns a pattern into a manifest. Implementations are free to hit the
/// network, a cache, or (in tests) an in-memory table; the resolver only
/// requires that the returned manifest carries its `version` and, ideally,
/// a `remote` describing where it comes from.
pub trait PackageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: FetchRequest) -> BoxFuture<'a, Result<Manifest, Error>>;
}
