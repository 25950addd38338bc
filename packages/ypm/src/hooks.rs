use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstallStep {
    IntegrityCheck,
    Resolve,
    CompatibilityCheck,
    Hoist,
    SaveLockfile,
    SaveIntegrity,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStep::IntegrityCheck => "integrity-check",
            InstallStep::Resolve => "resolve",
            InstallStep::CompatibilityCheck => "compatibility-check",
            InstallStep::Hoist => "hoist",
            InstallStep::SaveLockfile => "save-lockfile",
            InstallStep::SaveIntegrity => "save-integrity",
        };

        f.write_str(name)
    }
}

/// Callbacks invoked around each step of the install pipeline. Embedders
/// (plugins, profilers, tests) pass their implementation to `Install`.
pub trait Hooks: Send + Sync {
    fn before_step(&self, _step: InstallStep) {}

    fn after_step(&self, _step: InstallStep) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {}
