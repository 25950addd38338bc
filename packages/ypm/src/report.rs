use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportMessage {
    pub severity: Severity,
    pub message: String,
}

/// Collects the user-facing messages produced while resolving and
/// hoisting. Rendering them is the job of whoever owns the terminal; this
/// handle only records them (and mirrors them to the `log` facade).
///
/// Clones share the same underlying buffer.
#[derive(Clone, Debug, Default)]
pub struct Report {
    messages: Arc<Mutex<Vec<ReportMessage>>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, severity: Severity, message: String) {
        self.messages.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ReportMessage {severity, message});
    }

    pub fn info<S: Into<String>>(&self, message: S) {
        let message = message.into();
        log::info!("{}", message);
        self.push(Severity::Info, message);
    }

    pub fn warn<S: Into<String>>(&self, message: S) {
        let message = message.into();
        log::warn!("{}", message);
        self.push(Severity::Warning, message);
    }

    pub fn error<S: Into<String>>(&self, message: S) {
        let message = message.into();
        log::error!("{}", message);
        self.push(Severity::Error, message);
    }

    pub fn messages(&self) -> Vec<ReportMessage> {
        self.messages.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn messages_with(&self, severity: Severity) -> Vec<String> {
        self.messages().into_iter()
            .filter(|message| message.severity == severity)
            .map(|message| message.message)
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages_with(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.messages().iter().any(|message| message.severity == Severity::Error)
    }
}
