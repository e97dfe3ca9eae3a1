use crate::error::{Error, ErrorPolicy, Outcome, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Verbosity {
    None,
    #[default]
    Basic,
    Queue,
    Engine,
    Full,
}

impl Verbosity {
    pub fn enabled(self) -> bool {
        self != Self::None
    }

    fn filter_directive(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Basic => "info",
            Self::Queue | Self::Engine | Self::Full => "trace",
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, severity: Severity, component: &str, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, severity: Severity, component: &str, message: &str) {
        match severity {
            Severity::Verbose => tracing::trace!(component, "{message}"),
            Severity::Debug => tracing::debug!(component, "{message}"),
            Severity::Info => tracing::info!(component, "{message}"),
            Severity::Warn => tracing::warn!(component, "{message}"),
            Severity::Error => tracing::error!(component, "{message}"),
            Severity::Fatal => tracing::error!(component, fatal = true, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub severity: Severity,
    pub component: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<DiagnosticEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.severity == severity)
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, severity: Severity, component: &str, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DiagnosticEntry {
                severity,
                component: component.to_string(),
                message: message.to_string(),
            });
    }
}

#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
    verbosity: Verbosity,
    policy: ErrorPolicy,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("verbosity", &self.verbosity)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink), Verbosity::default(), ErrorPolicy::default())
    }
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>, verbosity: Verbosity, policy: ErrorPolicy) -> Self {
        Self {
            sink,
            verbosity,
            policy,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn emit(&self, severity: Severity, component: &str, message: &str) {
        if self.verbosity.enabled() {
            self.sink.record(severity, component, message);
        }
    }

    pub fn verbose(&self, component: &str, message: &str) {
        self.emit(Severity::Verbose, component, message);
    }

    pub fn info(&self, component: &str, message: &str) {
        self.emit(Severity::Info, component, message);
    }

    pub fn warn(&self, component: &str, message: &str) {
        self.emit(Severity::Warn, component, message);
    }

    pub fn error(&self, component: &str, message: &str) {
        self.emit(Severity::Error, component, message);
    }

    pub fn enforce(&self, component: &str, err: Error) -> Result<()> {
        match self.policy {
            ErrorPolicy::Raise => Err(err),
            ErrorPolicy::Degrade => {
                self.error(component, &err.to_string());
                Ok(())
            }
        }
    }

    /// Like [`Diagnostics::enforce`], but tells the caller the command was
    /// skipped so it can stop before touching any more state.
    pub fn refuse(&self, component: &str, err: Error) -> Result<Outcome> {
        self.enforce(component, err).map(|()| Outcome::Skipped)
    }

    pub fn queue_tier(&self) -> bool {
        matches!(self.verbosity, Verbosity::Queue | Verbosity::Full)
    }

    pub fn engine_tier(&self) -> bool {
        matches!(self.verbosity, Verbosity::Engine | Verbosity::Full)
    }
}

pub fn init_tracing(verbosity: Verbosity) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
