use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArkError {
    #[error("Lexical error at {line}:{col}: {message}")]
    Lexical { message: String, line: usize, col: usize },
    #[error("Parse error at {line}:{col}: {message}")]
    Parse { message: String, line: usize, col: usize },
    #[error("Structure error: {0}")]
    Structure(String),
    #[error("Unresolved reference: ${{{0}}}")]
    Unresolved(String),
    #[error("Ambiguous match in {namespace}: {}", .candidates.join(", "))]
    Ambiguous { namespace: String, candidates: Vec<String> },
    #[error("Construction error: {0}")]
    Construction(String),
    #[error("Duplicate name in {namespace}: {name}")]
    DuplicateName { namespace: String, name: String },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ArkError>;

// Helper conversions
impl From<std::io::Error> for ArkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<config::ConfigError> for ArkError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Receives a human-readable report for every failed core operation.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &ArkError);
}

/// The default sink, which forwards reports to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: &ArkError) {
        warn!(%error, "arkconf diagnostic");
    }
}

/// Keeps every report in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, error: &ArkError) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.to_string());
    }
}
