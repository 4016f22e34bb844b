use std::fmt;

use thiserror::Error;

use crate::models::Site;

/// Application-wide error types for JobScout.
#[derive(Error, Debug)]
pub enum AppError {
    /// A search request or configuration value was rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or applied.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An HTTP exchange failed after its retry budget was spent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// One source's provider failed or was not registered.
    #[error(transparent)]
    SourceFailed(#[from] SourceExecutionError),

    /// At least one source failed during a search.
    #[error(transparent)]
    SearchFailed(#[from] SearchFailure),

    /// Enrichment failed for a single job. Never escapes the enricher.
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// HTML conversion failed.
    #[error("Cleaner error: {0}")]
    Cleaner(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transport(TransportError::Exhausted { last, .. }) => last.is_transient(),
            AppError::Transport(TransportError::Status { status, .. }) => {
                is_transient_status(*status)
            }
            _ => false,
        }
    }
}

/// HTTP statuses that are considered temporary and therefore retry-eligible.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 501 | 502 | 503 | 504)
}

/// Failure of a single HTTP attempt, before any retry decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    /// Connection reset, aborted mid-flight, or body read interrupted.
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("{0}")]
    Other(String),
}

impl ExchangeError {
    /// Timeouts, resets and aborts are worth another attempt. A refused or
    /// unresolvable connection is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExchangeError::Timeout(_) | ExchangeError::Interrupted(_))
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    /// The exchange kept failing until the retry budget ran out.
    #[error("request to {url} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: ExchangeError,
    },

    /// The exchange completed with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The transport was used after `close()`.
    #[error("transport is closed")]
    Closed,

    /// The underlying connection resources could not be built.
    #[error("failed to build transport: {0}")]
    Build(String),
}

/// One source's provider failed; carries the site and the provider's own error.
#[derive(Debug)]
pub struct SourceExecutionError {
    pub site: Site,
    pub message: String,
    pub cause: Option<Box<AppError>>,
}

impl SourceExecutionError {
    pub fn new(site: Site, message: impl Into<String>) -> Self {
        Self {
            site,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(site: Site, message: impl Into<String>, cause: AppError) -> Self {
        Self {
            site,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl fmt::Display for SourceExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.site, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SourceExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Aggregate failure of a search: every source that failed, in request order.
#[derive(Debug)]
pub struct SearchFailure {
    pub failures: Vec<SourceExecutionError>,
}

impl SearchFailure {
    pub fn sites(&self) -> Vec<Site> {
        self.failures.iter().map(|f| f.site).collect()
    }
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} source(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SearchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
