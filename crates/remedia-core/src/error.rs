//! Error taxonomy for the pipeline.
//!
//! Only [`SchemaError`] and [`IngestError`] ever reach the caller of a batch.
//! Everything else is absorbed at row or job granularity and shows up in the
//! report instead.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::Role;

/// A required semantic role could not be mapped to any input column.
///
/// Fatal: the batch aborts before a single row is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The input has no columns at all.
    #[error("assessment table has no columns")]
    NoColumns,

    /// A single mandatory role is missing.
    #[error("could not find a {role} column (looked for: {})", .aliases.join(", "))]
    MissingRole { role: Role, aliases: Vec<String> },

    /// None of a set of alternative roles resolved.
    #[error("could not find any of the {} columns", join_roles(.roles))]
    MissingAlternatives { roles: Vec<Role> },
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// The tabular input could not be read at all.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("assessment file is empty")]
    Empty,

    #[error("failed to read assessment table: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to open assessment file: {0}")]
    Io(#[from] std::io::Error),
}

/// The stage of a remediation job in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TopicExtraction,
    ContextRetrieval,
    Generation,
    Rendering,
    Delivery,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::TopicExtraction,
        Stage::ContextRetrieval,
        Stage::Generation,
        Stage::Rendering,
        Stage::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TopicExtraction => "topic_extraction",
            Stage::ContextRetrieval => "context_retrieval",
            Stage::Generation => "generation",
            Stage::Rendering => "rendering",
            Stage::Delivery => "delivery",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage: {s}"))
    }
}

/// A job-local failure. Never propagated past the job boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {reason}")]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

impl StageFailure {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    /// Wrap a collaborator error, keeping the full context chain.
    pub fn from_provider(stage: Stage, err: &anyhow::Error) -> Self {
        Self::new(stage, format!("{err:#}"))
    }

    /// A stage that ran past its limit. Whole-second limits read as `30s`,
    /// anything finer as milliseconds.
    pub fn timed_out(stage: Stage, limit: Duration) -> Self {
        if limit.subsec_nanos() == 0 {
            Self::new(stage, ProviderError::Timeout(limit.as_secs()).to_string())
        } else {
            Self::new(stage, format!("request timed out after {}ms", limit.as_millis()))
        }
    }
}

/// Errors that can occur when talking to an external collaborator
/// (retriever, generator, renderer, mailer).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The provider answered but the response carried no usable content.
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent. Surfaced in logs only;
    /// the pipeline never retries inside a batch.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProviderError::AuthenticationFailed(_))
    }
}
