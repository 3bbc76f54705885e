//! Collaborator trait definitions.
//!
//! The engine talks to four external services: a retriever for topical
//! context, a text generator, a document renderer and a mailer. Every client
//! is shared across concurrent jobs, hence the `Send + Sync` bounds.
//! Implementations live in `remedia-providers` and `remedia-report`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Context retrieved for a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Concatenated passage text. Empty when nothing relevant was found.
    pub text: String,
    /// Titles of the source documents the passages came from.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Fetches topical context from a knowledge base.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Return up to `limit` passages for `topic`.
    ///
    /// Must return an empty context, not an error, when nothing matches.
    async fn fetch(&self, topic: &str, limit: usize) -> anyhow::Result<RetrievedContext>;
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Request to produce remediation text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier, interpreted by the provider.
    pub model: String,
    /// System prompt carrying the full instructions and context.
    pub system_prompt: String,
    /// The user turn.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

/// Generated remediation text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
    /// Model that actually produced the response.
    pub model: String,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Text-generation backend.
///
/// Provider failures are reported as `Err`, never as error text inside an
/// `Ok` response, so short but legitimate content is never mistaken for a
/// failure.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// A rendered binary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `text/html`.
    pub content_type: String,
    /// File extension without the dot, e.g. `html`.
    pub extension: String,
}

/// Turns generated text into a document.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render `content` under `title`.
    ///
    /// Must not fail on empty or malformed content; a placeholder page is
    /// rendered instead.
    async fn render_document(&self, content: &str, title: &str) -> anyhow::Result<RenderedDocument>;
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// An attachment on an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A fully composed outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub plain_body: String,
    pub attachment: Attachment,
}

/// Result of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub detail: String,
}

impl SendOutcome {
    pub fn sent(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// Outbound mail transport.
///
/// Failures are returned in the [`SendOutcome`], never raised.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &EmailMessage) -> SendOutcome;
}
