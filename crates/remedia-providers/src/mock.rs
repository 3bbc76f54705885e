//! Mock collaborators for testing the engine without real services.
//!
//! Each mock counts its calls, can be slowed down with a fixed delay and can
//! be told to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use remedia_core::traits::{
    EmailMessage, GenerateRequest, GenerateResponse, Generator, Mailer, RenderedDocument,
    Renderer, RetrievedContext, Retriever, SendOutcome,
};

use crate::error::ProviderError;

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Returns the same passage for every topic.
pub struct MockRetriever {
    text: String,
    fail_with: Option<String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
    topics: Mutex<Vec<String>>,
}

impl MockRetriever {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_with: None,
            delay: None,
            call_count: AtomicU32::new(0),
            topics: Mutex::new(Vec::new()),
        }
    }

    /// A retriever that never finds anything.
    pub fn empty() -> Self {
        Self::with_text("")
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::empty()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Topics requested so far, in call order.
    pub fn topics(&self) -> Vec<String> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, topic: &str, _limit: usize) -> anyhow::Result<RetrievedContext> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.to_string());
        pause(self.delay).await;

        if let Some(message) = &self.fail_with {
            return Err(ProviderError::NetworkError(message.clone()).into());
        }
        Ok(RetrievedContext {
            text: self.text.clone(),
            sources: if self.text.is_empty() {
                vec![]
            } else {
                vec!["mock.pdf".to_string()]
            },
        })
    }
}

/// Returns a fixed response, or fails for prompts mentioning given students.
pub struct MockGenerator {
    response: String,
    fail_for: HashSet<String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockGenerator {
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_for: HashSet::new(),
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail with an HTTP 500 whenever the system prompt contains `student`.
    pub fn failing_for(mut self, student: &str) -> Self {
        self.fail_for.insert(student.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        pause(self.delay).await;

        if self
            .fail_for
            .iter()
            .any(|s| request.system_prompt.contains(&format!("Student: {s}\n")))
        {
            return Err(ProviderError::ApiError {
                status: 500,
                message: "mock generation failure".into(),
            }
            .into());
        }

        Ok(GenerateResponse {
            content: self.response.clone(),
            model: request.model.clone(),
            latency_ms: 1,
        })
    }
}

/// Wraps the content in a trivial HTML page.
pub struct MockRenderer {
    fail_with: Option<String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn render_document(&self, content: &str, title: &str) -> anyhow::Result<RenderedDocument> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        pause(self.delay).await;

        if let Some(message) = &self.fail_with {
            anyhow::bail!("{message}");
        }
        Ok(RenderedDocument {
            bytes: format!("<h1>{title}</h1>\n{content}").into_bytes(),
            content_type: "text/html".into(),
            extension: "html".into(),
        })
    }
}

/// Records every message; rejects configured recipients.
pub struct MockMailer {
    reject: HashSet<String>,
    delay: Option<Duration>,
    call_count: AtomicU32,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self {
            reject: HashSet::new(),
            delay: None,
            call_count: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(mut self, recipient: &str) -> Self {
        self.reject.insert(recipient.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, message: &EmailMessage) -> SendOutcome {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        pause(self.delay).await;

        if self.reject.contains(&message.to) {
            return SendOutcome::failed(format!("mailbox unavailable: {}", message.to));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        SendOutcome::sent("accepted")
    }
}
