//! Outbox mailer: writes each message and its attachment to a directory.
//!
//! Used for dry runs and for handing messages to an external relay. Every
//! message becomes `<id>.json` (envelope + bodies) next to
//! `<id>-<attachment name>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use remedia_core::traits::{EmailMessage, Mailer, SendOutcome};

/// On-disk form of a queued message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEnvelope {
    pub id: Uuid,
    pub queued_at: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub plain_body: String,
    pub html_body: String,
    pub attachment: OutboxAttachment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxAttachment {
    pub filename: String,
    pub content_type: String,
    /// File name of the stored attachment, relative to the outbox.
    pub stored_as: String,
    pub size: usize,
}

/// Mailer that queues messages as files.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
    sender_name: String,
    sender_address: Option<String>,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>, sender_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            sender_name: sender_name.into(),
            sender_address: None,
        }
    }

    pub fn with_sender_address(mut self, address: impl Into<String>) -> Self {
        self.sender_address = Some(address.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn from_header(&self) -> String {
        match &self.sender_address {
            Some(address) => format!("{} <{}>", self.sender_name, address),
            None => self.sender_name.clone(),
        }
    }

    async fn enqueue(&self, message: &EmailMessage) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create outbox {}", self.dir.display()))?;

        let id = Uuid::new_v4();
        let stored_as = format!("{id}-{}", message.attachment.filename);
        tokio::fs::write(self.dir.join(&stored_as), &message.attachment.bytes)
            .await
            .context("failed to write attachment")?;

        let envelope = OutboxEnvelope {
            id,
            queued_at: Utc::now(),
            from: self.from_header(),
            to: message.to.clone(),
            subject: message.subject.clone(),
            plain_body: message.plain_body.clone(),
            html_body: message.html_body.clone(),
            attachment: OutboxAttachment {
                filename: message.attachment.filename.clone(),
                content_type: message.attachment.content_type.clone(),
                stored_as,
                size: message.attachment.bytes.len(),
            },
        };
        let path = self.dir.join(format!("{id}.json"));
        let json = serde_json::to_string_pretty(&envelope).context("failed to serialize envelope")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Shape check only: a local part, `@`, a dotted domain and no spaces.
fn looks_like_address(to: &str) -> bool {
    match to.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !to.contains(' '),
        None => false,
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, message: &EmailMessage) -> SendOutcome {
        if !looks_like_address(&message.to) {
            return SendOutcome::failed(format!("invalid recipient address: {}", message.to));
        }
        match self.enqueue(message).await {
            Ok(path) => {
                tracing::debug!(to = %message.to, path = %path.display(), "message queued");
                SendOutcome::sent(format!("queued as {}", path.display()))
            }
            Err(e) => {
                tracing::error!(to = %message.to, "outbox write failed: {e:#}");
                SendOutcome::failed(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedia_core::traits::Attachment;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "📚 Your Personalized Study Guide - Front Desk Associate".into(),
            html_body: "<p>hi</p>".into(),
            plain_body: "hi".into(),
            attachment: Attachment {
                filename: "Study_Guide_a.html".into(),
                content_type: "text/html".into(),
                bytes: b"<html>guide</html>".to_vec(),
            },
        }
    }

    #[tokio::test]
    async fn writes_envelope_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = OutboxMailer::new(dir.path().join("outbox"), "Learning Team")
            .with_sender_address("team@example.org");

        let outcome = mailer.send(&message("a@x.com")).await;
        assert!(outcome.success, "{}", outcome.detail);

        let mut envelopes = Vec::new();
        let mut attachments = Vec::new();
        for entry in std::fs::read_dir(mailer.dir()).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().is_some_and(|e| e == "json") {
                envelopes.push(path);
            } else {
                attachments.push(path);
            }
        }
        assert_eq!(envelopes.len(), 1);
        assert_eq!(attachments.len(), 1);

        let envelope: OutboxEnvelope =
            serde_json::from_str(&std::fs::read_to_string(&envelopes[0]).unwrap()).unwrap();
        assert_eq!(envelope.from, "Learning Team <team@example.org>");
        assert_eq!(envelope.to, "a@x.com");
        assert_eq!(envelope.attachment.size, 18);
        assert_eq!(
            std::fs::read(mailer.dir().join(&envelope.attachment.stored_as)).unwrap(),
            b"<html>guide</html>"
        );
    }

    #[tokio::test]
    async fn invalid_recipient_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = OutboxMailer::new(dir.path().join("outbox"), "Team");

        let outcome = mailer.send(&message("student-17")).await;
        assert!(!outcome.success);
        assert!(outcome.detail.contains("invalid recipient"));
        assert!(!mailer.dir().exists());
    }

    #[tokio::test]
    async fn unwritable_outbox_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mailer = OutboxMailer::new(blocker.join("outbox"), "Team");

        let outcome = mailer.send(&message("a@x.com")).await;
        assert!(!outcome.success);
        assert!(outcome.detail.contains("failed to create outbox"));
    }

    #[test]
    fn address_shape() {
        assert!(looks_like_address("asha.k@example.org"));
        assert!(!looks_like_address("@example.org"));
        assert!(!looks_like_address("a@localhost"));
        assert!(!looks_like_address("a b@x.com"));
    }
}
