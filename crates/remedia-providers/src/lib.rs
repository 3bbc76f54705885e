//! remedia-providers — Collaborator adapters and configuration.
//!
//! Implements the `Generator`, `Retriever` and `Mailer` traits from
//! `remedia-core` against an OpenAI-compatible chat API, a local JSON
//! knowledge base and an on-disk outbox, plus in-memory mocks for tests.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod mock;
pub mod openai;
pub mod outbox;

pub use config::{load_config, load_config_from, GeneratorConfig, MailerConfig, RemediaConfig, RetrieverConfig};
pub use error::ProviderError;
