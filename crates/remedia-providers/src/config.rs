//! Configuration file loading and collaborator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use remedia_core::classify::Thresholds;
use remedia_core::engine::{EngineConfig, StageTimeouts};
use remedia_core::schema::AliasTable;
use remedia_core::topics::TopicCatalog;
use remedia_core::traits::{Generator, Mailer, Retriever};

use crate::knowledge::KnowledgeBaseRetriever;
use crate::openai::{OpenAiGenerator, DEFAULT_TIMEOUT_SECS};
use crate::outbox::OutboxMailer;

/// Environment variable that overrides the generator API key.
pub const GENERATOR_KEY_ENV: &str = "REMEDIA_GENERATOR_KEY";

/// Text generation backend.
///
/// `Debug` prints the API key as `***`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        referer: Option<String>,
        #[serde(default)]
        app_title: Option<String>,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorConfig::OpenAI {
                api_key: _,
                base_url,
                referer,
                app_title,
                timeout_secs,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("referer", referer)
                .field("app_title", app_title)
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

fn default_http_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Context source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrieverConfig {
    /// JSON file of `{"title", "text"}` passages.
    KnowledgeBase { path: PathBuf },
}

/// Message transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MailerConfig {
    Outbox {
        dir: PathBuf,
        #[serde(default)]
        sender_address: Option<String>,
    },
}

/// Per-stage timeouts in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_retrieval_timeout")]
    pub context_retrieval_secs: u64,
    #[serde(default = "default_generation_timeout")]
    pub generation_secs: u64,
    #[serde(default = "default_rendering_timeout")]
    pub rendering_secs: u64,
    #[serde(default = "default_delivery_timeout")]
    pub delivery_secs: u64,
}

fn default_retrieval_timeout() -> u64 {
    30
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_rendering_timeout() -> u64 {
    30
}
fn default_delivery_timeout() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            context_retrieval_secs: default_retrieval_timeout(),
            generation_secs: default_generation_timeout(),
            rendering_secs: default_rendering_timeout(),
            delivery_secs: default_delivery_timeout(),
        }
    }
}

impl From<TimeoutConfig> for StageTimeouts {
    fn from(t: TimeoutConfig) -> Self {
        StageTimeouts {
            context_retrieval: Duration::from_secs(t.context_retrieval_secs),
            generation: Duration::from_secs(t.generation_secs),
            rendering: Duration::from_secs(t.rendering_secs),
            delivery: Duration::from_secs(t.delivery_secs),
        }
    }
}

/// Top-level remedia configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediaConfig {
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub retriever: Option<RetrieverConfig>,
    #[serde(default)]
    pub mailer: Option<MailerConfig>,
    /// Model passed to the generator.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Max concurrent remediation jobs.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Passages requested per topic.
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    /// Overall wall-clock limit for a batch's fan-out.
    #[serde(default)]
    pub batch_deadline_secs: Option<u64>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Replaces the built-in topic catalog.
    #[serde(default)]
    pub catalog: Option<TopicCatalog>,
    /// Replaces the built-in column alias table.
    #[serde(default)]
    pub aliases: Option<AliasTable>,
}

fn default_model() -> String {
    EngineConfig::default().model
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    3000
}
fn default_parallelism() -> usize {
    4
}
fn default_retrieval_limit() -> usize {
    3
}
fn default_sender_name() -> String {
    "Tata Strive Learning Team".to_string()
}

impl Default for RemediaConfig {
    fn default() -> Self {
        Self {
            generator: None,
            retriever: None,
            mailer: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            parallelism: default_parallelism(),
            retrieval_limit: default_retrieval_limit(),
            sender_name: default_sender_name(),
            batch_deadline_secs: None,
            timeouts: TimeoutConfig::default(),
            thresholds: Thresholds::default(),
            catalog: None,
            aliases: None,
        }
    }
}

impl RemediaConfig {
    /// Engine settings derived from this file.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            parallelism: self.parallelism,
            timeouts: self.timeouts.into(),
            batch_deadline: self.batch_deadline_secs.map(Duration::from_secs),
            retrieval_limit: self.retrieval_limit,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            sender_name: self.sender_name.clone(),
            catalog: self.catalog.clone().unwrap_or_default(),
            thresholds: self.thresholds,
            aliases: self.aliases.clone().unwrap_or_default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Resolve env vars in every string a user is likely to template.
fn resolve_config(config: &mut RemediaConfig) {
    if let Some(GeneratorConfig::OpenAI {
        api_key,
        base_url,
        referer,
        app_title,
        ..
    }) = &mut config.generator
    {
        *api_key = resolve_env_vars(api_key);
        for value in [base_url, referer, app_title].into_iter().flatten() {
            *value = resolve_env_vars(value);
        }
    }
    if let Some(RetrieverConfig::KnowledgeBase { path }) = &mut config.retriever {
        *path = resolve_path(path);
    }
    if let Some(MailerConfig::Outbox {
        dir,
        sender_address,
    }) = &mut config.mailer
    {
        *dir = resolve_path(dir);
        if let Some(address) = sender_address {
            *address = resolve_env_vars(address);
        }
    }
    config.sender_name = resolve_env_vars(&config.sender_name);
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `remedia.toml` in the current directory
/// 2. `~/.config/remedia/config.toml`
///
/// Environment variable override: `REMEDIA_GENERATOR_KEY`.
pub fn load_config() -> Result<RemediaConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RemediaConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("remedia.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<RemediaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => RemediaConfig::default(),
    };

    if let Ok(key) = std::env::var(GENERATOR_KEY_ENV) {
        match &mut config.generator {
            Some(GeneratorConfig::OpenAI { api_key, .. }) => *api_key = key,
            None => {
                config.generator = Some(GeneratorConfig::OpenAI {
                    api_key: key,
                    base_url: None,
                    referer: None,
                    app_title: None,
                    timeout_secs: default_http_timeout(),
                })
            }
        }
    }

    resolve_config(&mut config);
    anyhow::ensure!(config.parallelism > 0, "parallelism must be at least 1");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("remedia"))
}

/// Create a generator from its configuration.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>> {
    match config {
        GeneratorConfig::OpenAI {
            api_key,
            base_url,
            referer,
            app_title,
            timeout_secs,
        } => {
            anyhow::ensure!(!api_key.is_empty(), "generator api_key is empty");
            let generator = OpenAiGenerator::new(api_key, base_url.clone(), *timeout_secs)?
                .with_attribution(referer.clone(), app_title.clone());
            Ok(Arc::new(generator))
        }
    }
}

/// Create a retriever from its configuration.
pub fn create_retriever(config: &RetrieverConfig) -> Result<Arc<dyn Retriever>> {
    match config {
        RetrieverConfig::KnowledgeBase { path } => {
            Ok(Arc::new(KnowledgeBaseRetriever::from_path(path)?))
        }
    }
}

/// Create a mailer from its configuration.
pub fn create_mailer(config: &MailerConfig, sender_name: &str) -> Arc<dyn Mailer> {
    match config {
        MailerConfig::Outbox {
            dir,
            sender_address,
        } => {
            let mut mailer = OutboxMailer::new(dir.clone(), sender_name);
            if let Some(address) = sender_address {
                mailer = mailer.with_sender_address(address.clone());
            }
            Arc::new(mailer)
        }
    }
}
