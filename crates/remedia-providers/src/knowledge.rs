//! Local knowledge-base retriever.
//!
//! Passages are loaded once from a JSON file and ranked by how many distinct
//! topic terms they contain. Good enough for small course packs; vector
//! search stays outside this crate.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use remedia_core::traits::{RetrievedContext, Retriever};

/// Separator placed between passages of one topic.
pub const PASSAGE_SEPARATOR: &str = "\n---\n";

/// Words too common to say anything about relevance.
const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "from", "into", "that", "this", "what", "which", "are", "its",
];

/// One passage of course material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Source document title, reported back as a source.
    pub title: String,
    pub text: String,
}

/// Keyword-overlap retriever over in-memory passages.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseRetriever {
    passages: Vec<Passage>,
    terms: Vec<HashSet<String>>,
}

impl KnowledgeBaseRetriever {
    pub fn from_passages(passages: Vec<Passage>) -> Self {
        let terms = passages
            .iter()
            .map(|p| terms(&format!("{} {}", p.title, p.text)))
            .collect();
        Self { passages, terms }
    }

    /// Load a JSON array of `{"title", "text"}` objects.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read knowledge base: {}", path.display()))?;
        let passages: Vec<Passage> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse knowledge base: {}", path.display()))?;
        tracing::info!(passages = passages.len(), path = %path.display(), "knowledge base loaded");
        Ok(Self::from_passages(passages))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Indices of the best `limit` passages for `query`, best first. Ties
    /// keep file order.
    fn rank(&self, query: &str, limit: usize) -> Vec<usize> {
        let wanted = terms(query);
        let mut scored: Vec<(usize, usize)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, have)| (i, wanted.intersection(have).count()))
            .filter(|&(_, score)| score > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().take(limit).map(|(i, _)| i).collect()
    }
}

/// Lowercased alphanumeric words of at least three characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    fn name(&self) -> &str {
        "knowledge-base"
    }

    async fn fetch(&self, topic: &str, limit: usize) -> Result<RetrievedContext> {
        let hits = self.rank(topic, limit);
        tracing::debug!(topic, hits = hits.len(), "knowledge base query");

        let mut sources: Vec<String> = Vec::new();
        let text = hits
            .iter()
            .map(|&i| {
                let passage = &self.passages[i];
                if !sources.contains(&passage.title) {
                    sources.push(passage.title.clone());
                }
                passage.text.as_str()
            })
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);

        Ok(RetrievedContext { text, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(title: &str, text: &str) -> Passage {
        Passage {
            title: title.into(),
            text: text.into(),
        }
    }

    fn retriever() -> KnowledgeBaseRetriever {
        KnowledgeBaseRetriever::from_passages(vec![
            passage("Module 1.pdf", "A hotel provides lodging, food and services to guests."),
            passage(
                "Module 2.pdf",
                "Traditional accommodation types in India include the sarai and the dharamshala.",
            ),
            passage("Module 2.pdf", "Dharamshala accommodation is found near pilgrimage sites in India."),
            passage("Module 4.pdf", "The front office department handles check-in."),
        ])
    }

    #[tokio::test]
    async fn ranks_by_term_overlap() {
        let ctx = retriever()
            .fetch("Front Desk Associate traditional accommodation types in India", 3)
            .await
            .unwrap();
        let parts: Vec<&str> = ctx.text.split(PASSAGE_SEPARATOR).collect();
        assert!(parts[0].starts_with("Traditional accommodation types"));
        assert!(parts[1].starts_with("Dharamshala"));
        assert_eq!(ctx.sources, vec!["Module 2.pdf".to_string(), "Module 4.pdf".to_string()]);
    }

    #[tokio::test]
    async fn limit_is_respected() {
        let ctx = retriever().fetch("accommodation india hotel", 1).await.unwrap();
        assert!(!ctx.text.contains(PASSAGE_SEPARATOR));
        assert_eq!(ctx.sources.len(), 1);
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let ctx = retriever().fetch("quantum chromodynamics", 3).await.unwrap();
        assert!(ctx.is_empty());
        assert!(ctx.sources.is_empty());
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"[{"title": "Intro.pdf", "text": "Hospitality means welcoming guests."}]"#,
        )
        .unwrap();

        let kb = KnowledgeBaseRetriever::from_path(&path).unwrap();
        assert_eq!(kb.len(), 1);
        assert!(KnowledgeBaseRetriever::from_path(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn stopwords_and_short_words_ignored() {
        let t = terms("What is the Front-Office of a hotel?");
        assert!(t.contains("front"));
        assert!(t.contains("office"));
        assert!(t.contains("hotel"));
        assert!(!t.contains("what"));
        assert!(!t.contains("is"));
    }
}
