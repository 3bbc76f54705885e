//! Question text cleanup and keyword → topic lookup.
//!
//! The [`TopicCatalog`] is read-only reference data handed to the engine per
//! batch. Reloading it is done between batches by building a new config.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

fn instruction_tail_pattern() -> &'static Regex {
    static TAIL: OnceLock<Regex> = OnceLock::new();
    TAIL.get_or_init(|| Regex::new(r"(?s)Select the correct option\..*$").expect("valid tail regex"))
}

/// Replace the export's placeholder tokens and drop HTML tags.
pub fn strip_markup(text: &str) -> String {
    let text = text
        .replace("<DOUBLE_QUOTES>", "\"")
        .replace("<COMMA>", ",")
        .replace("<br>", " ");
    tag_pattern().replace_all(&text, "").into_owned()
}

/// Question text as shown in emails: markup removed, capped at 100 chars.
pub fn clean_question_text(text: &str) -> String {
    let clean = strip_markup(text);
    let clean = clean.trim();
    if clean.chars().count() > 100 {
        let head: String = clean.chars().take(100).collect();
        format!("{head}...")
    } else {
        clean.to_string()
    }
}

/// One keyword rule. Keywords match case-insensitively as substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    pub keyword: String,
    pub topic: String,
}

/// Subject-specific keyword → topic lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCatalog {
    /// Subject prefix for every label, e.g. "Front Desk Associate".
    pub subject: String,
    /// Topic used when no keyword matches.
    pub fallback: String,
    /// Rules checked in order; the first hit wins.
    #[serde(default)]
    pub rules: Vec<TopicRule>,
}

impl Default for TopicCatalog {
    fn default() -> Self {
        let rules = [
            ("hotel", "hotel definition and types"),
            ("restaurant", "restaurant and food service"),
            ("hospitality", "hospitality industry basics"),
            ("sarai", "traditional accommodation types in India"),
            ("dharamshala", "traditional accommodation types in India"),
            ("front office", "front office department and management"),
            ("city hotels", "hotel classifications and types"),
            ("thinnai", "traditional Indian hospitality culture"),
            ("independence", "history of hotel industry in India"),
            ("boat houses", "resort hotels and specialized accommodations"),
            ("dal lake", "resort hotels and specialized accommodations"),
        ]
        .into_iter()
        .map(|(keyword, topic)| TopicRule {
            keyword: keyword.to_string(),
            topic: topic.to_string(),
        })
        .collect();

        Self {
            subject: "Front Desk Associate".to_string(),
            fallback: "hospitality basics".to_string(),
            rules,
        }
    }
}

impl TopicCatalog {
    /// Map raw question text to a topic label.
    pub fn topic_for(&self, question_text: &str) -> String {
        let clean = strip_markup(question_text);
        let clean = instruction_tail_pattern().replace(&clean, "");
        // Only the stem before the first question mark is considered.
        let stem = clean.split('?').next().unwrap_or_default().to_lowercase();

        let topic = self
            .rules
            .iter()
            .find(|rule| stem.contains(&rule.keyword.to_lowercase()))
            .map(|rule| rule.topic.as_str())
            .unwrap_or(self.fallback.as_str());

        format!("{} {}", self.subject, topic)
    }

    /// Distinct topics for a set of questions, in first-seen order.
    pub fn distinct_topics<S: AsRef<str>>(&self, questions: &[S]) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for question in questions {
            let topic = self.topic_for(question.as_ref());
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_placeholders() {
        assert_eq!(
            strip_markup("<p>Which is a <b>sarai</b><COMMA> exactly<DOUBLE_QUOTES></p>"),
            "Which is a sarai, exactly\""
        );
        assert_eq!(strip_markup("line one<br>line two"), "line one line two");
    }

    #[test]
    fn clean_question_truncates() {
        let long = "a".repeat(150);
        let clean = clean_question_text(&long);
        assert_eq!(clean.len(), 103);
        assert!(clean.ends_with("..."));
        assert_eq!(clean_question_text("  <i>Short?</i> "), "Short?");
    }

    #[test]
    fn keyword_maps_to_subject_topic() {
        let catalog = TopicCatalog::default();
        assert_eq!(
            catalog.topic_for("<p>What is a Dharamshala?</p>"),
            "Front Desk Associate traditional accommodation types in India"
        );
        assert_eq!(
            catalog.topic_for("Boat houses are common on which lake?"),
            "Front Desk Associate resort hotels and specialized accommodations"
        );
    }

    #[test]
    fn text_after_question_mark_is_ignored() {
        let catalog = TopicCatalog::default();
        assert_eq!(
            catalog.topic_for("Who greets guests? Hint: the hotel lobby"),
            "Front Desk Associate hospitality basics"
        );
        assert_eq!(
            catalog.topic_for("Name the department. Select the correct option. A) hotel"),
            "Front Desk Associate hospitality basics"
        );
    }

    #[test]
    fn unmatched_text_falls_back() {
        let catalog = TopicCatalog::default();
        assert_eq!(
            catalog.topic_for("Q17"),
            "Front Desk Associate hospitality basics"
        );
    }

    #[test]
    fn distinct_topics_deduplicate_in_order() {
        let catalog = TopicCatalog::default();
        let topics = catalog.distinct_topics(&[
            "What is a sarai?",
            "Define a hotel?",
            "Where are dharamshalas found?",
        ]);
        assert_eq!(
            topics,
            vec![
                "Front Desk Associate traditional accommodation types in India",
                "Front Desk Associate hotel definition and types",
            ]
        );
    }

    #[test]
    fn custom_catalog_deserializes() {
        let catalog: TopicCatalog = serde_json::from_value(serde_json::json!({
            "subject": "Computer Basics",
            "fallback": "fundamentals",
            "rules": [{"keyword": "RAM", "topic": "memory"}]
        }))
        .unwrap();
        assert_eq!(catalog.topic_for("What is RAM?"), "Computer Basics memory");
        assert_eq!(catalog.topic_for("What is a CPU?"), "Computer Basics fundamentals");
    }
}
