//! Core data model types for remedia.
//!
//! These are the row- and aggregate-level types that flow from ingestion
//! through classification into the remediation engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One input row after column roles have been resolved.
///
/// Cells are kept as raw text, surrounding whitespace included. Interpretation (marks parsing,
/// status classification, timestamp parsing) happens downstream so the
/// record itself never changes once read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRecord {
    /// 0-based index of the data row in the source table.
    pub line: usize,
    pub student_id: String,
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub marks: Option<String>,
    #[serde(default)]
    pub attempt: Option<String>,
}

impl RawRecord {
    /// The grouping key for this row's question: the id when the id column
    /// was resolved, otherwise the literal question text. No normalization is
    /// applied. A blank (empty or whitespace-only) key means the row cannot
    /// be grouped.
    pub fn question_key(&self) -> Option<&str> {
        match &self.question_id {
            Some(id) => Some(id.as_str()),
            None => self.question_text.as_deref(),
        }
        .filter(|k| !k.trim().is_empty())
    }

    /// Human-facing label for the question: text when available, else the id.
    pub fn question_label(&self) -> &str {
        self.question_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.question_id.as_deref())
            .unwrap_or_default()
    }
}

/// Normalized correctness of a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFlag {
    Correct,
    Incorrect,
    Unknown,
}

impl StatusFlag {
    pub fn is_correct(self) -> bool {
        self == StatusFlag::Correct
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFlag::Correct => write!(f, "correct"),
            StatusFlag::Incorrect => write!(f, "incorrect"),
            StatusFlag::Unknown => write!(f, "unknown"),
        }
    }
}

/// The latest attempt for a (student, question) pair, with its derived
/// correctness values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedRow {
    pub record: RawRecord,
    /// Marks contributed by this row (0.0 for unparseable input).
    pub marks: f64,
    pub status: StatusFlag,
}

impl ReducedRow {
    pub fn student_id(&self) -> &str {
        &self.record.student_id
    }

    pub fn question_key(&self) -> &str {
        self.record.question_key().unwrap_or_default()
    }
}

/// Aggregate result for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPerformance {
    pub student_id: String,
    pub total_marks: f64,
    pub total_questions: usize,
    /// Full-precision percentage in `[0, 100]`.
    pub percentage: f64,
}

impl StudentPerformance {
    /// Score as shown to students, e.g. `"2/10"`.
    pub fn score_label(&self) -> String {
        format!("{}/{}", self.total_marks.trunc() as i64, self.total_questions)
    }

    /// Percentage rounded to one decimal for display.
    pub fn display_percentage(&self) -> f64 {
        round1(self.percentage)
    }
}

/// Aggregate result for one question key across all students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPerformance {
    pub question_key: String,
    /// Display label (question text when available).
    pub question: String,
    pub attempts: usize,
    pub correct: usize,
    /// Full-precision success rate in `[0, 100]`.
    pub success_rate: f64,
}

/// A student under the weak-student threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakStudent {
    pub performance: StudentPerformance,
    /// This student's reduced rows that were not classified correct.
    pub failed_questions: Vec<ReducedRow>,
}

impl WeakStudent {
    pub fn student_id(&self) -> &str {
        &self.performance.student_id
    }

    /// Whether there is anything concrete to remediate.
    pub fn is_eligible(&self) -> bool {
        !self.failed_questions.is_empty()
    }

    /// Raw text of each failed question, for topic extraction and prompts.
    pub fn failed_question_texts(&self) -> Vec<String> {
        self.failed_questions
            .iter()
            .map(|row| row.record.question_label().to_string())
            .collect()
    }
}

/// A question under the weak-question threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakQuestion {
    pub question: String,
    pub success_rate: f64,
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question_id: Option<&str>, question_text: Option<&str>) -> RawRecord {
        RawRecord {
            line: 0,
            student_id: "a@x.com".into(),
            question_id: question_id.map(Into::into),
            question_text: question_text.map(Into::into),
            status: None,
            marks: None,
            attempt: None,
        }
    }

    #[test]
    fn question_key_prefers_id() {
        assert_eq!(record(Some("Q1"), Some("What?")).question_key(), Some("Q1"));
        assert_eq!(record(None, Some("What?")).question_key(), Some("What?"));
        assert_eq!(record(Some(""), None).question_key(), None);
        assert_eq!(record(Some(""), Some("What?")).question_key(), None);
        assert_eq!(record(None, Some("  ")).question_key(), None);
        assert_eq!(record(None, Some(" What?")).question_key(), Some(" What?"));
    }

    #[test]
    fn question_label_prefers_text() {
        assert_eq!(record(Some("Q1"), Some("What?")).question_label(), "What?");
        assert_eq!(record(Some("Q1"), Some("")).question_label(), "Q1");
    }

    #[test]
    fn score_label_truncates_marks() {
        let perf = StudentPerformance {
            student_id: "a@x.com".into(),
            total_marks: 2.75,
            total_questions: 10,
            percentage: 27.5,
        };
        assert_eq!(perf.score_label(), "2/10");
        assert_eq!(perf.display_percentage(), 27.5);
    }

    #[test]
    fn round1_behaviour() {
        assert_eq!(round1(66.666_666), 66.7);
        assert_eq!(round1(100.0), 100.0);
        assert_eq!(round1(0.04), 0.0);
    }
}
