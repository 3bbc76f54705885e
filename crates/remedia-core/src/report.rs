//! Delivery results and the batch report, with JSON persistence.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Analysis;
use crate::error::{Stage, StageFailure};
use crate::model::{round1, WeakQuestion, WeakStudent};

/// Terminal outcome of one remediation job.
///
/// Serialized as a plain string: `"Sent"` or `"Failed (<stage>): <reason>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeliveryStatus {
    Sent,
    Failed(StageFailure),
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            DeliveryStatus::Sent => None,
            DeliveryStatus::Failed(failure) => Some(failure.stage),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "Sent"),
            DeliveryStatus::Failed(failure) => {
                write!(f, "Failed ({}): {}", failure.stage, failure.reason)
            }
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Sent" {
            return Ok(DeliveryStatus::Sent);
        }
        let rest = s
            .strip_prefix("Failed (")
            .ok_or_else(|| format!("unrecognized delivery status: {s}"))?;
        let (stage, reason) = rest
            .split_once("): ")
            .ok_or_else(|| format!("malformed failure status: {s}"))?;
        Ok(DeliveryStatus::Failed(StageFailure::new(stage.parse()?, reason)))
    }
}

impl TryFrom<String> for DeliveryStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeliveryStatus> for String {
    fn from(status: DeliveryStatus) -> Self {
        status.to_string()
    }
}

/// One row of `email_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    #[serde(rename = "email")]
    pub student_id: String,
    pub status: DeliveryStatus,
    /// `"marks/questions"`.
    pub score: String,
    /// Rounded to one decimal.
    pub percentage: f64,
}

impl DeliveryResult {
    pub fn new(student: &WeakStudent, status: DeliveryStatus) -> Self {
        Self {
            student_id: student.student_id().to_string(),
            status,
            score: student.performance.score_label(),
            percentage: student.performance.display_percentage(),
        }
    }
}

/// Final report for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Correlates the report with the batch's log lines.
    #[serde(default = "Uuid::nil")]
    pub batch_id: Uuid,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub total_students: usize,
    pub average_score: f64,
    pub emails_sent: usize,
    pub email_results: Vec<DeliveryResult>,
    pub weak_questions: Vec<WeakQuestion>,
    #[serde(default)]
    pub skipped_rows: usize,
    /// True when the batch was cut short by a deadline or shutdown.
    #[serde(default)]
    pub partial: bool,
    /// Students whose jobs were dropped before finishing.
    #[serde(default)]
    pub abandoned: Vec<String>,
}

/// Assemble the report from the analysis and the collected job results.
///
/// `results` must already be in student input order.
pub fn build_report(
    batch_id: Uuid,
    analysis: &Analysis,
    results: Vec<DeliveryResult>,
    abandoned: Vec<String>,
) -> BatchReport {
    let emails_sent = results.iter().filter(|r| r.status.is_sent()).count();
    let weak_questions = analysis
        .weak_questions
        .iter()
        .map(|q| WeakQuestion {
            question: q.question.clone(),
            success_rate: round1(q.success_rate),
        })
        .collect();

    BatchReport {
        batch_id,
        created_at: Utc::now(),
        total_students: analysis.students.len(),
        average_score: round1(analysis.average_score()),
        emails_sent,
        email_results: results,
        weak_questions,
        skipped_rows: analysis.skipped_rows,
        partial: !abandoned.is_empty(),
        abandoned,
    }
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.email_results.len() - self.emails_sent
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: BatchReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} students, average {:.1}%, {} sent, {} failed\n\n",
            self.total_students,
            self.average_score,
            self.emails_sent,
            self.failed_count()
        ));

        if self.partial {
            md.push_str(&format!(
                "> Batch cut short; {} job(s) abandoned: {}\n\n",
                self.abandoned.len(),
                self.abandoned.join(", ")
            ));
        }

        if !self.email_results.is_empty() {
            md.push_str("### Deliveries\n\n");
            md.push_str("| Student | Score | Percentage | Status |\n");
            md.push_str("|---------|-------|------------|--------|\n");
            for r in &self.email_results {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {} |\n",
                    r.student_id, r.score, r.percentage, r.status
                ));
            }
            md.push('\n');
        }

        if !self.weak_questions.is_empty() {
            md.push_str("### Weak Questions\n\n");
            md.push_str("| Question | Success Rate |\n");
            md.push_str("|----------|--------------|\n");
            for q in &self.weak_questions {
                md.push_str(&format!(
                    "| {} | {:.1}% |\n",
                    q.question.replace('|', "\\|"),
                    q.success_rate
                ));
            }
        }

        md
    }
}
