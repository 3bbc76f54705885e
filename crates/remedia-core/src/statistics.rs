//! Per-student and per-question aggregate statistics.
//!
//! Every reduced row contributes a numeric mark and a correctness flag.
//! Rows whose status is not recognized still count toward the student's
//! question total; they simply contribute no marks.

use std::collections::HashMap;

use crate::model::{QuestionPerformance, RawRecord, ReducedRow, StatusFlag, StudentPerformance};

const CORRECT_TOKENS: &[&str] = &["correct", "right", "true", "pass", "passed", "success", "yes", "y", "1"];
const INCORRECT_TOKENS: &[&str] = &["incorrect", "wrong", "false", "fail", "failed", "no", "n", "0"];

/// Map a free-text status cell to a correctness flag.
pub fn classify_status(value: &str) -> StatusFlag {
    let text = value.trim().to_lowercase();
    if text.is_empty() {
        return StatusFlag::Unknown;
    }
    if CORRECT_TOKENS.contains(&text.as_str()) {
        return StatusFlag::Correct;
    }
    if INCORRECT_TOKENS.contains(&text.as_str()) {
        return StatusFlag::Incorrect;
    }
    // "incorrect" contains "correct", so the negative forms go first.
    if ["incorrect", "wrong", "fail"].iter().any(|t| text.contains(t)) {
        return StatusFlag::Incorrect;
    }
    if ["correct", "right"].iter().any(|t| text.contains(t)) {
        return StatusFlag::Correct;
    }
    // Last resort: "yep", "nope", "not attempted".
    if text.starts_with('y') {
        StatusFlag::Correct
    } else if text.starts_with('n') {
        StatusFlag::Incorrect
    } else {
        StatusFlag::Unknown
    }
}

/// Parse a marks cell. Blank, unparseable and non-finite values become 0.0.
pub fn parse_marks(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Attach derived marks and correctness to each reduced record.
///
/// Marks come from the marks column when it was resolved, else from the
/// status (1.0 for correct). The flag comes from the status column when it
/// was resolved, else from the marks (correct iff > 0).
pub fn derive_rows(records: Vec<RawRecord>) -> Vec<ReducedRow> {
    records
        .into_iter()
        .map(|record| {
            let status_flag = record.status.as_deref().map(classify_status);
            let marks = match (&record.marks, status_flag) {
                (Some(raw), _) => parse_marks(raw),
                (None, Some(flag)) if flag.is_correct() => 1.0,
                (None, _) => 0.0,
            };
            let status = status_flag.unwrap_or(if marks > 0.0 {
                StatusFlag::Correct
            } else {
                StatusFlag::Incorrect
            });
            ReducedRow {
                record,
                marks,
                status,
            }
        })
        .collect()
}

/// Compute per-student performance, in order of first appearance.
pub fn student_performance(rows: &[ReducedRow]) -> Vec<StudentPerformance> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
    for row in rows {
        let entry = totals.entry(row.student_id()).or_insert_with(|| {
            order.push(row.student_id());
            (0.0, 0)
        });
        entry.0 += row.marks;
        entry.1 += 1;
    }

    order
        .into_iter()
        .map(|student| {
            let (total_marks, total_questions) = totals[student];
            StudentPerformance {
                student_id: student.to_string(),
                total_marks,
                total_questions,
                percentage: percentage(total_marks, total_questions),
            }
        })
        .collect()
}

/// Compute per-question success rates, in order of first appearance.
pub fn question_performance(rows: &[ReducedRow]) -> Vec<QuestionPerformance> {
    let mut order: Vec<&str> = Vec::new();
    let mut tallies: HashMap<&str, (usize, usize, &str)> = HashMap::new();
    for row in rows {
        let entry = tallies.entry(row.question_key()).or_insert_with(|| {
            order.push(row.question_key());
            (0, 0, row.record.question_label())
        });
        entry.0 += 1;
        if row.status.is_correct() {
            entry.1 += 1;
        }
    }

    order
        .into_iter()
        .map(|key| {
            let (attempts, correct, label) = tallies[key];
            QuestionPerformance {
                question_key: key.to_string(),
                question: label.to_string(),
                attempts,
                correct,
                success_rate: 100.0 * correct as f64 / attempts as f64,
            }
        })
        .collect()
}

/// Mean of all student percentages, 0.0 for an empty batch.
pub fn average_score(students: &[StudentPerformance]) -> f64 {
    if students.is_empty() {
        return 0.0;
    }
    students.iter().map(|s| s.percentage).sum::<f64>() / students.len() as f64
}

fn percentage(total_marks: f64, total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (100.0 * total_marks / total_questions as f64).clamp(0.0, 100.0)
}
