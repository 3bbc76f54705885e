//! Weak-student and weak-question classification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{QuestionPerformance, ReducedRow, StudentPerformance, WeakQuestion, WeakStudent};

/// Classification cut-offs. Both comparisons are strict (`<`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Students below this percentage are weak.
    #[serde(default = "default_weak_student")]
    pub weak_student_below: f64,
    /// Questions below this success rate are weak.
    #[serde(default = "default_weak_question")]
    pub weak_question_below: f64,
}

fn default_weak_student() -> f64 {
    70.0
}

fn default_weak_question() -> f64 {
    60.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            weak_student_below: default_weak_student(),
            weak_question_below: default_weak_question(),
        }
    }
}

/// Select weak students and attach their not-correct rows.
///
/// Students with nothing to remediate are still returned; callers decide
/// eligibility with [`WeakStudent::is_eligible`].
pub fn weak_students(
    students: &[StudentPerformance],
    rows: &[ReducedRow],
    thresholds: &Thresholds,
) -> Vec<WeakStudent> {
    let mut not_correct: HashMap<&str, Vec<ReducedRow>> = HashMap::new();
    for row in rows.iter().filter(|r| !r.status.is_correct()) {
        not_correct
            .entry(row.student_id())
            .or_default()
            .push(row.clone());
    }

    students
        .iter()
        .filter(|s| s.percentage < thresholds.weak_student_below)
        .map(|s| WeakStudent {
            performance: s.clone(),
            failed_questions: not_correct.remove(s.student_id.as_str()).unwrap_or_default(),
        })
        .collect()
}

/// Select questions whose success rate is under the threshold.
pub fn weak_questions(questions: &[QuestionPerformance], thresholds: &Thresholds) -> Vec<WeakQuestion> {
    questions
        .iter()
        .filter(|q| q.success_rate < thresholds.weak_question_below)
        .map(|q| WeakQuestion {
            question: q.question.clone(),
            success_rate: q.success_rate,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawRecord, StatusFlag};

    fn perf(id: &str, percentage: f64) -> StudentPerformance {
        StudentPerformance {
            student_id: id.into(),
            total_marks: 0.0,
            total_questions: 1,
            percentage,
        }
    }

    fn reduced(student: &str, question: &str, status: StatusFlag) -> ReducedRow {
        ReducedRow {
            record: RawRecord {
                line: 0,
                student_id: student.into(),
                question_id: Some(question.into()),
                question_text: None,
                status: None,
                marks: None,
                attempt: None,
            },
            marks: if status.is_correct() { 1.0 } else { 0.0 },
            status,
        }
    }

    #[test]
    fn threshold_is_strict() {
        let students = vec![perf("edge", 70.0), perf("below", 69.99)];
        let weak = weak_students(&students, &[], &Thresholds::default());
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].student_id(), "below");
    }

    #[test]
    fn failed_questions_include_unknown_but_not_correct() {
        let rows = vec![
            reduced("s", "Q1", StatusFlag::Correct),
            reduced("s", "Q2", StatusFlag::Incorrect),
            reduced("s", "Q3", StatusFlag::Unknown),
            reduced("other", "Q2", StatusFlag::Incorrect),
        ];
        let weak = weak_students(&[perf("s", 33.3)], &rows, &Thresholds::default());
        let keys: Vec<_> = weak[0]
            .failed_questions
            .iter()
            .map(|r| r.question_key())
            .collect();
        assert_eq!(keys, vec!["Q2", "Q3"]);
        assert!(weak[0]
            .failed_questions
            .iter()
            .all(|r| r.student_id() == "s" && !r.status.is_correct()));
    }

    #[test]
    fn interleaved_rows_are_grouped_per_student_in_input_order() {
        let rows = vec![
            reduced("a", "Q1", StatusFlag::Incorrect),
            reduced("b", "Q1", StatusFlag::Incorrect),
            reduced("a", "Q2", StatusFlag::Correct),
            reduced("b", "Q2", StatusFlag::Unknown),
            reduced("a", "Q3", StatusFlag::Incorrect),
        ];
        let weak = weak_students(
            &[perf("a", 33.3), perf("b", 0.0), perf("c", 10.0)],
            &rows,
            &Thresholds::default(),
        );
        let keys = |w: &WeakStudent| -> Vec<String> {
            w.failed_questions.iter().map(|r| r.question_key().to_string()).collect()
        };
        assert_eq!(keys(&weak[0]), ["Q1", "Q3"]);
        assert_eq!(keys(&weak[1]), ["Q1", "Q2"]);
        assert!(weak[2].failed_questions.is_empty());
    }

    #[test]
    fn weak_student_without_failures_is_not_eligible() {
        // Fractional marks can leave a student under 70% with every row correct.
        let rows = vec![reduced("s", "Q1", StatusFlag::Correct)];
        let weak = weak_students(&[perf("s", 50.0)], &rows, &Thresholds::default());
        assert_eq!(weak.len(), 1);
        assert!(!weak[0].is_eligible());
    }

    #[test]
    fn weak_question_threshold_is_strict() {
        let questions = vec![
            QuestionPerformance {
                question_key: "Q1".into(),
                question: "Q1".into(),
                attempts: 5,
                correct: 3,
                success_rate: 60.0,
            },
            QuestionPerformance {
                question_key: "Q2".into(),
                question: "What is a sarai?".into(),
                attempts: 5,
                correct: 2,
                success_rate: 40.0,
            },
        ];
        let weak = weak_questions(&questions, &Thresholds::default());
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].question, "What is a sarai?");
    }
}
