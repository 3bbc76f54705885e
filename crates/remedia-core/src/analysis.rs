//! The synchronous analytics pass: schema → reduction → statistics →
//! classification.
//!
//! Runs to completion over the whole table before any remediation job is
//! started. The only error it can return is a [`SchemaError`].

use serde::Serialize;

use crate::classify::{self, Thresholds};
use crate::error::SchemaError;
use crate::model::{QuestionPerformance, ReducedRow, StudentPerformance, WeakQuestion, WeakStudent};
use crate::reducer;
use crate::schema::{self, AliasTable, CanonicalSchema};
use crate::statistics;
use crate::table::AssessmentTable;

/// Everything the remediation stage and the report need from one table.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub schema: CanonicalSchema,
    pub rows: Vec<ReducedRow>,
    pub students: Vec<StudentPerformance>,
    pub questions: Vec<QuestionPerformance>,
    pub weak_students: Vec<WeakStudent>,
    pub weak_questions: Vec<WeakQuestion>,
    pub skipped_rows: usize,
}

impl Analysis {
    /// Weak students that have at least one failed question to target.
    pub fn eligible_students(&self) -> impl Iterator<Item = &WeakStudent> {
        self.weak_students.iter().filter(|s| s.is_eligible())
    }

    pub fn average_score(&self) -> f64 {
        statistics::average_score(&self.students)
    }
}

/// Analyze an assessment table.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn analyze(
    table: &AssessmentTable,
    aliases: &AliasTable,
    thresholds: &Thresholds,
) -> Result<Analysis, SchemaError> {
    let schema = schema::resolve(&table.headers, aliases)?;

    let records = schema.records(table);
    let reduction = reducer::reduce(&records);
    let rows = statistics::derive_rows(reduction.records);

    let students = statistics::student_performance(&rows);
    let questions = statistics::question_performance(&rows);
    let weak_students = classify::weak_students(&students, &rows, thresholds);
    let weak_questions = classify::weak_questions(&questions, thresholds);

    tracing::info!(
        students = students.len(),
        reduced_rows = rows.len(),
        weak_students = weak_students.len(),
        weak_questions = weak_questions.len(),
        skipped_rows = reduction.skipped_rows,
        "assessment analyzed"
    );

    Ok(Analysis {
        schema,
        rows,
        students,
        questions,
        weak_students,
        weak_questions,
        skipped_rows: reduction.skipped_rows,
    })
}
