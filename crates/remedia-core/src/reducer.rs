//! Attempt deduplication.
//!
//! Collapses repeated submissions for a (student, question) pair down to the
//! latest one. "Latest" is decided by the attempt/ordering column when one
//! was resolved: parsed as timestamps when most rows parse, otherwise by raw
//! value. Without an ordering column the original row order decides.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::RawRecord;

/// Timestamp layouts accepted in the attempt column, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Output of a reduction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    /// One record per (student, question key), in original row order.
    pub records: Vec<RawRecord>,
    /// Rows dropped because the student or question key was blank.
    pub skipped_rows: usize,
}

/// How rows were ordered before picking the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOrdering {
    /// No ordering column; original row order.
    RowOrder,
    /// Parsed timestamps, unparseable values first.
    Timestamp,
    /// Raw cell values, numeric where both sides are numbers.
    RawValue,
}

/// Parse an attempt cell as a timestamp.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Decide how to order rows for this batch.
pub fn detect_ordering(records: &[RawRecord]) -> AttemptOrdering {
    let Some(first) = records.first() else {
        return AttemptOrdering::RowOrder;
    };
    if first.attempt.is_none() {
        return AttemptOrdering::RowOrder;
    }

    let parsed = records
        .iter()
        .filter(|r| r.attempt.as_deref().and_then(parse_timestamp).is_some())
        .count();
    if parsed * 2 > records.len() {
        AttemptOrdering::Timestamp
    } else {
        AttemptOrdering::RawValue
    }
}

/// Compare raw attempt cells: numbers before text, blanks last.
fn compare_raw(a: Option<&str>, b: Option<&str>) -> Ordering {
    fn rank(value: Option<&str>) -> (u8, Option<f64>) {
        match value.map(str::trim) {
            None | Some("") => (2, None),
            Some(v) => match v.parse::<f64>() {
                Ok(n) if n.is_finite() => (0, Some(n)),
                _ => (1, None),
            },
        }
    }

    let (rank_a, num_a) = rank(a);
    let (rank_b, num_b) = rank(b);
    rank_a.cmp(&rank_b).then_with(|| match (num_a, num_b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ if rank_a == 1 => a.unwrap_or_default().cmp(b.unwrap_or_default()),
        _ => Ordering::Equal,
    })
}

/// Keep the latest attempt per (student, question key).
///
/// Idempotent: reducing an already-reduced set returns it unchanged.
pub fn reduce(records: &[RawRecord]) -> Reduction {
    let mut skipped_rows = 0usize;
    let mut usable: Vec<&RawRecord> = Vec::with_capacity(records.len());
    for record in records {
        if record.student_id.trim().is_empty() || record.question_key().is_none() {
            skipped_rows += 1;
        } else {
            usable.push(record);
        }
    }
    if skipped_rows > 0 {
        tracing::warn!(skipped_rows, "rows without a student or question key were excluded");
    }

    match detect_ordering(records) {
        AttemptOrdering::RowOrder => {}
        AttemptOrdering::Timestamp => {
            usable.sort_by_cached_key(|r| r.attempt.as_deref().and_then(parse_timestamp));
        }
        AttemptOrdering::RawValue => {
            usable.sort_by(|a, b| compare_raw(a.attempt.as_deref(), b.attempt.as_deref()));
        }
    }

    let mut latest: HashMap<(&str, &str), &RawRecord> = HashMap::new();
    for record in usable {
        let key = (
            record.student_id.as_str(),
            record.question_key().unwrap_or_default(),
        );
        latest.insert(key, record);
    }

    let mut survivors: Vec<RawRecord> = latest.into_values().cloned().collect();
    survivors.sort_by_key(|r| r.line);

    tracing::debug!(
        input = records.len(),
        reduced = survivors.len(),
        skipped_rows,
        "reduced attempts"
    );

    Reduction {
        records: survivors,
        skipped_rows,
    }
}
