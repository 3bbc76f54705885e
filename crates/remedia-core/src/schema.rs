//! Schema resolution: mapping arbitrary input headers onto semantic roles.
//!
//! The alias table is plain data and [`resolve`] is a pure function over it,
//! so neither depends on how the table was read.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::model::RawRecord;
use crate::table::AssessmentTable;

/// A semantic column role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AttemptOrder,
    StudentId,
    QuestionId,
    QuestionText,
    Status,
    Marks,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::AttemptOrder => "attempt_order",
            Role::StudentId => "student_id",
            Role::QuestionId => "question_id",
            Role::QuestionText => "question_text",
            Role::Status => "status",
            Role::Marks => "marks",
        };
        f.write_str(name)
    }
}

/// Candidate header aliases per role, in resolution order.
///
/// Roles are resolved in the order they appear here and a column claimed by
/// an earlier role is not offered to later ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    pub roles: Vec<(Role, Vec<String>)>,
}

impl AliasTable {
    pub fn aliases(&self, role: Role) -> &[String] {
        self.roles
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, aliases)| aliases.as_slice())
            .unwrap_or_default()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            roles: vec![
                (
                    Role::AttemptOrder,
                    list(&[
                        "Attempt ID",
                        "AttemptID",
                        "Attempt Number",
                        "Attempt",
                        "Submission Time",
                        "Submitted At",
                        "Submitted On",
                    ]),
                ),
                (
                    Role::StudentId,
                    list(&[
                        "Login ID",
                        "LoginID",
                        "Email",
                        "Student Email",
                        "Learner Email",
                        "User Email",
                        "Email Address",
                        "Username",
                    ]),
                ),
                (
                    Role::QuestionId,
                    list(&[
                        "Question ID",
                        "QuestionID",
                        "Question Number",
                        "Question No",
                        "Question Code",
                    ]),
                ),
                (
                    Role::QuestionText,
                    list(&[
                        "Question Text",
                        "Question",
                        "Question Statement",
                        "Question Description",
                        "Question Title",
                    ]),
                ),
                (
                    Role::Status,
                    list(&[
                        "Answer Status",
                        "Status",
                        "Result",
                        "Answer Result",
                        "Is Correct",
                        "Outcome",
                        "Response Status",
                    ]),
                ),
                (
                    Role::Marks,
                    list(&[
                        "Obtained Marks",
                        "Score",
                        "Marks Obtained",
                        "Marks",
                        "Points",
                        "Earned Points",
                        "Awarded Score",
                    ]),
                ),
            ],
        }
    }
}

/// A resolved source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub index: usize,
    pub name: String,
}

/// Role → column mapping for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub student_id: Option<ColumnRef>,
    pub question_id: Option<ColumnRef>,
    pub question_text: Option<ColumnRef>,
    pub status: Option<ColumnRef>,
    pub marks: Option<ColumnRef>,
    pub attempt_order: Option<ColumnRef>,
}

impl CanonicalSchema {
    pub fn column(&self, role: Role) -> Option<&ColumnRef> {
        match role {
            Role::AttemptOrder => self.attempt_order.as_ref(),
            Role::StudentId => self.student_id.as_ref(),
            Role::QuestionId => self.question_id.as_ref(),
            Role::QuestionText => self.question_text.as_ref(),
            Role::Status => self.status.as_ref(),
            Role::Marks => self.marks.as_ref(),
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<ColumnRef> {
        match role {
            Role::AttemptOrder => &mut self.attempt_order,
            Role::StudentId => &mut self.student_id,
            Role::QuestionId => &mut self.question_id,
            Role::QuestionText => &mut self.question_text,
            Role::Status => &mut self.status,
            Role::Marks => &mut self.marks,
        }
    }

    /// Project every table row through this schema.
    pub fn records(&self, table: &AssessmentTable) -> Vec<RawRecord> {
        let pick = |row: usize, col: &Option<ColumnRef>| -> Option<String> {
            col.as_ref().map(|c| table.cell(row, c.index).to_string())
        };

        (0..table.len())
            .map(|line| RawRecord {
                line,
                student_id: pick(line, &self.student_id).unwrap_or_default(),
                question_id: pick(line, &self.question_id),
                question_text: pick(line, &self.question_text),
                status: pick(line, &self.status),
                marks: pick(line, &self.marks),
                attempt: pick(line, &self.attempt_order),
            })
            .collect()
    }
}

/// Lowercase and strip everything that is not an ASCII letter or digit.
pub fn normalize_column_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Find the column best matching any alias.
///
/// Exact normalized matches win (aliases in priority order). Failing that,
/// the first column whose normalized name contains an alias, scanning
/// aliases in priority order and then columns in encounter order.
pub fn find_best_column(
    columns: &[String],
    aliases: &[String],
    claimed: &[usize],
) -> Option<usize> {
    let normalized: Vec<(usize, String)> = columns
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed.contains(i))
        .map(|(i, c)| (i, normalize_column_key(c)))
        .collect();
    let candidates: Vec<String> = aliases
        .iter()
        .map(|a| normalize_column_key(a))
        .filter(|a| !a.is_empty())
        .collect();

    for candidate in &candidates {
        if let Some((i, _)) = normalized.iter().find(|(_, key)| key == candidate) {
            return Some(*i);
        }
    }

    for candidate in &candidates {
        if let Some((i, _)) = normalized
            .iter()
            .find(|(_, key)| key.contains(candidate.as_str()))
        {
            return Some(*i);
        }
    }

    None
}

/// Resolve every role against the given headers.
pub fn resolve(columns: &[String], aliases: &AliasTable) -> Result<CanonicalSchema, SchemaError> {
    if columns.is_empty() {
        return Err(SchemaError::NoColumns);
    }

    let mut schema = CanonicalSchema::default();
    let mut claimed = Vec::new();

    for (role, role_aliases) in &aliases.roles {
        if let Some(index) = find_best_column(columns, role_aliases, &claimed) {
            claimed.push(index);
            *schema.slot(*role) = Some(ColumnRef {
                index,
                name: columns[index].clone(),
            });
        }
    }

    if schema.student_id.is_none() {
        return Err(SchemaError::MissingRole {
            role: Role::StudentId,
            aliases: aliases.aliases(Role::StudentId).to_vec(),
        });
    }
    if schema.question_id.is_none() && schema.question_text.is_none() {
        return Err(SchemaError::MissingAlternatives {
            roles: vec![Role::QuestionId, Role::QuestionText],
        });
    }
    if schema.status.is_none() && schema.marks.is_none() {
        return Err(SchemaError::MissingAlternatives {
            roles: vec![Role::Status, Role::Marks],
        });
    }

    tracing::debug!(?schema, "resolved assessment schema");
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_column_key("Login ID"), "loginid");
        assert_eq!(normalize_column_key("  Obtained_Marks (%) "), "obtainedmarks");
    }

    #[test]
    fn exact_match_beats_partial() {
        let columns = cols(&["Student Email Verified", "Email"]);
        let aliases = cols(&["Email"]);
        assert_eq!(find_best_column(&columns, &aliases, &[]), Some(1));
    }

    #[test]
    fn partial_match_follows_alias_priority_then_column_order() {
        let columns = cols(&["user_name_field", "primary email address"]);
        // "email" is listed before "username" so it wins even though the
        // username column comes first.
        let aliases = cols(&["Email", "Username"]);
        assert_eq!(find_best_column(&columns, &aliases, &[]), Some(1));
    }

    #[test]
    fn resolves_typical_export() {
        let columns = cols(&[
            "Attempt ID",
            "Login ID",
            "Question ID",
            "Question Text",
            "Answer Status",
            "Obtained Marks",
        ]);
        let schema = resolve(&columns, &AliasTable::default()).unwrap();
        assert_eq!(schema.attempt_order.unwrap().index, 0);
        assert_eq!(schema.student_id.unwrap().index, 1);
        assert_eq!(schema.question_id.unwrap().index, 2);
        assert_eq!(schema.question_text.unwrap().index, 3);
        assert_eq!(schema.status.unwrap().index, 4);
        assert_eq!(schema.marks.unwrap().index, 5);
    }

    #[test]
    fn claimed_columns_are_not_reused() {
        // "Question ID" contains "question" but is already the id column.
        let columns = cols(&["email", "Question ID", "result"]);
        let schema = resolve(&columns, &AliasTable::default()).unwrap();
        assert_eq!(schema.question_id.unwrap().name, "Question ID");
        assert!(schema.question_text.is_none());
    }

    #[test]
    fn missing_student_column_is_fatal() {
        let columns = cols(&["Question", "Status"]);
        let err = resolve(&columns, &AliasTable::default()).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingRole {
                role: Role::StudentId,
                ..
            }
        ));
    }

    #[test]
    fn missing_question_columns_is_fatal() {
        let columns = cols(&["Email", "Status"]);
        let err = resolve(&columns, &AliasTable::default()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingAlternatives {
                roles: vec![Role::QuestionId, Role::QuestionText]
            }
        );
    }

    #[test]
    fn missing_status_and_marks_is_fatal() {
        let columns = cols(&["Email", "Question"]);
        let err = resolve(&columns, &AliasTable::default()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingAlternatives {
                roles: vec![Role::Status, Role::Marks]
            }
        );
    }

    #[test]
    fn empty_header_is_fatal() {
        assert_eq!(
            resolve(&[], &AliasTable::default()).unwrap_err(),
            SchemaError::NoColumns
        );
    }

    #[test]
    fn records_project_resolved_columns() {
        let table = AssessmentTable::new(
            ["Email", "Question", "Marks"],
            vec![vec!["a@x.com", "What is a hotel?", "1"]],
        );
        let schema = resolve(&table.headers, &AliasTable::default()).unwrap();
        let records = schema.records(&table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, "a@x.com");
        assert_eq!(records[0].question_text.as_deref(), Some("What is a hotel?"));
        assert_eq!(records[0].marks.as_deref(), Some("1"));
        assert!(records[0].status.is_none());
        assert!(records[0].question_id.is_none());
    }
}
