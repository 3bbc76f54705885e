//! Tabular input loading.
//!
//! Reads a header-row CSV file into plain string cells. No column is
//! interpreted here; that is the schema resolver's job.

use std::io::Read;
use std::path::Path;

use crate::error::IngestError;

/// A row-oriented table of text cells with a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AssessmentTable {
    /// Build a table from in-memory headers and rows. Headers are trimmed;
    /// data cells are kept verbatim. Rows shorter than the header are padded
    /// with empty cells; longer rows are truncated.
    pub fn new<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.into().trim().to_string())
            .collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells: Vec<String> = row
                    .into_iter()
                    .map(Into::into)
                    .take(width)
                    .collect();
                cells.resize(width, String::new());
                cells
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file from disk.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Read CSV from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(IngestError::Empty);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        tracing::debug!(columns = headers.len(), rows = rows.len(), "read assessment table");
        Ok(Self::new(headers, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `(row, column)`, or `""` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_csv_with_ragged_rows() {
        let data = "\u{feff}Email, Question ,Status\na@x.com,Q1,Correct\nb@x.com,Q2\n";
        let table = AssessmentTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Email", "Question", "Status"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.cell(0, 2), "Correct");
        assert_eq!(table.cell(9, 9), "");
    }

    #[test]
    fn quoted_cells_keep_commas() {
        let data = "Email,Question Text,Result\na@x.com,\"What is a sarai, exactly?\",wrong\n";
        let table = AssessmentTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.cell(0, 1), "What is a sarai, exactly?");
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = AssessmentTable::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Empty));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "Login ID,Question ID,Marks\ns1,Q1,1\n").unwrap();
        let table = AssessmentTable::from_path(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 0), "s1");
    }

    #[test]
    fn new_pads_and_truncates() {
        let table = AssessmentTable::new(["a", "b"], vec![vec!["1"], vec!["1", "2", "3"]]);
        assert_eq!(table.rows[0], vec!["1".to_string(), String::new()]);
        assert_eq!(table.rows[1].len(), 2);
    }

    #[test]
    fn only_headers_are_trimmed() {
        let data = " Email ,Question\na@x.com, What is a hotel?\nb@x.com,What is a hotel? \n";
        let table = AssessmentTable::from_reader(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Email", "Question"]);
        assert_eq!(table.cell(0, 1), " What is a hotel?");
        assert_eq!(table.cell(1, 1), "What is a hotel? ");

        let table = AssessmentTable::new([" Email"], [["  a@x.com"]]);
        assert_eq!(table.headers, vec!["Email"]);
        assert_eq!(table.cell(0, 0), "  a@x.com");
    }
}
