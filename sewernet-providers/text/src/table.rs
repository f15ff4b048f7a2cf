//! Header-and-rows tokenizer shared by the table readers.
//!
//! Fields are separated by commas when a line contains one and by
//! whitespace otherwise. Blank lines and lines starting with `#` are
//! skipped.

use std::collections::HashMap;
use std::io::BufRead;

use crate::errors::TextProviderError;

/// Similarity above which a header name is offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// One data row with its line number.
#[derive(Debug)]
pub(crate) struct Row {
    pub(crate) line: usize,
    pub(crate) fields: Vec<String>,
}

/// Parsed header plus data rows.
#[derive(Debug)]
pub(crate) struct Table {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    pub(crate) rows: Vec<Row>,
}

impl Table {
    pub(crate) fn read(reader: impl BufRead) -> Result<Self, TextProviderError> {
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        for (offset, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields = split_fields(trimmed);
            if header.is_none() {
                header = Some(fields.into_iter().map(|f| f.to_ascii_lowercase()).collect());
            } else {
                rows.push(Row {
                    line: offset + 1,
                    fields,
                });
            }
        }
        let columns = header.ok_or(TextProviderError::EmptyInput)?;
        let mut positions = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), index).is_some() {
                return Err(TextProviderError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        for row in &rows {
            if row.fields.len() != columns.len() {
                return Err(TextProviderError::RowLength {
                    line: row.line,
                    expected: columns.len(),
                    actual: row.fields.len(),
                });
            }
        }
        Ok(Self {
            columns,
            positions,
            rows,
        })
    }

    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a required column, suggesting the closest header name
    /// when it is missing.
    pub(crate) fn require(&self, column: &'static str) -> Result<usize, TextProviderError> {
        self.optional(column)
            .ok_or_else(|| TextProviderError::MissingColumn {
                column,
                suggestion: self.closest(column),
            })
    }

    pub(crate) fn optional(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    fn closest(&self, column: &str) -> Option<String> {
        self.columns
            .iter()
            .map(|candidate| (strsim::jaro_winkler(column, candidate), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    }
}

impl Row {
    pub(crate) fn field(&self, index: usize) -> &str {
        self.fields.get(index).map_or("", String::as_str)
    }

    pub(crate) fn number(&self, table: &Table, index: usize) -> Result<f64, TextProviderError> {
        let raw = self.field(index);
        raw.parse::<f64>()
            .map_err(|_| TextProviderError::InvalidNumber {
                line: self.line,
                column: table.columns().get(index).cloned().unwrap_or_default(),
                value: raw.to_owned(),
            })
    }

    /// Parses an optional field; empty, `-`, and `na` mean absent.
    pub(crate) fn maybe_number(
        &self,
        table: &Table,
        index: Option<usize>,
    ) -> Result<Option<f64>, TextProviderError> {
        let Some(index) = index else {
            return Ok(None);
        };
        match self.field(index).to_ascii_lowercase().as_str() {
            "" | "-" | "na" => Ok(None),
            _ => self.number(table, index).map(Some),
        }
    }

    /// Parses an unsigned integer field.
    pub(crate) fn integer(&self, table: &Table, index: usize) -> Result<u32, TextProviderError> {
        let raw = self.field(index);
        raw.parse::<u32>()
            .map_err(|_| TextProviderError::InvalidNumber {
                line: self.line,
                column: table.columns().get(index).cloned().unwrap_or_default(),
                value: raw.to_owned(),
            })
    }
}

fn split_fields(line: &str) -> Vec<String> {
    if line.contains(',') {
        line.split(',').map(|field| field.trim().to_owned()).collect()
    } else {
        line.split_whitespace().map(str::to_owned).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case("a,b, c\n1,2,3\n")]
    #[case("a b\tc\n1 2   3\n")]
    #[case("# comment\n\nA B C\n1 2 3\n")]
    fn header_and_rows_split(#[case] raw: &str) {
        let table = Table::read(Cursor::new(raw)).expect("table parses");
        assert_eq!(table.columns(), ["a", "b", "c"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].fields, ["1", "2", "3"]);
    }

    #[test]
    fn missing_column_suggests_near_match() {
        let table = Table::read(Cursor::new("runof area\n0.5 1\n")).expect("table parses");
        let err = table.require("runoff").expect_err("column is missing");
        assert!(matches!(
            err,
            TextProviderError::MissingColumn { column: "runoff", suggestion: Some(ref s) } if s == "runof"
        ));
    }

    #[test]
    fn short_row_is_rejected_with_line() {
        let err = Table::read(Cursor::new("a b\n1 2\n\n3\n")).expect_err("row is short");
        assert!(matches!(
            err,
            TextProviderError::RowLength { line: 4, expected: 2, actual: 1 }
        ));
    }
}
