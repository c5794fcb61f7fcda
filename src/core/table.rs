//! Raw tabular input as handed over by the data-fetch collaborator.
//!
//! A `RawTable` is deliberately untyped: every cell is optional text. The
//! schema normalizer is the only place that interprets headers and cells.

use crate::errors::Result;
use serde::{Deserialize, Deserializer, Serialize};

/// A header row plus data rows of optional text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column headers exactly as they appeared in the source
    pub headers: Vec<String>,
    /// Data rows; a row may be shorter than `headers` (missing cells are `None`)
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Creates a table from headers and string-slice rows. Empty strings stay
    /// `Some("")` so the normalizer sees exactly what the sheet held.
    #[must_use]
    pub fn from_rows(headers: &[&str], rows: &[&[Option<&str>]]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    /// Parses a table from its JSON representation:
    /// `{"headers": [...], "rows": [[...], ...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the cell at `row`/`column`, treating short rows as missing cells.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(Option::as_deref)
    }

    /// Number of data rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// JSON cell as exported by spreadsheets: text, number, bool, or null.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCell {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Empty(()),
}

impl From<JsonCell> for Option<String> {
    fn from(cell: JsonCell) -> Self {
        match cell {
            JsonCell::Text(s) => Some(s),
            JsonCell::Number(n) => Some(n.to_string()),
            JsonCell::Flag(b) => Some(b.to_string()),
            JsonCell::Empty(()) => None,
        }
    }
}

fn deserialize_rows<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<Option<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Vec<Vec<JsonCell>> = Vec::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_from_json_accepts_mixed_cells() {
        let table = RawTable::from_json(
            r#"{"headers": ["Timestamp", "VitC", "Ok"], "rows": [["01/02/2026 10:00:00", 3, true], [null, 2.5]]}"#,
        )
        .unwrap();

        assert_eq!(table.headers, vec!["Timestamp", "VitC", "Ok"]);
        assert_eq!(table.cell(0, 0), Some("01/02/2026 10:00:00"));
        assert_eq!(table.cell(0, 1), Some("3"));
        assert_eq!(table.cell(0, 2), Some("true"));
        assert_eq!(table.cell(1, 0), None);
        assert_eq!(table.cell(1, 1), Some("2.5"));
        // Short row: missing trailing cell
        assert_eq!(table.cell(1, 2), None);
    }

    #[test]
    fn test_from_json_without_rows() {
        let table = RawTable::from_json(r#"{"headers": ["meta"]}"#).unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_from_rows_keeps_empty_strings() {
        let table = RawTable::from_rows(&["a"], &[&[Some("")], &[None]]);
        assert_eq!(table.cell(0, 0), Some(""));
        assert_eq!(table.cell(1, 0), None);
    }
}
