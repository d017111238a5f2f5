use csv::StringRecord;
use std::fmt;
use std::num::ParseFloatError;

/// A per-row diagnostic tied to its 1-based source row number
/// (the header line is row 1, so data rows start at 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Read-only view of one CSV record, addressed by header name.
///
/// Absent columns and blank cells both read as missing values; the
/// per-entity parsers decide whether that is an error, a None, or a default.
pub struct CsvRow<'a> {
    headers: &'a StringRecord,
    record: &'a StringRecord,
    row_num: usize,
}

impl<'a> CsvRow<'a> {
    pub fn new(headers: &'a StringRecord, record: &'a StringRecord, row_num: usize) -> Self {
        Self {
            headers,
            record,
            row_num,
        }
    }

    /// 1-based source row number
    pub fn number(&self) -> usize {
        self.row_num
    }

    /// Raw cell value for a column, if the column exists in the header
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.record.get(idx)
    }

    /// Trimmed cell value; None when the column is absent or the cell is blank
    pub fn text(&self, column: &str) -> Option<&'a str> {
        match self.get(column).map(str::trim) {
            Some("") | None => None,
            Some(value) => Some(value),
        }
    }

    /// Required text field; `label` is the name used in the error message.
    pub fn required_text(&self, column: &str, label: &str) -> Result<String, RowError> {
        self.text(column)
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("{} is required", label)))
    }

    /// Parse an optional float column. Absent or blank reads as Ok(None);
    /// malformed text surfaces the parse error for the caller to phrase.
    pub fn parse_f64(&self, column: &str) -> Result<Option<f64>, ParseFloatError> {
        match self.text(column) {
            None => Ok(None),
            Some(value) => value.parse::<f64>().map(Some),
        }
    }

    /// Build a RowError carrying this row's number
    pub fn error(&self, message: impl Into<String>) -> RowError {
        RowError::new(self.row_num, message)
    }
}
