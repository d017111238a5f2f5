use serde::Serialize;

/// Aggregate outcome of one CSV ingestion call.
///
/// Always returned, never raised: every failure mode (bad rows, empty batch,
/// pre-existing keys, storage rejection, unreadable file) maps to one of
/// these shapes with `success` and `errors` carrying the signal.
#[derive(Debug, Clone, Serialize)]
pub struct CsvImportReport {
    pub success: bool,
    pub message: String,
    pub processed_count: usize,
    pub total_rows: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CsvImportReport {
    /// Normal success; partial success counts as success as long as at least
    /// one row committed.
    pub fn success(message: String, processed_count: usize, total_rows: usize, errors: Vec<String>) -> Self {
        Self {
            success: true,
            message,
            processed_count,
            total_rows,
            errors,
            suggestion: None,
        }
    }

    pub fn failure(message: String, total_rows: usize, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message,
            processed_count: 0,
            total_rows,
            errors,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// Degenerate report for failures before any row was scanned
    /// (unreadable header, malformed file).
    pub fn boundary_failure(error: String) -> Self {
        Self {
            success: false,
            message: format!("Error processing CSV file: {}", error),
            processed_count: 0,
            total_rows: 0,
            errors: vec![error],
            suggestion: None,
        }
    }
}
