pub mod customer_issues;
pub mod email_notifications;
pub mod predictions;
pub mod report;
pub mod row;

pub use customer_issues::CustomerIssueCsv;
pub use email_notifications::EmailNotificationCsv;
pub use predictions::PredictionCsv;
pub use report::CsvImportReport;
pub use row::{CsvRow, RowError};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// One successfully parsed row, plus any soft-validation warnings that
/// should surface in the report without failing the row.
pub struct ParsedRow<T> {
    pub record: T,
    pub warnings: Vec<RowError>,
}

impl<T> ParsedRow<T> {
    pub fn new(record: T) -> Self {
        Self {
            record,
            warnings: Vec::new(),
        }
    }
}

/// Per-entity CSV import strategy: how one row parses, and which uniqueness
/// rules the batch is under.
pub trait CsvImport: Send + Sync {
    type Record: Send + 'static;

    /// Plural label used in the success message, e.g. "customer issues"
    fn entity_label(&self) -> &'static str;

    /// Column holding a key that must be unique within one uploaded batch.
    /// None disables intra-batch duplicate tracking.
    fn key_column(&self) -> Option<&'static str> {
        None
    }

    /// Whether to look up every batch key in storage before committing and
    /// reject the whole upload when any already exists.
    fn precheck_existing(&self) -> bool {
        false
    }

    /// Convert one row into a typed candidate or a row-scoped failure.
    fn parse_row(&self, row: &CsvRow<'_>) -> std::result::Result<ParsedRow<Self::Record>, RowError>;
}

/// Storage seam the committer talks to.
#[async_trait]
pub trait BatchStore<T>: Send + Sync {
    /// Atomically insert the whole batch: either every record persists or
    /// none do. Uniqueness violations must surface as `ChurnError::Conflict`.
    async fn batch_create(&self, records: Vec<T>) -> Result<Vec<T>>;

    /// Which of `keys` already exist in storage. Pipelines without a
    /// pre-commit check never call this.
    async fn find_existing_keys(&self, keys: &[String]) -> Result<Vec<String>> {
        let _ = keys;
        Ok(Vec::new())
    }
}

struct ValidatedBatch<T> {
    candidates: Vec<T>,
    keys: Vec<String>,
    errors: Vec<String>,
    processed: usize,
}

/// Scan every data row, never aborting on a bad one.
///
/// Row numbering starts at 2 (row 1 is the header line). When the profile
/// declares a key column, a key seen earlier in the same file fails the row
/// before any field validation runs.
fn validate_batch<P: CsvImport>(
    profile: &P,
    csv_content: &str,
) -> std::result::Result<ValidatedBatch<P::Record>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_content.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let mut batch = ValidatedBatch {
        candidates: Vec::new(),
        keys: Vec::new(),
        errors: Vec::new(),
        processed: 0,
    };
    let mut seen_keys: HashSet<String> = HashSet::new();

    for (idx, record) in reader.records().enumerate() {
        let row_num = idx + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                batch
                    .errors
                    .push(RowError::new(row_num, e.to_string()).to_string());
                continue;
            }
        };
        let row = CsvRow::new(&headers, &record, row_num);

        // Intra-batch uniqueness runs before field validation; a duplicated
        // key fails the row outright and the key stays claimed by the first
        // occurrence.
        let mut row_key = None;
        if let Some(column) = profile.key_column() {
            if let Some(key) = row.text(column) {
                if !seen_keys.insert(key.to_string()) {
                    batch.errors.push(
                        row.error(format!("Duplicate {} '{}' found in CSV", column, key))
                            .to_string(),
                    );
                    continue;
                }
                row_key = Some(key.to_string());
            }
        }

        match profile.parse_row(&row) {
            Ok(parsed) => {
                for warning in parsed.warnings {
                    batch.errors.push(warning.to_string());
                }
                batch.candidates.push(parsed.record);
                batch.processed += 1;
                if let Some(key) = row_key {
                    batch.keys.push(key);
                }
            }
            Err(e) => batch.errors.push(e.to_string()),
        }
    }

    Ok(batch)
}

/// Run one CSV ingestion call end to end: validate every row, optionally
/// pre-check keys against storage, then commit the surviving candidates in
/// a single atomic insert. Always returns a report.
pub async fn import_csv<P, S>(profile: &P, store: &S, csv_content: &str) -> CsvImportReport
where
    P: CsvImport,
    S: BatchStore<P::Record> + ?Sized,
{
    let batch = match validate_batch(profile, csv_content) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("CSV import ({}) failed to parse: {}", profile.entity_label(), e);
            return CsvImportReport::boundary_failure(e);
        }
    };

    let total_rows = batch.processed + batch.errors.len();
    log::debug!(
        "CSV import ({}): {} candidates, {} row errors",
        profile.entity_label(),
        batch.processed,
        batch.errors.len()
    );

    if batch.candidates.is_empty() {
        return CsvImportReport::failure(
            "No valid records found in CSV".to_string(),
            batch.errors.len(),
            batch.errors,
        );
    }

    if profile.precheck_existing() {
        let existing = match store.find_existing_keys(&batch.keys).await {
            Ok(existing) => existing,
            Err(e) => return database_failure(e.to_string(), total_rows, batch.errors),
        };
        if !existing.is_empty() {
            let column = profile.key_column().unwrap_or("key");
            return CsvImportReport::failure(
                format!(
                    "The following {}s already exist in the database: {}",
                    column,
                    existing.join(", ")
                ),
                total_rows,
                batch.errors,
            );
        }
    }

    match store.batch_create(batch.candidates).await {
        Ok(created) => {
            log::info!(
                "CSV import ({}): committed {} records",
                profile.entity_label(),
                created.len()
            );
            CsvImportReport::success(
                format!(
                    "Successfully processed {} {}",
                    created.len(),
                    profile.entity_label()
                ),
                created.len(),
                total_rows,
                batch.errors,
            )
        }
        Err(e) if e.is_conflict() => {
            let mut errors = batch.errors;
            errors.push(format!("Database error: {}", e));
            let (message, suggestion) = match profile.key_column() {
                Some(column) => (
                    format!(
                        "Some {}s already exist in the database. Each {} must be unique.",
                        column, column
                    ),
                    format!(
                        "Please check your CSV for duplicate {}s or remove existing records from the database before uploading.",
                        column
                    ),
                ),
                None => (
                    "Some records already exist in the database. Each record must be unique."
                        .to_string(),
                    "Please check your CSV for duplicate records or remove existing records from the database before uploading."
                        .to_string(),
                ),
            };
            CsvImportReport::failure(message, total_rows, errors).with_suggestion(suggestion)
        }
        Err(e) => database_failure(e.to_string(), total_rows, batch.errors),
    }
}

fn database_failure(error: String, total_rows: usize, mut errors: Vec<String>) -> CsvImportReport {
    log::error!("CSV import commit failed: {}", error);
    errors.push(format!("Database error: {}", error));
    CsvImportReport::failure(
        format!("Database error occurred: {}", error),
        total_rows,
        errors,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChurnError;
    use std::sync::Mutex;

    struct TestProfile;

    impl CsvImport for TestProfile {
        type Record = (String, f64);

        fn entity_label(&self) -> &'static str {
            "test records"
        }

        fn key_column(&self) -> Option<&'static str> {
            Some("key")
        }

        fn precheck_existing(&self) -> bool {
            true
        }

        fn parse_row(&self, row: &CsvRow<'_>) -> std::result::Result<ParsedRow<Self::Record>, RowError> {
            let key = row.required_text("key", "key")?;
            let value = row
                .parse_f64("value")
                .map_err(|_| row.error("Invalid value value"))?
                .unwrap_or(0.0);
            Ok(ParsedRow::new((key, value)))
        }
    }

    #[derive(Default)]
    struct MockStore {
        created: Mutex<Vec<(String, f64)>>,
        existing: Vec<String>,
        fail_conflict: bool,
        fail_other: bool,
    }

    #[async_trait]
    impl BatchStore<(String, f64)> for MockStore {
        async fn batch_create(&self, records: Vec<(String, f64)>) -> Result<Vec<(String, f64)>> {
            if self.fail_conflict {
                return Err(ChurnError::Conflict(
                    "duplicate key value violates unique constraint".to_string(),
                ));
            }
            if self.fail_other {
                return Err(ChurnError::Config("connection reset".to_string()));
            }
            self.created.lock().unwrap().extend(records.iter().cloned());
            Ok(records)
        }

        async fn find_existing_keys(&self, keys: &[String]) -> Result<Vec<String>> {
            Ok(self
                .existing
                .iter()
                .filter(|k| keys.contains(k))
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_success_with_partial_errors() {
        let store = MockStore::default();
        let csv = "key,value\nA,1.5\n,2.0\nB,bogus\nC,\n";
        let report = import_csv(&TestProfile, &store, csv).await;

        assert!(report.success);
        assert_eq!(report.processed_count, 2);
        assert_eq!(report.total_rows, 4);
        assert_eq!(
            report.errors,
            vec![
                "Row 3: key is required".to_string(),
                "Row 4: Invalid value value".to_string(),
            ]
        );
        // row counts always reconcile
        assert_eq!(report.processed_count + report.errors.len(), report.total_rows);
        assert_eq!(store.created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_intra_batch_duplicate_skips_row() {
        let store = MockStore::default();
        let csv = "key,value\nC100,1.0\nC100,bogus\n";
        let report = import_csv(&TestProfile, &store, csv).await;

        assert!(report.success);
        assert_eq!(report.processed_count, 1);
        // the duplicate is reported, not the bogus value: field validation
        // never ran for the second row
        assert_eq!(
            report.errors,
            vec!["Row 3: Duplicate key 'C100' found in CSV".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_csv_no_valid_records() {
        let store = MockStore::default();
        let report = import_csv(&TestProfile, &store, "key,value\n").await;

        assert!(!report.success);
        assert_eq!(report.message, "No valid records found in CSV");
        assert_eq!(report.processed_count, 0);
        assert_eq!(report.total_rows, 0);
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_keys_reject_whole_batch() {
        let store = MockStore {
            existing: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        let csv = "key,value\nA,1.0\nB,2.0\nZ,3.0\n";
        let report = import_csv(&TestProfile, &store, csv).await;

        assert!(!report.success);
        assert_eq!(report.processed_count, 0);
        assert_eq!(
            report.message,
            "The following keys already exist in the database: A, B"
        );
        // nothing committed: whole-batch atomicity at the application layer
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_failure_carries_suggestion() {
        let store = MockStore {
            fail_conflict: true,
            ..Default::default()
        };
        let report = import_csv(&TestProfile, &store, "key,value\nA,1.0\n").await;

        assert!(!report.success);
        assert_eq!(report.processed_count, 0);
        assert!(report.suggestion.is_some());
        assert!(report.errors.iter().any(|e| e.starts_with("Database error:")));
        assert!(report.message.contains("must be unique"));
    }

    #[tokio::test]
    async fn test_other_database_failure_no_suggestion() {
        let store = MockStore {
            fail_other: true,
            ..Default::default()
        };
        let report = import_csv(&TestProfile, &store, "key,value\nA,1.0\n").await;

        assert!(!report.success);
        assert!(report.suggestion.is_none());
        assert!(report.message.starts_with("Database error occurred:"));
        assert!(report.errors.iter().any(|e| e.starts_with("Database error:")));
    }

    #[tokio::test]
    async fn test_soft_warning_counts_row_as_processed() {
        struct WarnProfile;
        impl CsvImport for WarnProfile {
            type Record = String;
            fn entity_label(&self) -> &'static str {
                "warned records"
            }
            fn parse_row(
                &self,
                row: &CsvRow<'_>,
            ) -> std::result::Result<ParsedRow<Self::Record>, RowError> {
                let mut parsed = ParsedRow::new(row.text("v").unwrap_or("").to_string());
                parsed.warnings.push(row.error("coerced"));
                Ok(parsed)
            }
        }

        #[derive(Default)]
        struct PassStore;
        #[async_trait]
        impl BatchStore<String> for PassStore {
            async fn batch_create(&self, records: Vec<String>) -> Result<Vec<String>> {
                Ok(records)
            }
        }

        let report = import_csv(&WarnProfile, &PassStore, "v\nx\n").await;
        assert!(report.success);
        assert_eq!(report.processed_count, 1);
        assert_eq!(report.errors, vec!["Row 2: coerced".to_string()]);
        // warned rows count on both sides, so the total reflects the sum
        assert_eq!(report.total_rows, 2);
    }
}
