pub mod clients;
pub mod customer_issues;
pub mod email_notifications;
pub mod notes;
pub mod predictions;
pub mod users;

pub use clients::ClientRepo;
pub use customer_issues::CustomerIssueRepo;
pub use email_notifications::EmailNotificationRepo;
pub use notes::NoteRepo;
pub use predictions::PredictionRepo;
pub use users::UserRepo;

use crate::error::ChurnError;
use chrono::{DateTime, Utc};

// SQLite extended result codes for uniqueness violations
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Map a rusqlite insert error, promoting uniqueness violations to the
/// typed `Conflict` variant so the ingestion pipeline can dispatch on it.
pub(crate) fn map_insert_error(e: rusqlite::Error) -> ChurnError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.extended_code == SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            ChurnError::Conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "duplicate key violates unique constraint".to_string()),
            )
        }
        _ => ChurnError::Database(e),
    }
}

/// Parse a stored RFC 3339 timestamp column; unparseable text reads as None.
pub(crate) fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Current time in the format every table stores
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::db::{migrate, Db};
    use std::path::Path;
    use tempfile::TempDir;

    /// Scratch database with the full schema applied
    pub async fn test_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await
            .unwrap();
        (db, temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(Some("2026-03-01T10:30:00Z".to_string()));
        assert!(ts.is_some());
        assert!(parse_timestamp(Some("yesterday".to_string())).is_none());
        assert!(parse_timestamp(None).is_none());
    }

    #[test]
    fn test_map_insert_error_passthrough() {
        let err = map_insert_error(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, ChurnError::Database(_)));
    }
}
