use super::{map_insert_error, now_rfc3339, parse_timestamp};
use crate::db::Db;
use crate::entities::Note;
use crate::error::{ChurnError, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

/// SQLite-backed storage for internal notes.
///
/// Recipient role tags are stored as a JSON array column.
pub struct NoteRepo {
    db: Db,
}

const COLUMNS: &str = "id, title, description, sender_id, recipients, is_read, timestamp";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let recipients_json: String = row.get("recipients")?;
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        sender_id: row.get("sender_id")?,
        recipients: serde_json::from_str(&recipients_json).unwrap_or_default(),
        is_read: row.get("is_read")?,
        timestamp: parse_timestamp(row.get("timestamp")?),
    })
}

impl NoteRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<Note>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM notes ORDER BY timestamp DESC",
                    COLUMNS
                ))?;
                let notes = stmt
                    .query_map([], note_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(notes)
            })
            .await
    }

    pub async fn get_by_id(&self, id: String) -> Result<Option<Note>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM notes WHERE id = ?1", COLUMNS))?;
                let mut rows = stmt.query_map(params![id], note_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    /// Notes addressed to the given role tag
    pub async fn get_by_recipient(&self, role: String) -> Result<Vec<Note>> {
        let notes = self.get_all().await?;
        Ok(notes
            .into_iter()
            .filter(|n| n.recipients.iter().any(|r| r == &role))
            .collect())
    }

    pub async fn create(&self, mut note: Note) -> Result<Note> {
        if note.id.is_empty() {
            note.id = Uuid::new_v4().to_string();
        }
        self.db
            .with_connection(move |conn| {
                let now = now_rfc3339();
                let recipients_json = serde_json::to_string(&note.recipients)
                    .map_err(|e| ChurnError::InvalidInput(e.to_string()))?;
                conn.execute(
                    "INSERT INTO notes (id, title, description, sender_id, recipients, is_read, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        note.id,
                        note.title,
                        note.description,
                        note.sender_id,
                        recipients_json,
                        note.is_read,
                        now,
                    ],
                )
                .map_err(map_insert_error)?;
                note.timestamp = parse_timestamp(Some(now));
                Ok(note)
            })
            .await
    }

    pub async fn update(&self, id: String, note: Note) -> Result<Option<Note>> {
        let lookup_id = id.clone();
        let updated = self
            .db
            .with_connection(move |conn| {
                let recipients_json = serde_json::to_string(&note.recipients)
                    .map_err(|e| ChurnError::InvalidInput(e.to_string()))?;
                let count = conn.execute(
                    "UPDATE notes SET title = ?1, description = ?2, sender_id = ?3, recipients = ?4, is_read = ?5
                     WHERE id = ?6",
                    params![
                        note.title,
                        note.description,
                        note.sender_id,
                        recipients_json,
                        note.is_read,
                        id,
                    ],
                )?;
                Ok::<_, ChurnError>(count > 0)
            })
            .await?;

        if !updated {
            return Ok(None);
        }
        self.get_by_id(lookup_id).await
    }

    pub async fn mark_read(&self, id: String) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let count =
                    conn.execute("UPDATE notes SET is_read = 1 WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
    }

    pub async fn delete(&self, id: String) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_util::test_db;

    fn note(title: &str, recipients: &[&str]) -> Note {
        Note {
            id: String::new(),
            title: title.to_string(),
            description: "Follow up with the client".to_string(),
            sender_id: "u1".to_string(),
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            is_read: false,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_recipients_roundtrip() {
        let (db, _tmp) = test_db().await;
        let repo = NoteRepo::new(db);

        let created = repo
            .create(note("Renewal call", &["marketing_agent", "admin"]))
            .await
            .unwrap();

        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.recipients, vec!["marketing_agent", "admin"]);
    }

    #[tokio::test]
    async fn test_get_by_recipient() {
        let (db, _tmp) = test_db().await;
        let repo = NoteRepo::new(db);

        repo.create(note("A", &["marketing_agent"])).await.unwrap();
        repo.create(note("B", &["technical_agent"])).await.unwrap();

        let marketing = repo
            .get_by_recipient("marketing_agent".to_string())
            .await
            .unwrap();
        assert_eq!(marketing.len(), 1);
        assert_eq!(marketing[0].title, "A");
    }

    #[tokio::test]
    async fn test_mark_read() {
        let (db, _tmp) = test_db().await;
        let repo = NoteRepo::new(db);

        let created = repo.create(note("A", &["admin"])).await.unwrap();
        assert!(repo.mark_read(created.id.clone()).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().unwrap().is_read);
    }
}
