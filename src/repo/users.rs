use super::{map_insert_error, now_rfc3339, parse_timestamp};
use crate::db::Db;
use crate::entities::{User, UserRole};
use crate::error::{ChurnError, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

/// SQLite-backed storage for user accounts. Email is unique.
pub struct UserRepo {
    db: Db,
}

const COLUMNS: &str = "id, email, full_name, role, password_hash, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        role: UserRole::parse(&role).unwrap_or(UserRole::Admin),
        password_hash: row.get("password_hash")?,
        created_at: parse_timestamp(row.get("created_at")?),
        updated_at: parse_timestamp(row.get("updated_at")?),
    })
}

impl UserRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<User>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let users = stmt
                    .query_map([], user_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(users)
            })
            .await
    }

    pub async fn get_by_id(&self, id: String) -> Result<Option<User>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", COLUMNS))?;
                let mut rows = stmt.query_map(params![id], user_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    pub async fn get_by_email(&self, email: String) -> Result<Option<User>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM users WHERE email = ?1", COLUMNS))?;
                let mut rows = stmt.query_map(params![email], user_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    /// Insert a user; duplicate emails surface as `ChurnError::Conflict`.
    pub async fn create(&self, mut user: User) -> Result<User> {
        if user.id.is_empty() {
            user.id = Uuid::new_v4().to_string();
        }
        self.db
            .with_connection(move |conn| {
                let now = now_rfc3339();
                conn.execute(
                    "INSERT INTO users (id, email, full_name, role, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        user.id,
                        user.email,
                        user.full_name,
                        user.role.as_str(),
                        user.password_hash,
                        now,
                    ],
                )
                .map_err(map_insert_error)?;
                user.created_at = parse_timestamp(Some(now));
                Ok(user)
            })
            .await
    }

    pub async fn update(&self, id: String, user: User) -> Result<Option<User>> {
        let lookup_id = id.clone();
        let updated = self
            .db
            .with_connection(move |conn| {
                let count = conn
                    .execute(
                        "UPDATE users SET email = ?1, full_name = ?2, role = ?3, password_hash = ?4, updated_at = ?5
                         WHERE id = ?6",
                        params![
                            user.email,
                            user.full_name,
                            user.role.as_str(),
                            user.password_hash,
                            now_rfc3339(),
                            id,
                        ],
                    )
                    .map_err(map_insert_error)?;
                Ok::<_, ChurnError>(count > 0)
            })
            .await?;

        if !updated {
            return Ok(None);
        }
        self.get_by_id(lookup_id).await
    }

    pub async fn delete(&self, id: String) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_util::test_db;

    fn user(email: &str) -> User {
        User {
            id: String::new(),
            email: email.to_string(),
            full_name: "Ana Admin".to_string(),
            role: UserRole::Admin,
            password_hash: "opaque".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (db, _tmp) = test_db().await;
        let repo = UserRepo::new(db);

        repo.create(user("ana@example.com")).await.unwrap();
        let err = repo.create(user("ana@example.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_get_by_email() {
        let (db, _tmp) = test_db().await;
        let repo = UserRepo::new(db);

        repo.create(user("ana@example.com")).await.unwrap();
        let found = repo
            .get_by_email("ana@example.com".to_string())
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(repo
            .get_by_email("nobody@example.com".to_string())
            .await
            .unwrap()
            .is_none());
    }
}
