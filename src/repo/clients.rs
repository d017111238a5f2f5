use super::{map_insert_error, now_rfc3339, parse_timestamp};
use crate::db::Db;
use crate::entities::{Client, Contact};
use crate::error::{ChurnError, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

/// SQLite-backed storage for client accounts.
pub struct ClientRepo {
    db: Db,
}

const COLUMNS: &str = "id, name, segment, since, churn_risk, contact_primary, contact_secondary, preferred_time, last_call, monthly_revenue, churn_trend, churn_trend_days, created_at, updated_at";

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get("id")?,
        name: row.get("name")?,
        segment: row.get("segment")?,
        since: row.get("since")?,
        churn_risk: row.get("churn_risk")?,
        contacts: Contact {
            primary: row.get("contact_primary")?,
            secondary: row.get("contact_secondary")?,
            preferred_time: row.get("preferred_time")?,
            last_call: row.get("last_call")?,
        },
        monthly_revenue: row.get("monthly_revenue")?,
        churn_trend: row.get("churn_trend")?,
        churn_trend_days: row.get("churn_trend_days")?,
        created_at: parse_timestamp(row.get("created_at")?),
        updated_at: parse_timestamp(row.get("updated_at")?),
    })
}

impl ClientRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<Client>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM clients ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let clients = stmt
                    .query_map([], client_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(clients)
            })
            .await
    }

    pub async fn get_by_id(&self, id: String) -> Result<Option<Client>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM clients WHERE id = ?1", COLUMNS))?;
                let mut rows = stmt.query_map(params![id], client_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    /// Insert a client; a blank id gets a server-assigned UUID.
    pub async fn create(&self, mut client: Client) -> Result<Client> {
        if client.id.is_empty() {
            client.id = Uuid::new_v4().to_string();
        }
        self.db
            .with_connection(move |conn| {
                let now = now_rfc3339();
                conn.execute(
                    "INSERT INTO clients (id, name, segment, since, churn_risk, contact_primary, contact_secondary, preferred_time, last_call, monthly_revenue, churn_trend, churn_trend_days, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        client.id,
                        client.name,
                        client.segment,
                        client.since,
                        client.churn_risk,
                        client.contacts.primary,
                        client.contacts.secondary,
                        client.contacts.preferred_time,
                        client.contacts.last_call,
                        client.monthly_revenue,
                        client.churn_trend,
                        client.churn_trend_days,
                        now,
                    ],
                )
                .map_err(map_insert_error)?;
                client.created_at = parse_timestamp(Some(now));
                Ok(client)
            })
            .await
    }

    pub async fn update(&self, id: String, client: Client) -> Result<Option<Client>> {
        let lookup_id = id.clone();
        let updated = self
            .db
            .with_connection(move |conn| {
                let count = conn.execute(
                    "UPDATE clients SET name = ?1, segment = ?2, since = ?3, churn_risk = ?4, contact_primary = ?5, contact_secondary = ?6, preferred_time = ?7, last_call = ?8, monthly_revenue = ?9, churn_trend = ?10, churn_trend_days = ?11, updated_at = ?12
                     WHERE id = ?13",
                    params![
                        client.name,
                        client.segment,
                        client.since,
                        client.churn_risk,
                        client.contacts.primary,
                        client.contacts.secondary,
                        client.contacts.preferred_time,
                        client.contacts.last_call,
                        client.monthly_revenue,
                        client.churn_trend,
                        client.churn_trend_days,
                        now_rfc3339(),
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

    pub async fn delete(&self, id: String) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn.execute("DELETE FROM clients WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
    }
}
