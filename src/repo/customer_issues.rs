use super::map_insert_error;
use crate::db::Db;
use crate::entities::CustomerIssue;
use crate::error::{ChurnError, Result};
use crate::ingest::BatchStore;
use async_trait::async_trait;
use rusqlite::{params, Row};

/// SQLite-backed storage for customer issues.
pub struct CustomerIssueRepo {
    db: Db,
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerIssue> {
    Ok(CustomerIssue {
        customer_id: row.get("customer_id")?,
        code_contrat: row.get("code_contrat")?,
        client_type: row.get("client_type")?,
        client_region: row.get("client_region")?,
        client_categorie: row.get("client_categorie")?,
        incident_title: row.get("incident_title")?,
        churn_risk: row.get("churn_risk")?,
        status: row.get("status")?,
    })
}

const COLUMNS: &str = "customer_id, code_contrat, client_type, client_region, client_categorie, incident_title, churn_risk, status";

impl CustomerIssueRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<CustomerIssue>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_issues ORDER BY id DESC",
                    COLUMNS
                ))?;
                let issues = stmt
                    .query_map([], issue_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(issues)
            })
            .await
    }

    pub async fn get_by_customer_id(&self, customer_id: f64) -> Result<Vec<CustomerIssue>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_issues WHERE customer_id = ?1 ORDER BY id DESC",
                    COLUMNS
                ))?;
                let issues = stmt
                    .query_map(params![customer_id], issue_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(issues)
            })
            .await
    }

    pub async fn create(&self, issue: CustomerIssue) -> Result<CustomerIssue> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO customer_issues (customer_id, code_contrat, client_type, client_region, client_categorie, incident_title, churn_risk, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        issue.customer_id,
                        issue.code_contrat,
                        issue.client_type,
                        issue.client_region,
                        issue.client_categorie,
                        issue.incident_title,
                        issue.churn_risk,
                        issue.status,
                    ],
                )
                .map_err(map_insert_error)?;
                Ok(issue)
            })
            .await
    }

    /// Replace the issue addressed by (customer_id, incident_title).
    /// Returns false when no such issue exists.
    pub async fn update_by_customer_and_title(
        &self,
        customer_id: f64,
        incident_title: String,
        issue: CustomerIssue,
    ) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let updated = conn.execute(
                    "UPDATE customer_issues SET customer_id = ?1, code_contrat = ?2, client_type = ?3, client_region = ?4, client_categorie = ?5, incident_title = ?6, churn_risk = ?7, status = ?8
                     WHERE customer_id = ?9 AND incident_title = ?10",
                    params![
                        issue.customer_id,
                        issue.code_contrat,
                        issue.client_type,
                        issue.client_region,
                        issue.client_categorie,
                        issue.incident_title,
                        issue.churn_risk,
                        issue.status,
                        customer_id,
                        incident_title,
                    ],
                )?;
                Ok(updated > 0)
            })
            .await
    }

    pub async fn delete_by_customer_and_title(
        &self,
        customer_id: f64,
        incident_title: String,
    ) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM customer_issues WHERE customer_id = ?1 AND incident_title = ?2",
                    params![customer_id, incident_title],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}

#[async_trait]
impl BatchStore<CustomerIssue> for CustomerIssueRepo {
    async fn batch_create(&self, records: Vec<CustomerIssue>) -> Result<Vec<CustomerIssue>> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO customer_issues (customer_id, code_contrat, client_type, client_region, client_categorie, incident_title, churn_risk, status)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for issue in &records {
                        stmt.execute(params![
                            issue.customer_id,
                            issue.code_contrat,
                            issue.client_type,
                            issue.client_region,
                            issue.client_categorie,
                            issue.incident_title,
                            issue.churn_risk,
                            issue.status,
                        ])
                        .map_err(map_insert_error)?;
                    }
                }
                tx.commit()?;
                Ok::<_, ChurnError>(records)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_util::test_db;

    fn issue(customer_id: f64, title: &str) -> CustomerIssue {
        CustomerIssue {
            customer_id: Some(customer_id),
            incident_title: Some(title.to_string()),
            churn_risk: Some(0.7),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (db, _tmp) = test_db().await;
        let repo = CustomerIssueRepo::new(db);

        repo.create(issue(1.0, "Outage")).await.unwrap();
        repo.create(issue(2.0, "Slow line")).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);

        let for_one = repo.get_by_customer_id(1.0).await.unwrap();
        assert_eq!(for_one.len(), 1);
        assert_eq!(for_one[0].incident_title.as_deref(), Some("Outage"));
    }

    #[tokio::test]
    async fn test_batch_create_is_atomic() {
        let (db, _tmp) = test_db().await;
        let repo = CustomerIssueRepo::new(db);

        let created = repo
            .batch_create(vec![issue(1.0, "A"), issue(2.0, "B"), issue(3.0, "C")])
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(repo.get_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_by_key() {
        let (db, _tmp) = test_db().await;
        let repo = CustomerIssueRepo::new(db);

        repo.create(issue(1.0, "Outage")).await.unwrap();

        let mut replacement = issue(1.0, "Outage");
        replacement.status = "sent".to_string();
        let updated = repo
            .update_by_customer_and_title(1.0, "Outage".to_string(), replacement)
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(repo.get_all().await.unwrap()[0].status, "sent");

        assert!(repo
            .delete_by_customer_and_title(1.0, "Outage".to_string())
            .await
            .unwrap());
        assert!(!repo
            .delete_by_customer_and_title(1.0, "Outage".to_string())
            .await
            .unwrap());
    }
}
