use super::{map_insert_error, now_rfc3339, parse_timestamp};
use crate::db::Db;
use crate::entities::{CustomerIncidentPrediction, IncidentType};
use crate::error::{ChurnError, Result};
use crate::ingest::BatchStore;
use async_trait::async_trait;
use rusqlite::{params, Row};

/// SQLite-backed storage for customer incident predictions.
///
/// `customer_id` carries a UNIQUE constraint; violations surface as
/// `ChurnError::Conflict` from both single and batch inserts.
pub struct PredictionRepo {
    db: Db,
}

const COLUMNS: &str = "id, customer_id, client_region, client_type, client_category, q1_prediction, q2_prediction, q3_prediction, q4_prediction, most_likely_incident, recommendation, created_at, updated_at";

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerIncidentPrediction> {
    let incident: String = row.get("most_likely_incident")?;
    Ok(CustomerIncidentPrediction {
        id: row.get("id")?,
        customer_id: row.get("customer_id")?,
        client_region: row.get("client_region")?,
        client_type: row.get("client_type")?,
        client_category: row.get("client_category")?,
        q1_prediction: row.get("q1_prediction")?,
        q2_prediction: row.get("q2_prediction")?,
        q3_prediction: row.get("q3_prediction")?,
        q4_prediction: row.get("q4_prediction")?,
        most_likely_incident: IncidentType::parse(&incident)
            .unwrap_or(IncidentType::OtherIncident),
        recommendation: row.get("recommendation")?,
        created_at: parse_timestamp(row.get("created_at")?),
        updated_at: parse_timestamp(row.get("updated_at")?),
    })
}

impl PredictionRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> Result<Vec<CustomerIncidentPrediction>> {
        self.query(format!(
            "SELECT {} FROM customer_incident_predictions ORDER BY created_at DESC",
            COLUMNS
        ))
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_incident_predictions WHERE id = ?1",
                    COLUMNS
                ))?;
                let mut rows = stmt.query_map(params![id], prediction_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    pub async fn get_by_customer_id(
        &self,
        customer_id: String,
    ) -> Result<Option<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_incident_predictions WHERE customer_id = ?1",
                    COLUMNS
                ))?;
                let mut rows = stmt.query_map(params![customer_id], prediction_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    pub async fn get_by_region(&self, region: String) -> Result<Vec<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_incident_predictions WHERE client_region = ?1 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let predictions = stmt
                    .query_map(params![region], prediction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(predictions)
            })
            .await
    }

    pub async fn get_by_incident_type(
        &self,
        incident_type: IncidentType,
    ) -> Result<Vec<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_incident_predictions WHERE most_likely_incident = ?1 ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let predictions = stmt
                    .query_map(params![incident_type.as_str()], prediction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(predictions)
            })
            .await
    }

    /// Predictions whose averaged quarterly risk meets the threshold
    pub async fn get_by_min_risk(&self, min_risk: f64) -> Result<Vec<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM customer_incident_predictions
                     WHERE (q1_prediction + q2_prediction + q3_prediction + q4_prediction) / 4.0 >= ?1
                     ORDER BY created_at DESC",
                    COLUMNS
                ))?;
                let predictions = stmt
                    .query_map(params![min_risk], prediction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(predictions)
            })
            .await
    }

    pub async fn create(
        &self,
        mut prediction: CustomerIncidentPrediction,
    ) -> Result<CustomerIncidentPrediction> {
        self.db
            .with_connection(move |conn| {
                let now = now_rfc3339();
                conn.execute(
                    "INSERT INTO customer_incident_predictions (customer_id, client_region, client_type, client_category, q1_prediction, q2_prediction, q3_prediction, q4_prediction, most_likely_incident, recommendation, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        prediction.customer_id,
                        prediction.client_region,
                        prediction.client_type,
                        prediction.client_category,
                        prediction.q1_prediction,
                        prediction.q2_prediction,
                        prediction.q3_prediction,
                        prediction.q4_prediction,
                        prediction.most_likely_incident.as_str(),
                        prediction.recommendation,
                        now,
                    ],
                )
                .map_err(map_insert_error)?;
                prediction.id = Some(conn.last_insert_rowid());
                prediction.created_at = parse_timestamp(Some(now));
                Ok(prediction)
            })
            .await
    }

    /// Replace every mutable field of the prediction with the given id.
    pub async fn update(
        &self,
        id: i64,
        prediction: CustomerIncidentPrediction,
    ) -> Result<Option<CustomerIncidentPrediction>> {
        let updated = self
            .db
            .with_connection(move |conn| {
                let count = conn
                    .execute(
                        "UPDATE customer_incident_predictions SET customer_id = ?1, client_region = ?2, client_type = ?3, client_category = ?4, q1_prediction = ?5, q2_prediction = ?6, q3_prediction = ?7, q4_prediction = ?8, most_likely_incident = ?9, recommendation = ?10, updated_at = ?11
                         WHERE id = ?12",
                        params![
                            prediction.customer_id,
                            prediction.client_region,
                            prediction.client_type,
                            prediction.client_category,
                            prediction.q1_prediction,
                            prediction.q2_prediction,
                            prediction.q3_prediction,
                            prediction.q4_prediction,
                            prediction.most_likely_incident.as_str(),
                            prediction.recommendation,
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
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM customer_incident_predictions WHERE id = ?1",
                    params![id],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    async fn query(&self, sql: String) -> Result<Vec<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let predictions = stmt
                    .query_map([], prediction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(predictions)
            })
            .await
    }
}

#[async_trait]
impl BatchStore<CustomerIncidentPrediction> for PredictionRepo {
    async fn batch_create(
        &self,
        records: Vec<CustomerIncidentPrediction>,
    ) -> Result<Vec<CustomerIncidentPrediction>> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let now = now_rfc3339();
                let mut created = Vec::with_capacity(records.len());
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO customer_incident_predictions (customer_id, client_region, client_type, client_category, q1_prediction, q2_prediction, q3_prediction, q4_prediction, most_likely_incident, recommendation, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    )?;
                    for mut prediction in records {
                        stmt.execute(params![
                            prediction.customer_id,
                            prediction.client_region,
                            prediction.client_type,
                            prediction.client_category,
                            prediction.q1_prediction,
                            prediction.q2_prediction,
                            prediction.q3_prediction,
                            prediction.q4_prediction,
                            prediction.most_likely_incident.as_str(),
                            prediction.recommendation,
                            now,
                        ])
                        .map_err(map_insert_error)?;
                        prediction.id = Some(tx.last_insert_rowid());
                        prediction.created_at = parse_timestamp(Some(now.clone()));
                        created.push(prediction);
                    }
                }
                tx.commit()?;
                Ok::<_, ChurnError>(created)
            })
            .await
    }

    /// Point lookup per key. Fine at upload volumes; revisit if batches grow.
    async fn find_existing_keys(&self, keys: &[String]) -> Result<Vec<String>> {
        let keys = keys.to_vec();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT 1 FROM customer_incident_predictions WHERE customer_id = ?1",
                )?;
                let mut existing = Vec::new();
                for key in keys {
                    if stmt.exists(params![&key])? {
                        existing.push(key);
                    }
                }
                Ok(existing)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::test_util::test_db;

    fn prediction(customer_id: &str, q: f64) -> CustomerIncidentPrediction {
        CustomerIncidentPrediction {
            id: None,
            customer_id: customer_id.to_string(),
            client_region: "north".to_string(),
            client_type: "residential".to_string(),
            client_category: Some(1.0),
            q1_prediction: q,
            q2_prediction: q,
            q3_prediction: q,
            q4_prediction: q,
            most_likely_incident: IncidentType::WifiIssue,
            recommendation: "Check signal".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        let created = repo.create(prediction("C100", 10.0)).await.unwrap();
        assert!(created.id.is_some());
        assert!(created.created_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_customer_id_is_conflict() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        repo.create(prediction("C100", 10.0)).await.unwrap();
        let err = repo.create(prediction("C100", 20.0)).await.unwrap_err();
        assert!(err.is_conflict(), "expected Conflict, got: {:?}", err);
    }

    #[tokio::test]
    async fn test_batch_conflict_rolls_back_everything() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        repo.create(prediction("C100", 10.0)).await.unwrap();

        let err = repo
            .batch_create(vec![prediction("C200", 5.0), prediction("C100", 5.0)])
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // the transaction rolled back: C200 must not exist
        assert!(repo
            .get_by_customer_id("C200".to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_existing_keys() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        repo.create(prediction("C100", 10.0)).await.unwrap();
        repo.create(prediction("C200", 10.0)).await.unwrap();

        let existing = repo
            .find_existing_keys(&[
                "C100".to_string(),
                "C300".to_string(),
                "C200".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(existing, vec!["C100".to_string(), "C200".to_string()]);
    }

    #[tokio::test]
    async fn test_filters() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        repo.create(prediction("C100", 70.0)).await.unwrap();
        let mut south = prediction("C200", 10.0);
        south.client_region = "south".to_string();
        south.most_likely_incident = IncidentType::Disconnection;
        repo.create(south).await.unwrap();

        assert_eq!(repo.get_by_region("south".to_string()).await.unwrap().len(), 1);
        assert_eq!(
            repo.get_by_incident_type(IncidentType::WifiIssue)
                .await
                .unwrap()
                .len(),
            1
        );

        let high_risk = repo.get_by_min_risk(60.0).await.unwrap();
        assert_eq!(high_risk.len(), 1);
        assert_eq!(high_risk[0].customer_id, "C100");
        assert_eq!(high_risk[0].risk_level(), "High");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, _tmp) = test_db().await;
        let repo = PredictionRepo::new(db);

        let created = repo.create(prediction("C100", 10.0)).await.unwrap();
        let id = created.id.unwrap();

        let mut changed = prediction("C100", 45.0);
        changed.recommendation = "Escalate".to_string();
        let updated = repo.update(id, changed).await.unwrap().unwrap();
        assert_eq!(updated.recommendation, "Escalate");
        assert!(updated.updated_at.is_some());
        assert_eq!(updated.risk_level(), "Medium");

        assert!(repo.delete(id).await.unwrap());
        assert!(repo.get_by_id(id).await.unwrap().is_none());
        assert!(repo.update(id, prediction("C100", 1.0)).await.unwrap().is_none());
    }
}
