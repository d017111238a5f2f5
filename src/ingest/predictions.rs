use super::{CsvImport, CsvRow, ParsedRow, RowError};
use crate::entities::{CustomerIncidentPrediction, IncidentType};

/// CSV import profile for customer incident predictions.
///
/// Expected headers: customer_id, client_region, client_type,
/// client_category, q1_prediction, q2_prediction, q3_prediction,
/// q4_prediction, most_likely_incident, recommendation.
///
/// `customer_id` must be unique within the file and must not already exist
/// in storage; the whole upload is rejected when any key does.
pub struct PredictionCsv;

impl PredictionCsv {
    fn quarter(row: &CsvRow<'_>, field: &str) -> Result<f64, RowError> {
        // blank scores default to 0.0; only malformed text fails
        row.parse_f64(field)
            .map(|v| v.unwrap_or(0.0))
            .map_err(|_| row.error("Invalid prediction values"))
    }
}

impl CsvImport for PredictionCsv {
    type Record = CustomerIncidentPrediction;

    fn entity_label(&self) -> &'static str {
        "customer incident predictions"
    }

    fn key_column(&self) -> Option<&'static str> {
        Some("customer_id")
    }

    fn precheck_existing(&self) -> bool {
        true
    }

    fn parse_row(&self, row: &CsvRow<'_>) -> Result<ParsedRow<CustomerIncidentPrediction>, RowError> {
        let customer_id = row.required_text("customer_id", "customer_id")?;
        let client_region = row.required_text("client_region", "client_region")?;
        let client_type = row.required_text("client_type", "client_type")?;
        let incident_text = row.required_text("most_likely_incident", "most_likely_incident")?;
        let recommendation = row.required_text("recommendation", "recommendation")?;

        let client_category = row
            .parse_f64("client_category")
            .map_err(|_| row.error("Invalid client_category value"))?;

        let q1_prediction = Self::quarter(row, "q1_prediction")?;
        let q2_prediction = Self::quarter(row, "q2_prediction")?;
        let q3_prediction = Self::quarter(row, "q3_prediction")?;
        let q4_prediction = Self::quarter(row, "q4_prediction")?;

        let most_likely_incident = IncidentType::parse(&incident_text).ok_or_else(|| {
            row.error(format!(
                "Invalid incident type '{}'. Valid types: {}",
                incident_text,
                IncidentType::valid_types()
            ))
        })?;

        Ok(ParsedRow::new(CustomerIncidentPrediction {
            id: None,
            customer_id,
            client_region,
            client_type,
            client_category,
            q1_prediction,
            q2_prediction,
            q3_prediction,
            q4_prediction,
            most_likely_incident,
            recommendation,
            created_at: None,
            updated_at: None,
        }))
    }
}
