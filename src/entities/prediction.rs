use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of incident categories the prediction model emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    InternetProblem,
    WifiIssue,
    HardwareConfig,
    SlowConnection,
    Disconnection,
    OtherIncident,
}

impl IncidentType {
    pub const ALL: [IncidentType; 6] = [
        IncidentType::InternetProblem,
        IncidentType::WifiIssue,
        IncidentType::HardwareConfig,
        IncidentType::SlowConnection,
        IncidentType::Disconnection,
        IncidentType::OtherIncident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::InternetProblem => "internet_problem",
            IncidentType::WifiIssue => "wifi_issue",
            IncidentType::HardwareConfig => "hardware_config",
            IncidentType::SlowConnection => "slow_connection",
            IncidentType::Disconnection => "disconnection",
            IncidentType::OtherIncident => "other_incident",
        }
    }

    /// Parse a wire tag; returns None for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }

    /// Comma-separated list of valid tags, used in validation messages.
    pub fn valid_types() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted incident risk for one customer across the next four quarters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerIncidentPrediction {
    #[serde(default)]
    pub id: Option<i64>,
    pub customer_id: String,
    pub client_region: String,
    pub client_type: String,
    #[serde(default)]
    pub client_category: Option<f64>,
    #[serde(default)]
    pub q1_prediction: f64,
    #[serde(default)]
    pub q2_prediction: f64,
    #[serde(default)]
    pub q3_prediction: f64,
    #[serde(default)]
    pub q4_prediction: f64,
    pub most_likely_incident: IncidentType,
    pub recommendation: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CustomerIncidentPrediction {
    /// Average risk percentage across all four quarters
    pub fn average_risk_percentage(&self) -> f64 {
        (self.q1_prediction + self.q2_prediction + self.q3_prediction + self.q4_prediction) / 4.0
    }

    /// Risk level derived from the averaged quarterly scores
    pub fn risk_level(&self) -> &'static str {
        let avg = self.average_risk_percentage();
        if avg >= 60.0 {
            "High"
        } else if avg >= 30.0 {
            "Medium"
        } else {
            "Low"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction_with_quarters(q1: f64, q2: f64, q3: f64, q4: f64) -> CustomerIncidentPrediction {
        CustomerIncidentPrediction {
            id: None,
            customer_id: "C001".to_string(),
            client_region: "north".to_string(),
            client_type: "residential".to_string(),
            client_category: None,
            q1_prediction: q1,
            q2_prediction: q2,
            q3_prediction: q3,
            q4_prediction: q4,
            most_likely_incident: IncidentType::WifiIssue,
            recommendation: "Upgrade router firmware".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_incident_type_roundtrip() {
        for t in IncidentType::ALL {
            assert_eq!(IncidentType::parse(t.as_str()), Some(t));
        }
        assert_eq!(IncidentType::parse("volcano"), None);
    }

    #[test]
    fn test_incident_type_serde_tag() {
        let json = serde_json::to_string(&IncidentType::SlowConnection).unwrap();
        assert_eq!(json, "\"slow_connection\"");
        let back: IncidentType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IncidentType::SlowConnection);
    }

    #[test]
    fn test_average_risk() {
        let p = prediction_with_quarters(10.0, 20.0, 30.0, 40.0);
        assert!((p.average_risk_percentage() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(prediction_with_quarters(60.0, 60.0, 60.0, 60.0).risk_level(), "High");
        assert_eq!(prediction_with_quarters(30.0, 30.0, 30.0, 30.0).risk_level(), "Medium");
        assert_eq!(prediction_with_quarters(29.9, 29.9, 29.9, 29.9).risk_level(), "Low");
    }

    #[test]
    fn test_valid_types_message() {
        let listing = IncidentType::valid_types();
        assert!(listing.contains("internet_problem"));
        assert!(listing.contains("other_incident"));
    }
}
