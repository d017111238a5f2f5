use serde::{Deserialize, Serialize};

pub const DEFAULT_ISSUE_STATUS: &str = "not sent";

/// A churn-relevant customer issue.
///
/// The upstream analytics export encodes every categorical field as a numeric
/// code, and any of them may be blank, so all of these are optional floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerIssue {
    pub customer_id: Option<f64>,
    pub code_contrat: Option<f64>,
    pub client_type: Option<f64>,
    pub client_region: Option<f64>,
    pub client_categorie: Option<f64>,
    pub incident_title: Option<String>,
    pub churn_risk: Option<f64>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    DEFAULT_ISSUE_STATUS.to_string()
}

impl Default for CustomerIssue {
    fn default() -> Self {
        Self {
            customer_id: None,
            code_contrat: None,
            client_type: None,
            client_region: None,
            client_categorie: None,
            incident_title: None,
            churn_risk: None,
            status: default_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status() {
        let issue = CustomerIssue::default();
        assert_eq!(issue.status, "not sent");
        assert!(issue.customer_id.is_none());
    }

    #[test]
    fn test_status_defaults_on_deserialize() {
        let issue: CustomerIssue = serde_json::from_str(r#"{"customer_id": 42.0}"#).unwrap();
        assert_eq!(issue.status, "not sent");
        assert_eq!(issue.customer_id, Some(42.0));
    }
}
