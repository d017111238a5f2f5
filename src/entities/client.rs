use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contact channels for a client account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub last_call: Option<String>,
}

/// A managed client account with its churn posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub segment: String,
    pub since: String,
    pub churn_risk: String,
    pub contacts: Contact,
    #[serde(default)]
    pub monthly_revenue: Option<f64>,
    #[serde(default)]
    pub churn_trend: Option<String>,
    #[serde(default)]
    pub churn_trend_days: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
