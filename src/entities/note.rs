use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An internal note routed to one or more agent roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: String,
    pub sender_id: String,
    /// Role tags, e.g. "marketing_agent"
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
