use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    MarketingAgent,
    TechnicalAgent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::MarketingAgent => "marketing_agent",
            UserRole::TechnicalAgent => "technical_agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(UserRole::Admin),
            "marketing_agent" => Some(UserRole::MarketingAgent),
            "technical_agent" => Some(UserRole::TechnicalAgent),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend user account.
///
/// Credential verification and token issuance happen in a separate identity
/// service; the stored hash is opaque to this backend and never serialized
/// back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("intern"), None);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "u1".to_string(),
            email: "a@b.c".to_string(),
            full_name: "Ana".to_string(),
            role: UserRole::Admin,
            password_hash: "secret".to_string(),
            created_at: None,
            updated_at: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
