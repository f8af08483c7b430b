use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
    /// Raw stored document; read it through `features::PartialFeatureConfig`
    pub subscribed_features: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Organization {
    pub fn is_suspended(&self) -> bool {
        self.status == "suspended"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// `None` only for platform-scoped super admins
    pub organization_id: Option<Uuid>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from(self.role.as_str())
    }
}

/// Fields required to register a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub event_date: OffsetDateTime,
    pub lead_planner_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One page of an event listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub items: Vec<Event>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

// User roles. Unrecognized names are kept rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperAdmin,
    PlannerOwner,
    Planner,
    Finance,
    Vendor,
    Coordinator,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::PlannerOwner => "PLANNER_OWNER",
            Role::Planner => "PLANNER",
            Role::Finance => "FINANCE",
            Role::Vendor => "VENDOR",
            Role::Coordinator => "COORDINATOR",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "SUPER_ADMIN" => Role::SuperAdmin,
            "PLANNER_OWNER" => Role::PlannerOwner,
            "PLANNER" => Role::Planner,
            "FINANCE" => Role::Finance,
            "VENDOR" => Role::Vendor,
            "COORDINATOR" => Role::Coordinator,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Authenticated session for a single request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role: Role,
}

impl AuthContext {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip() {
        for role in [
            Role::SuperAdmin,
            Role::PlannerOwner,
            Role::Planner,
            Role::Finance,
            Role::Vendor,
            Role::Coordinator,
        ] {
            assert_eq!(Role::from(role.as_str()), role);
        }
    }

    #[test]
    fn test_unknown_role_is_kept() {
        let role: Role = serde_json::from_str("\"EVENT_HOST\"").unwrap();
        assert_eq!(role, Role::Other("EVENT_HOST".to_string()));
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"EVENT_HOST\"");
    }
}
