use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub role_id: Uuid,
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub currency_code: Option<String>,
    pub ip_address: Option<String>,
    pub ip_region: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub active_code: i32,
    pub stripe_customer_id: Option<String>,
    pub keycloak_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "Firstname Lastname", or whichever part is present.
    pub fn display_name(&self) -> String {
        [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
