use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub points: i64,
    pub current_page: i32,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Leaderboard display name: the email local part with the rest hidden.
    pub fn display_name(&self) -> String {
        let local = self.email.split('@').next().unwrap_or_default();
        format!("{local}***")
    }
}
