use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One sale in the append-only ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SoldDataEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data_type: String,
    pub item_index: i32,
    pub data_value: String,
    pub points: i64,
    pub protection_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SoldDataEntry {
    /// Value as shown back to clients. Protected entries only reveal a masked tag.
    pub fn display_value(&self) -> String {
        match &self.protection_level {
            Some(level) => format!("ENCRYPTED:{}:***", level.to_uppercase()),
            None => self.data_value.clone(),
        }
    }

    /// Coarse grouping used by the stats endpoint: the type prefix before `_`.
    pub fn category(&self) -> &str {
        self.data_type.split('_').next().unwrap_or(&self.data_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BonusClaim {
    pub id: Uuid,
    pub user_id: Uuid,
    pub page: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub duration_secs: i64,
    pub pages_visited: String,
    pub created_at: DateTime<Utc>,
}
