//! Storage port for the scoring ledger.
//!
//! The engine decides *what* changes; a `LedgerStore` applies each change set
//! (`ScoreDelta`) atomically. Postgres is the production backend; tests use the
//! in-memory backend in `memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BonusClaim, SessionLogEntry, SoldDataEntry, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgLedgerStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key (email, sale slot, claim key) already exists.
    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    /// Applying the delta would push the balance past `i64::MAX`.
    #[error("point balance overflow")]
    BalanceOverflow,

    /// `last_login` changed between the engine's read and the commit.
    #[error("last login changed concurrently")]
    StaleLogin,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What to do when a sale slot `(user, data_type, item_index)` is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Abort the whole delta with `StoreError::Duplicate`.
    Reject,
    /// Skip this row and do not award its points.
    Skip,
}

#[derive(Debug, Clone)]
pub struct SaleInsert {
    pub data_type: String,
    pub item_index: i32,
    pub value: String,
    pub points: i64,
    pub on_duplicate: OnDuplicate,
}

impl SaleInsert {
    pub fn new(data_type: impl Into<String>, value: impl Into<String>, points: i64) -> Self {
        Self {
            data_type: data_type.into(),
            item_index: 0,
            value: value.into(),
            points,
            on_duplicate: OnDuplicate::Reject,
        }
    }

    pub fn at_index(mut self, item_index: i32) -> Self {
        self.item_index = item_index;
        self
    }

    pub fn skip_if_sold(mut self) -> Self {
        self.on_duplicate = OnDuplicate::Skip;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClaimInsert {
    pub key: String,
    pub points: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct LoginStamp {
    pub at: DateTime<Utc>,
    /// The `last_login` the engine based its decision on.
    pub expected_previous: Option<DateTime<Utc>>,
}

/// One engine action, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct ScoreDelta {
    /// Flat award not tied to a ledger row (bonuses).
    pub award: i64,
    /// Deducted from the balance; the delta fails if it exceeds the balance.
    pub cost: i64,
    pub sales: Vec<SaleInsert>,
    pub claim: Option<ClaimInsert>,
    pub advance_page: bool,
    pub login: Option<LoginStamp>,
    /// Mark every unprotected ledger entry with this level.
    pub protect_level: Option<String>,
}

impl ScoreDelta {
    pub fn is_noop(&self) -> bool {
        self.award == 0
            && self.cost == 0
            && self.sales.is_empty()
            && self.claim.is_none()
            && !self.advance_page
            && self.login.is_none()
            && self.protect_level.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Committed {
    pub user: User,
    /// Points credited by this delta (award + inserted sales), before cost.
    pub points_added: i64,
    pub sales_recorded: usize,
    pub entries_protected: u64,
}

#[derive(Debug, Clone)]
pub struct NewSessionLog {
    pub user_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub duration_secs: i64,
    pub pages_visited: String,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub sold_entries: i64,
    pub bonus_claims: i64,
    pub session_logs: i64,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a user whose balance is seeded by `opening_sale`, in one transaction.
    /// Fails with `Duplicate` when the email is taken.
    async fn create_user(&self, email: &str, opening_sale: SaleInsert) -> Result<User, StoreError>;

    async fn has_sold(&self, user_id: Uuid, data_type: &str) -> Result<bool, StoreError>;

    async fn has_claimed(&self, user_id: Uuid, key: &str) -> Result<bool, StoreError>;

    async fn commit(&self, user_id: Uuid, delta: ScoreDelta) -> Result<Committed, StoreError>;

    async fn sold_entries(&self, user_id: Uuid) -> Result<Vec<SoldDataEntry>, StoreError>;

    /// Ledger entries of every listed user, in one query.
    async fn sold_entries_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<SoldDataEntry>, StoreError>;

    async fn bonus_claims(&self, user_id: Uuid) -> Result<Vec<BonusClaim>, StoreError>;

    async fn record_session(&self, log: NewSessionLog) -> Result<SessionLogEntry, StoreError>;

    /// Users ordered by points descending.
    async fn top_users(&self, limit: i64) -> Result<Vec<User>, StoreError>;

    async fn stats(&self) -> Result<StoreStats, StoreError>;
}
