//! In-memory `LedgerStore` with the same uniqueness and atomicity rules as Postgres.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{BonusClaim, SessionLogEntry, SoldDataEntry, User};
use crate::store::{
    Committed, LedgerStore, NewSessionLog, OnDuplicate, SaleInsert, ScoreDelta, StoreError,
    StoreStats,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sold: Vec<SoldDataEntry>,
    claims: Vec<BonusClaim>,
    sessions: Vec<SessionLogEntry>,
}

impl Tables {
    fn slot_taken(&self, user_id: Uuid, sale: &SaleInsert) -> bool {
        self.sold.iter().any(|e| {
            e.user_id == user_id && e.data_type == sale.data_type && e.item_index == sale.item_index
        })
    }

    fn push_sale(&mut self, user_id: Uuid, sale: &SaleInsert) {
        self.sold.push(SoldDataEntry {
            id: Uuid::new_v4(),
            user_id,
            data_type: sale.data_type.clone(),
            item_index: sale.item_index,
            data_value: sale.value.clone(),
            points: sale.points,
            protection_level: None,
            created_at: Utc::now(),
        });
    }
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: rewrite a user's `last_login` to simulate elapsed time.
    pub fn set_last_login(&self, user_id: Uuid, at: Option<chrono::DateTime<Utc>>) {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login = at;
        }
    }

    /// Test hook: overwrite a user's balance.
    pub fn set_points(&self, user_id: Uuid, points: i64) {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.points = points;
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, email: &str, opening_sale: SaleInsert) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        if tables.users.iter().any(|u| u.email == email) {
            return Err(StoreError::Duplicate(format!("email {email}")));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            points: opening_sale.points,
            current_page: 1,
            last_login: None,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        tables.push_sale(user.id, &opening_sale);
        Ok(user)
    }

    // The existence checks yield after reading, like a database round trip,
    // so concurrent callers can both see "not yet" before either commits.
    async fn has_sold(&self, user_id: Uuid, data_type: &str) -> Result<bool, StoreError> {
        let sold = {
            let tables = self.tables.lock().expect("memory store poisoned");
            tables
                .sold
                .iter()
                .any(|e| e.user_id == user_id && e.data_type == data_type)
        };
        tokio::task::yield_now().await;
        Ok(sold)
    }

    async fn has_claimed(&self, user_id: Uuid, key: &str) -> Result<bool, StoreError> {
        let claimed = {
            let tables = self.tables.lock().expect("memory store poisoned");
            tables
                .claims
                .iter()
                .any(|c| c.user_id == user_id && c.page == key)
        };
        tokio::task::yield_now().await;
        Ok(claimed)
    }

    async fn commit(&self, user_id: Uuid, delta: ScoreDelta) -> Result<Committed, StoreError> {
        let mut tables = self.tables.lock().expect("memory store poisoned");

        // Validate everything before touching any table.
        let current = tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(StoreError::UserNotFound(user_id))?;
        if let Some(stamp) = &delta.login {
            if current.last_login != stamp.expected_previous {
                return Err(StoreError::StaleLogin);
            }
        }
        if delta.cost > current.points {
            return Err(StoreError::InsufficientBalance {
                required: delta.cost,
                available: current.points,
            });
        }
        let mut accepted = Vec::new();
        for sale in &delta.sales {
            if tables.slot_taken(user_id, sale) {
                match sale.on_duplicate {
                    OnDuplicate::Reject => {
                        return Err(StoreError::Duplicate(format!("sale of {}", sale.data_type)))
                    }
                    OnDuplicate::Skip => continue,
                }
            }
            accepted.push(sale);
        }
        if let Some(claim) = &delta.claim {
            if tables
                .claims
                .iter()
                .any(|c| c.user_id == user_id && c.page == claim.key)
            {
                return Err(StoreError::Duplicate(format!("claim {}", claim.key)));
            }
        }

        let points_added = accepted
            .iter()
            .try_fold(delta.award, |sum, sale| sum.checked_add(sale.points))
            .ok_or(StoreError::BalanceOverflow)?;
        let balance = current
            .points
            .checked_add(points_added)
            .and_then(|p| p.checked_sub(delta.cost))
            .ok_or(StoreError::BalanceOverflow)?;
        let sales_recorded = accepted.len();
        for sale in accepted {
            tables.push_sale(user_id, sale);
        }
        if let Some(claim) = &delta.claim {
            tables.claims.push(BonusClaim {
                id: Uuid::new_v4(),
                user_id,
                page: claim.key.clone(),
                points: claim.points,
                created_at: Utc::now(),
            });
        }
        let mut entries_protected = 0;
        if let Some(level) = &delta.protect_level {
            for entry in tables
                .sold
                .iter_mut()
                .filter(|e| e.user_id == user_id && e.protection_level.is_none())
            {
                entry.protection_level = Some(level.clone());
                entries_protected += 1;
            }
        }

        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.points = balance;
        if delta.advance_page {
            user.current_page += 1;
        }
        if let Some(stamp) = delta.login {
            user.last_login = Some(stamp.at);
        }

        Ok(Committed {
            user: user.clone(),
            points_added,
            sales_recorded,
            entries_protected,
        })
    }

    async fn sold_entries(&self, user_id: Uuid) -> Result<Vec<SoldDataEntry>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        Ok(tables
            .sold
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn sold_entries_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<SoldDataEntry>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        Ok(tables
            .sold
            .iter()
            .filter(|e| user_ids.contains(&e.user_id))
            .cloned()
            .collect())
    }

    async fn bonus_claims(&self, user_id: Uuid) -> Result<Vec<BonusClaim>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        Ok(tables
            .claims
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_session(&self, log: NewSessionLog) -> Result<SessionLogEntry, StoreError> {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        if !tables.users.iter().any(|u| u.id == log.user_id) {
            return Err(StoreError::UserNotFound(log.user_id));
        }
        let entry = SessionLogEntry {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            session_start: log.session_start,
            duration_secs: log.duration_secs,
            pages_visited: log.pages_visited,
            created_at: Utc::now(),
        };
        tables.sessions.push(entry.clone());
        Ok(entry)
    }

    async fn top_users(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        let mut users = tables.users.clone();
        users.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        users.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(users)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let tables = self.tables.lock().expect("memory store poisoned");
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(StoreStats {
            users: count(tables.users.len()),
            sold_entries: count(tables.sold.len()),
            bonus_claims: count(tables.claims.len()),
            session_logs: count(tables.sessions.len()),
        })
    }
}
