use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::models::{BonusClaim, SessionLogEntry, SoldDataEntry, User};
use crate::store::{
    Committed, LedgerStore, NewSessionLog, OnDuplicate, SaleInsert, ScoreDelta, StoreError,
    StoreStats,
};

/// Postgres-backed ledger. Unique constraints on `users.email`,
/// `sold_data (user_id, data_type, item_index)` and `bonus_claims (user_id, page)`
/// are the authoritative idempotency guards.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn duplicate_or(err: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(what);
        }
    }
    StoreError::Database(err)
}

/// Inserts one ledger row. Returns `false` when an `OnDuplicate::Skip` row was already taken.
async fn insert_sale(
    conn: &mut PgConnection,
    user_id: Uuid,
    sale: &SaleInsert,
) -> Result<bool, StoreError> {
    match sale.on_duplicate {
        OnDuplicate::Reject => {
            sqlx::query(
                r#"
                INSERT INTO sold_data (id, user_id, data_type, item_index, data_value, points)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&sale.data_type)
            .bind(sale.item_index)
            .bind(&sale.value)
            .bind(sale.points)
            .execute(&mut *conn)
            .await
            .map_err(|e| duplicate_or(e, format!("sale of {}", sale.data_type)))?;
            Ok(true)
        }
        OnDuplicate::Skip => {
            let result = sqlx::query(
                r#"
                INSERT INTO sold_data (id, user_id, data_type, item_index, data_value, points)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (user_id, data_type, item_index) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&sale.data_type)
            .bind(sale.item_index)
            .bind(&sale.value)
            .bind(sale.points)
            .execute(&mut *conn)
            .await?;
            Ok(result.rows_affected() == 1)
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_user(&self, email: &str, opening_sale: SaleInsert) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, points, current_page)
            VALUES ($1, $2, $3, 1)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(opening_sale.points)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_or(e, format!("email {email}")))?;

        insert_sale(&mut tx, user.id, &opening_sale).await?;
        tx.commit().await?;

        debug!("Created user {} with opening sale {}", user.id, opening_sale.data_type);
        Ok(user)
    }

    async fn has_sold(&self, user_id: Uuid, data_type: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM sold_data WHERE user_id = $1 AND data_type = $2)",
        )
        .bind(user_id)
        .bind(data_type)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn has_claimed(&self, user_id: Uuid, key: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM bonus_claims WHERE user_id = $1 AND page = $2)",
        )
        .bind(user_id)
        .bind(key)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn commit(&self, user_id: Uuid, delta: ScoreDelta) -> Result<Committed, StoreError> {
        if delta.is_noop() {
            let user = self
                .find_user(user_id)
                .await?
                .ok_or(StoreError::UserNotFound(user_id))?;
            return Ok(Committed {
                user,
                points_added: 0,
                sales_recorded: 0,
                entries_protected: 0,
            });
        }

        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent actions on the same user, so the
        // balance computed below is the one written.
        let current = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
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

        let mut points_added = delta.award;
        let mut sales_recorded = 0;
        for sale in &delta.sales {
            if insert_sale(&mut tx, user_id, sale).await? {
                points_added = points_added
                    .checked_add(sale.points)
                    .ok_or(StoreError::BalanceOverflow)?;
                sales_recorded += 1;
            }
        }

        if let Some(claim) = &delta.claim {
            sqlx::query(
                "INSERT INTO bonus_claims (id, user_id, page, points) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&claim.key)
            .bind(claim.points)
            .execute(&mut *tx)
            .await
            .map_err(|e| duplicate_or(e, format!("claim {}", claim.key)))?;
        }

        let balance = current
            .points
            .checked_add(points_added)
            .and_then(|p| p.checked_sub(delta.cost))
            .ok_or(StoreError::BalanceOverflow)?;

        let mut entries_protected = 0;
        if let Some(level) = &delta.protect_level {
            entries_protected = sqlx::query(
                r#"
                UPDATE sold_data SET protection_level = $2
                WHERE user_id = $1 AND protection_level IS NULL
                "#,
            )
            .bind(user_id)
            .bind(level)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET points = $2,
                current_page = current_page + $3,
                last_login = COALESCE($4, last_login)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(balance)
        .bind(i32::from(delta.advance_page))
        .bind(delta.login.map(|stamp| stamp.at))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Committed {
            user,
            points_added,
            sales_recorded,
            entries_protected,
        })
    }

    async fn sold_entries(&self, user_id: Uuid) -> Result<Vec<SoldDataEntry>, StoreError> {
        Ok(sqlx::query_as::<_, SoldDataEntry>(
            "SELECT * FROM sold_data WHERE user_id = $1 ORDER BY created_at, data_type, item_index",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn sold_entries_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<SoldDataEntry>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_as::<_, SoldDataEntry>(
            r#"
            SELECT * FROM sold_data
            WHERE user_id = ANY($1)
            ORDER BY user_id, created_at, data_type, item_index
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn bonus_claims(&self, user_id: Uuid) -> Result<Vec<BonusClaim>, StoreError> {
        Ok(sqlx::query_as::<_, BonusClaim>(
            "SELECT * FROM bonus_claims WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_session(&self, log: NewSessionLog) -> Result<SessionLogEntry, StoreError> {
        Ok(sqlx::query_as::<_, SessionLogEntry>(
            r#"
            INSERT INTO session_logs (id, user_id, session_start, duration_secs, pages_visited)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(log.session_start)
        .bind(log.duration_secs)
        .bind(&log.pages_visited)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return StoreError::UserNotFound(log.user_id);
                }
            }
            StoreError::Database(e)
        })?)
    }

    async fn top_users(&self, limit: i64) -> Result<Vec<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY points DESC, created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (users, sold_entries, bonus_claims, session_logs) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM sold_data),
                    (SELECT COUNT(*) FROM bonus_claims),
                    (SELECT COUNT(*) FROM session_logs)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            users,
            sold_entries,
            bonus_claims,
            session_logs,
        })
    }
}
