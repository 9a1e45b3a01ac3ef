//! The scoring engine: sole authority over point totals and page progression.
//!
//! Every action reads what it needs, decides a `ScoreDelta`, and hands it to
//! the store to apply atomically. The reads are a fast path only; the store's
//! unique keys are what actually prevent a double sale or a double claim.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{SoldDataEntry, User};
use crate::scoring::errors::EngineError;
use crate::scoring::pricing::{self, PriceTable, DAILY_IP, EMAIL, FUNERAL_SCHEDULED, TRAVEL_DESTINATIONS};
use crate::scoring::rules::{PageId, ScoringRules, SocialBonusPolicy, SOCIAL_CLAIM_KEY};
use crate::scoring::signals::{ClientSignals, ServerSignals};
use crate::store::{
    ClaimInsert, LedgerStore, LoginStamp, NewSessionLog, SaleInsert, ScoreDelta, StoreError,
    StoreStats,
};

const MAX_TRAVEL_DESTINATIONS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub user: User,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub points_earned: i64,
    pub total: i64,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub points_added: i64,
    pub total: i64,
    pub collected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageBonusReceipt {
    pub points_awarded: i64,
    pub total: i64,
    pub current_page: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyBonus {
    pub added: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectionReceipt {
    pub total: i64,
    pub protected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_points: i64,
    pub data_items_sold: usize,
    pub member_since: String,
    pub last_login: String,
    pub current_page: i32,
    pub bonuses_claimed: usize,
    pub data_categories: BTreeMap<String, usize>,
}

/// Maps a duplicate-key failure to a conflict with a caller-chosen message.
fn conflict_or(err: StoreError, message: &str) -> EngineError {
    match err {
        StoreError::Duplicate(_) => EngineError::Conflict(message.to_string()),
        other => other.into(),
    }
}

const ALREADY_SOLD: &str = "You already sold that, greedy!";
const PAGE_ALREADY_CLAIMED: &str = "Bonus already claimed for this page";

pub struct ScoringEngine {
    store: Arc<dyn LedgerStore>,
    prices: PriceTable,
    rules: ScoringRules,
}

impl ScoringEngine {
    pub fn new(store: Arc<dyn LedgerStore>, prices: PriceTable, rules: ScoringRules) -> Self {
        Self {
            store,
            prices,
            rules,
        }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub(crate) fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Price for `data_type`, falling back to the configured default for unlisted types.
    pub fn price_of(&self, data_type: &str) -> i64 {
        self.prices
            .price_of(data_type)
            .unwrap_or(self.rules.unknown_data_points)
    }

    pub async fn user(&self, user_id: Uuid) -> Result<User, EngineError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("User not found".to_string()))
    }

    /// Looks up a user by email, creating it (with the email sale) when absent.
    pub async fn resolve_or_create_user(&self, email: &str) -> Result<Resolution, EngineError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EngineError::Validation("Email is required".to_string()));
        }

        if let Some(user) = self.store.find_user_by_email(email).await? {
            return Ok(Resolution {
                user,
                created: false,
            });
        }

        let opening_sale = SaleInsert::new(EMAIL, email, self.rules.email_points);
        match self.store.create_user(email, opening_sale).await {
            Ok(user) => {
                info!(
                    "Created user {} and awarded {} points for email",
                    user.id, self.rules.email_points
                );
                Ok(Resolution {
                    user,
                    created: true,
                })
            }
            // Lost a creation race: the other request's user is the one to return.
            Err(StoreError::Duplicate(_)) => {
                let user = self.store.find_user_by_email(email).await?.ok_or_else(|| {
                    EngineError::NotFound(format!("User {email} vanished after creation"))
                })?;
                Ok(Resolution {
                    user,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sells one labelled piece of data. Each `(user, data_type)` pair sells once.
    pub async fn sell_data(
        &self,
        user_id: Uuid,
        data_type: &str,
        value: &str,
    ) -> Result<SaleReceipt, EngineError> {
        let data_type = data_type.trim();
        if data_type.is_empty() {
            return Err(EngineError::Validation("Data type is required".to_string()));
        }
        if pricing::is_reserved(data_type) {
            return Err(EngineError::Validation(format!(
                "{data_type} cannot be sold directly"
            )));
        }

        if self.store.has_sold(user_id, data_type).await? {
            return Err(EngineError::Conflict(ALREADY_SOLD.to_string()));
        }

        let base = self.price_of(data_type);
        let sales = if data_type == TRAVEL_DESTINATIONS {
            self.travel_sales(value, base)?
        } else {
            vec![SaleInsert::new(data_type, value, base)]
        };
        let entries = sales.len();

        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    sales,
                    ..ScoreDelta::default()
                },
            )
            .await
            .map_err(|e| conflict_or(e, ALREADY_SOLD))?;

        info!(
            "User {user_id} sold {data_type} ({entries} entries) for {} points",
            committed.points_added
        );
        Ok(SaleReceipt {
            points_earned: committed.points_added,
            total: committed.user.points,
            entries,
        })
    }

    /// One ledger row per destination: the first at the base price, the rest at
    /// the flat per-destination rate.
    fn travel_sales(&self, value: &str, base: i64) -> Result<Vec<SaleInsert>, EngineError> {
        let destinations: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect();
        if destinations.is_empty() {
            return Err(EngineError::Validation(
                "At least one travel destination is required".to_string(),
            ));
        }
        if destinations.len() > MAX_TRAVEL_DESTINATIONS {
            return Err(EngineError::Validation(format!(
                "At most {MAX_TRAVEL_DESTINATIONS} travel destinations per sale"
            )));
        }

        let mut sales = Vec::with_capacity(destinations.len());
        for (index, destination) in (0_i32..).zip(destinations) {
            let points = if index == 0 {
                base
            } else {
                self.rules.travel_destination_points
            };
            sales.push(SaleInsert::new(TRAVEL_DESTINATIONS, destination, points).at_index(index));
        }
        Ok(sales)
    }

    /// Sells every server-observed signal the user has not sold yet. Zero-priced
    /// signals are skipped.
    pub async fn auto_collect_server_signals(
        &self,
        user_id: Uuid,
        signals: &ServerSignals,
    ) -> Result<Collection, EngineError> {
        let pairs = signals
            .entries()
            .map(|(key, value)| (key, value.to_string()));
        self.collect(user_id, pairs, "server signals").await
    }

    /// Sells every non-empty client fingerprint the user has not sold yet.
    pub async fn collect_client_signals(
        &self,
        user_id: Uuid,
        signals: &ClientSignals,
    ) -> Result<Collection, EngineError> {
        self.collect(user_id, signals.present(), "client signals")
            .await
    }

    async fn collect<I>(&self, user_id: Uuid, pairs: I, source: &str) -> Result<Collection, EngineError>
    where
        I: IntoIterator<Item = (&'static str, String)>,
    {
        let sales: Vec<SaleInsert> = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let points = self.prices.price_of(key).unwrap_or(0);
                (points > 0).then(|| SaleInsert::new(key, value, points).skip_if_sold())
            })
            .collect();

        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    sales,
                    ..ScoreDelta::default()
                },
            )
            .await?;

        if committed.sales_recorded > 0 {
            info!(
                "Collected {} {source} from user {user_id} for {} points",
                committed.sales_recorded, committed.points_added
            );
        }
        Ok(Collection {
            points_added: committed.points_added,
            total: committed.user.points,
            collected: committed.sales_recorded,
        })
    }

    /// Claims the one-time bonus for `page` and advances `current_page` unless
    /// `page` is the final page.
    pub async fn claim_page_bonus(
        &self,
        user_id: Uuid,
        page: &str,
        requested_points: Option<i64>,
    ) -> Result<PageBonusReceipt, EngineError> {
        let page = PageId::parse(page, self.rules.final_page)?;
        let points = self.rules.rewards.page_reward(page, requested_points)?;
        let key = page.claim_key();

        if self.store.has_claimed(user_id, &key).await? {
            return Err(EngineError::Conflict(PAGE_ALREADY_CLAIMED.to_string()));
        }

        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    award: points,
                    claim: Some(ClaimInsert { key, points }),
                    advance_page: !page.is_final(self.rules.final_page),
                    ..ScoreDelta::default()
                },
            )
            .await
            .map_err(|e| conflict_or(e, PAGE_ALREADY_CLAIMED))?;

        info!(
            "User {user_id} claimed page {} bonus: {points} points, now on page {}",
            page.0, committed.user.current_page
        );
        Ok(PageBonusReceipt {
            points_awarded: points,
            total: committed.user.points,
            current_page: committed.user.current_page,
        })
    }

    /// Awards the social-sharing bonus. Repeatable unless configured otherwise.
    pub async fn claim_social_bonus(
        &self,
        user_id: Uuid,
        requested_points: Option<i64>,
    ) -> Result<i64, EngineError> {
        const SOCIAL_ALREADY_CLAIMED: &str = "Social bonus already claimed";

        let points = self.rules.rewards.social_reward(requested_points)?;
        let claim = match self.rules.social {
            SocialBonusPolicy::Repeatable => None,
            SocialBonusPolicy::Once => {
                if self.store.has_claimed(user_id, SOCIAL_CLAIM_KEY).await? {
                    return Err(EngineError::Conflict(SOCIAL_ALREADY_CLAIMED.to_string()));
                }
                Some(ClaimInsert {
                    key: SOCIAL_CLAIM_KEY.to_string(),
                    points,
                })
            }
        };

        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    award: points,
                    claim,
                    ..ScoreDelta::default()
                },
            )
            .await
            .map_err(|e| conflict_or(e, SOCIAL_ALREADY_CLAIMED))?;

        info!("User {user_id} claimed social bonus: {points} points");
        Ok(committed.user.points)
    }

    /// Pays the daily login bonus at most once per 24 hours. The first payout also
    /// sells the caller's address as `daily_ip`, which never sells twice.
    pub async fn claim_daily_bonus(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ip: &str,
    ) -> Result<DailyBonus, EngineError> {
        let user = self.user(user_id).await?;
        if let Some(last) = user.last_login {
            if now - last < Duration::days(1) {
                debug!("Daily bonus for user {user_id} already paid at {last}");
                return Ok(DailyBonus {
                    added: 0,
                    total: user.points,
                });
            }
        }

        let delta = ScoreDelta {
            award: self.rules.daily_bonus_points,
            sales: vec![SaleInsert::new(DAILY_IP, ip, self.rules.daily_ip_points).skip_if_sold()],
            login: Some(LoginStamp {
                at: now,
                expected_previous: user.last_login,
            }),
            ..ScoreDelta::default()
        };

        match self.store.commit(user_id, delta).await {
            Ok(committed) => {
                info!(
                    "Daily bonus for user {user_id}: {} points",
                    committed.points_added
                );
                Ok(DailyBonus {
                    added: committed.points_added,
                    total: committed.user.points,
                })
            }
            // A concurrent request paid this window's bonus first.
            Err(StoreError::StaleLogin) => {
                let user = self.user(user_id).await?;
                Ok(DailyBonus {
                    added: 0,
                    total: user.points,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deducts `cost` and marks every unprotected ledger entry with `level`.
    pub async fn purchase_protection(
        &self,
        user_id: Uuid,
        level: &str,
        cost: i64,
    ) -> Result<ProtectionReceipt, EngineError> {
        if cost < 0 {
            return Err(EngineError::Validation("Cost cannot be negative".to_string()));
        }
        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    cost,
                    protect_level: Some(level.to_string()),
                    ..ScoreDelta::default()
                },
            )
            .await?;

        info!(
            "User {user_id} spent {cost} points protecting {} entries at {level}",
            committed.entries_protected
        );
        Ok(ProtectionReceipt {
            total: committed.user.points,
            protected: committed.entries_protected,
        })
    }

    /// Deducts `cost` and appends the zero-point funeral record. One funeral per user.
    pub async fn schedule_funeral(
        &self,
        user_id: Uuid,
        memorial: &str,
        cost: i64,
    ) -> Result<User, EngineError> {
        const ALREADY_SCHEDULED: &str = "A data funeral is already scheduled";

        if cost < 0 {
            return Err(EngineError::Validation("Cost cannot be negative".to_string()));
        }
        if self.store.has_sold(user_id, FUNERAL_SCHEDULED).await? {
            return Err(EngineError::Conflict(ALREADY_SCHEDULED.to_string()));
        }

        let committed = self
            .store
            .commit(
                user_id,
                ScoreDelta {
                    cost,
                    sales: vec![SaleInsert::new(FUNERAL_SCHEDULED, memorial, 0)],
                    ..ScoreDelta::default()
                },
            )
            .await
            .map_err(|e| conflict_or(e, ALREADY_SCHEDULED))?;

        info!("User {user_id} scheduled a data funeral for {cost} points");
        Ok(committed.user)
    }

    pub async fn sold_data(&self, user_id: Uuid) -> Result<Vec<SoldDataEntry>, EngineError> {
        Ok(self.store.sold_entries(user_id).await?)
    }

    pub async fn user_stats(&self, user_id: Uuid) -> Result<UserStats, EngineError> {
        let user = self.user(user_id).await?;
        let entries = self.store.sold_entries(user_id).await?;
        let claims = self.store.bonus_claims(user_id).await?;

        let mut data_categories = BTreeMap::new();
        for entry in &entries {
            *data_categories
                .entry(entry.category().to_string())
                .or_insert(0) += 1;
        }

        Ok(UserStats {
            total_points: user.points,
            data_items_sold: entries.len(),
            member_since: user.created_at.format("%Y-%m-%d").to_string(),
            last_login: user
                .last_login
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "Never".to_string()),
            current_page: user.current_page,
            bonuses_claimed: claims.len(),
            data_categories,
        })
    }

    /// Stores session telemetry for a session that lasted `duration_secs` and
    /// ended at `now`.
    pub async fn log_session(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        duration_secs: i64,
        pages_visited: &str,
    ) -> Result<(), EngineError> {
        if duration_secs < 0 {
            return Err(EngineError::Validation(
                "Duration cannot be negative".to_string(),
            ));
        }
        let session_start = Duration::try_seconds(duration_secs)
            .and_then(|elapsed| now.checked_sub_signed(elapsed))
            .ok_or_else(|| EngineError::Validation("Duration is out of range".to_string()))?;
        self.store
            .record_session(NewSessionLog {
                user_id,
                session_start,
                duration_secs,
                pages_visited: pages_visited.to_string(),
            })
            .await?;
        debug!("Session telemetry stored for user {user_id}: {duration_secs}s");
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats, EngineError> {
        Ok(self.store.stats().await?)
    }
}
