//! Tunable scoring rules. Built from `Config` at startup; the engine never
//! reads the environment itself.

use std::collections::BTreeMap;

use crate::scoring::errors::EngineError;

/// Claim key recorded for the social bonus when it is not repeatable.
pub const SOCIAL_CLAIM_KEY: &str = "social";

#[derive(Debug, Clone)]
pub struct ScoringRules {
    /// Last page of the unlock sequence; claiming it does not advance `current_page`.
    pub final_page: u32,
    pub email_points: i64,
    /// Price of any data type the price table does not list.
    pub unknown_data_points: i64,
    /// Rate for every travel destination after the first.
    pub travel_destination_points: i64,
    pub daily_bonus_points: i64,
    pub daily_ip_points: i64,
    pub social: SocialBonusPolicy,
    pub rewards: RewardPolicy,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            final_page: 6,
            email_points: 50,
            unknown_data_points: 10,
            travel_destination_points: 50,
            daily_bonus_points: 100,
            daily_ip_points: 50,
            social: SocialBonusPolicy::Repeatable,
            rewards: RewardPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialBonusPolicy {
    /// Every claim pays out.
    Repeatable,
    /// One claim per user, recorded under `SOCIAL_CLAIM_KEY`.
    Once,
}

/// Decides how many points a bonus claim is worth.
#[derive(Debug, Clone)]
pub struct RewardPolicy {
    /// Accept the client-supplied amount as-is.
    pub trust_client: bool,
    pub page_rewards: BTreeMap<u32, i64>,
    pub social_reward: i64,
    /// Largest amount a single bonus claim may request, trusted or not.
    pub max_bonus: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            trust_client: true,
            page_rewards: default_page_rewards(),
            social_reward: 250,
            max_bonus: 100_000,
        }
    }
}

pub fn default_page_rewards() -> BTreeMap<u32, i64> {
    BTreeMap::from([
        (1, 500),
        (2, 1000),
        (3, 2500),
        (4, 5000),
        (5, 10000),
        (6, 25000),
    ])
}

impl RewardPolicy {
    pub fn page_reward(&self, page: PageId, requested: Option<i64>) -> Result<i64, EngineError> {
        let table_value = self.page_rewards.get(&page.0).copied();
        self.resolve(requested, table_value, &page.claim_key())
    }

    pub fn social_reward(&self, requested: Option<i64>) -> Result<i64, EngineError> {
        self.resolve(requested, Some(self.social_reward), "social bonus")
    }

    fn resolve(
        &self,
        requested: Option<i64>,
        table_value: Option<i64>,
        what: &str,
    ) -> Result<i64, EngineError> {
        if let Some(points) = requested {
            if points < 0 {
                return Err(EngineError::Validation(
                    "Bonus points cannot be negative".to_string(),
                ));
            }
            if points > self.max_bonus {
                return Err(EngineError::Validation(format!(
                    "Bonus for {what} cannot exceed {} points",
                    self.max_bonus
                )));
            }
        }
        match (self.trust_client, requested, table_value) {
            (true, Some(points), _) => Ok(points),
            (_, None, Some(expected)) => Ok(expected),
            (false, Some(points), Some(expected)) if points == expected => Ok(points),
            (false, Some(points), Some(expected)) => Err(EngineError::Validation(format!(
                "Invalid reward for {what}: {points} (expected {expected})"
            ))),
            (_, _, None) => Err(EngineError::Validation(format!(
                "No reward configured for {what}"
            ))),
        }
    }
}

/// A page in the unlock sequence, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Accepts `page3` or `3`. Pages outside `1..=final_page` are rejected.
    pub fn parse(raw: &str, final_page: u32) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("page").unwrap_or(trimmed);
        let number: u32 = digits
            .parse()
            .map_err(|_| EngineError::Validation(format!("Unknown page '{raw}'")))?;
        if number == 0 || number > final_page {
            return Err(EngineError::Validation(format!(
                "Page {number} is outside 1..={final_page}"
            )));
        }
        Ok(Self(number))
    }

    pub fn claim_key(&self) -> String {
        format!("page{}", self.0)
    }

    pub fn is_final(&self, final_page: u32) -> bool {
        self.0 == final_page
    }
}

/// Parses `page1=500,page2=1000` (or `1=500,...`) into a reward table.
pub fn parse_page_rewards(raw: &str) -> Result<BTreeMap<u32, i64>, String> {
    let mut rewards = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (page, points) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected page=points, got '{pair}'"))?;
        let page = page.trim();
        let page_number: u32 = page
            .strip_prefix("page")
            .unwrap_or(page)
            .parse()
            .map_err(|_| format!("bad page '{page}'"))?;
        let points: i64 = points
            .trim()
            .parse()
            .map_err(|_| format!("bad points for {page}"))?;
        if points < 0 {
            return Err(format!("negative reward for {page}"));
        }
        rewards.insert(page_number, points);
    }
    Ok(rewards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_accepts_both_forms() {
        assert_eq!(PageId::parse("page3", 6).unwrap(), PageId(3));
        assert_eq!(PageId::parse(" 4 ", 6).unwrap(), PageId(4));
    }

    #[test]
    fn test_page_id_rejects_out_of_range() {
        assert!(PageId::parse("page0", 6).is_err());
        assert!(PageId::parse("page7", 6).is_err());
        assert!(PageId::parse("page5", 4).is_err());
        assert!(PageId::parse("home", 6).is_err());
    }

    #[test]
    fn test_final_page_is_configurable() {
        assert!(PageId(4).is_final(4));
        assert!(!PageId(4).is_final(6));
    }

    #[test]
    fn test_trusting_policy_uses_client_value() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.page_reward(PageId(2), Some(123)).unwrap(), 123);
    }

    #[test]
    fn test_missing_client_value_falls_back_to_table() {
        let policy = RewardPolicy::default();
        assert_eq!(policy.page_reward(PageId(2), None).unwrap(), 1000);
    }

    #[test]
    fn test_validating_policy_rejects_mismatch() {
        let policy = RewardPolicy {
            trust_client: false,
            ..RewardPolicy::default()
        };
        assert_eq!(policy.page_reward(PageId(1), Some(500)).unwrap(), 500);
        assert!(matches!(
            policy.page_reward(PageId(1), Some(999_999)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            policy.social_reward(Some(1)),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_negative_points_always_rejected() {
        let policy = RewardPolicy::default();
        assert!(policy.page_reward(PageId(1), Some(-5)).is_err());
        assert!(policy.social_reward(Some(-1)).is_err());
    }

    #[test]
    fn test_requested_points_are_capped() {
        let policy = RewardPolicy {
            max_bonus: 1000,
            ..RewardPolicy::default()
        };
        assert_eq!(policy.social_reward(Some(1000)).unwrap(), 1000);
        assert!(matches!(
            policy.social_reward(Some(1001)),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            RewardPolicy::default().page_reward(PageId(1), Some(i64::MAX)),
            Err(EngineError::Validation(_))
        ));
        // table values are not subject to the cap on requests
        assert_eq!(policy.page_reward(PageId(6), None).unwrap(), 25000);
    }

    #[test]
    fn test_parse_page_rewards() {
        let rewards = parse_page_rewards("page1=10, 2=20,page3 = 30").unwrap();
        assert_eq!(rewards.get(&1), Some(&10));
        assert_eq!(rewards.get(&2), Some(&20));
        assert_eq!(rewards.get(&3), Some(&30));
    }

    #[test]
    fn test_parse_page_rewards_rejects_garbage() {
        assert!(parse_page_rewards("page1").is_err());
        assert!(parse_page_rewards("page1=abc").is_err());
        assert!(parse_page_rewards("page1=-3").is_err());
    }
}
