use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::scoring::rules::{
    default_page_rewards, parse_page_rewards, RewardPolicy, SocialBonusPolicy,
};
use crate::scoring::{LeaderboardOptions, ScoringRules};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub static_dir: Option<PathBuf>,
    pub secure_cookie: bool,
    pub defuscrypt_bin: Option<PathBuf>,
    pub leaderboard_bots: bool,
    pub rules: ScoringRules,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = ScoringRules::default();
        let page_rewards = match optional_env("PAGE_REWARDS") {
            Some(raw) => parse_page_rewards(&raw).map_err(|e| anyhow!("PAGE_REWARDS: {e}"))?,
            None => default_page_rewards(),
        };

        let rules = ScoringRules {
            final_page: parse_env("FINAL_PAGE", defaults.final_page)?,
            email_points: parse_env("EMAIL_POINTS", defaults.email_points)?,
            unknown_data_points: parse_env("UNKNOWN_DATA_POINTS", defaults.unknown_data_points)?,
            travel_destination_points: parse_env(
                "TRAVEL_DESTINATION_POINTS",
                defaults.travel_destination_points,
            )?,
            daily_bonus_points: parse_env("DAILY_BONUS_POINTS", defaults.daily_bonus_points)?,
            daily_ip_points: parse_env("DAILY_IP_POINTS", defaults.daily_ip_points)?,
            social: if parse_env("SOCIAL_BONUS_REPEATABLE", true)? {
                SocialBonusPolicy::Repeatable
            } else {
                SocialBonusPolicy::Once
            },
            rewards: RewardPolicy {
                trust_client: parse_env("TRUST_CLIENT_BONUS", defaults.rewards.trust_client)?,
                page_rewards,
                social_reward: parse_env("SOCIAL_BONUS_POINTS", defaults.rewards.social_reward)?,
                max_bonus: parse_env("MAX_BONUS_POINTS", defaults.rewards.max_bonus)?,
            },
        };
        validate_rules(&rules)?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            static_dir: optional_env("STATIC_DIR").map(PathBuf::from),
            secure_cookie: parse_env("SESSION_SECURE_COOKIE", false)?,
            defuscrypt_bin: optional_env("DEFUSCRYPT_BIN").map(PathBuf::from),
            leaderboard_bots: parse_env("LEADERBOARD_BOTS", true)?,
            rules,
        })
    }

    pub fn leaderboard_options(&self) -> LeaderboardOptions {
        LeaderboardOptions {
            include_bots: self.leaderboard_bots,
            ..LeaderboardOptions::default()
        }
    }
}

fn validate_rules(rules: &ScoringRules) -> Result<()> {
    if rules.final_page == 0 {
        return Err(anyhow!("FINAL_PAGE must be at least 1"));
    }
    let amounts = [
        ("EMAIL_POINTS", rules.email_points),
        ("UNKNOWN_DATA_POINTS", rules.unknown_data_points),
        ("TRAVEL_DESTINATION_POINTS", rules.travel_destination_points),
        ("DAILY_BONUS_POINTS", rules.daily_bonus_points),
        ("DAILY_IP_POINTS", rules.daily_ip_points),
        ("SOCIAL_BONUS_POINTS", rules.rewards.social_reward),
        ("MAX_BONUS_POINTS", rules.rewards.max_bonus),
    ];
    for (key, value) in amounts {
        if value < 0 {
            return Err(anyhow!("{key} cannot be negative"));
        }
    }
    let max_bonus = rules.rewards.max_bonus;
    if rules.rewards.social_reward > max_bonus {
        return Err(anyhow!("SOCIAL_BONUS_POINTS exceeds MAX_BONUS_POINTS ({max_bonus})"));
    }
    if let Some((page, points)) = rules.rewards.page_rewards.iter().find(|(_, p)| **p > max_bonus) {
        return Err(anyhow!(
            "PAGE_REWARDS page{page}={points} exceeds MAX_BONUS_POINTS ({max_bonus})"
        ));
    }
    Ok(())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
