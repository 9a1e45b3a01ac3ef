use std::collections::{BTreeMap, HashMap};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{SoldDataEntry, User};
use crate::scoring::engine::ScoringEngine;
use crate::scoring::errors::EngineError;
use crate::scoring::pricing::SOCIAL_TYPES;

const SOCIAL_HANDLE_MAX_CHARS: usize = 20;

const BOT_ROSTER: &[&str] = &[
    "DataHoarder9000",
    "PrivacyIsDead",
    "CookieMonster",
    "TrackMeDaddy",
    "SurveillanceSally",
    "FingerprintFrank",
    "MetadataMike",
    "ConsentCathy",
    "BrokerBot",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub points: i64,
    pub socials: BTreeMap<String, String>,
    pub data_sold_count: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bot: bool,
}

#[derive(Debug, Clone)]
pub struct LeaderboardOptions {
    pub size: usize,
    /// Mix fabricated players into the ranking.
    pub include_bots: bool,
    pub bot_count: usize,
}

impl Default for LeaderboardOptions {
    fn default() -> Self {
        Self {
            size: 10,
            include_bots: true,
            bot_count: 3,
        }
    }
}

pub fn real_entry(user: &User, entries: &[SoldDataEntry]) -> LeaderboardEntry {
    let socials = entries
        .iter()
        .filter(|e| SOCIAL_TYPES.contains(&e.data_type.as_str()))
        .map(|e| {
            let handle: String = e
                .display_value()
                .chars()
                .take(SOCIAL_HANDLE_MAX_CHARS)
                .collect();
            (e.data_type.clone(), handle)
        })
        .collect();

    LeaderboardEntry {
        name: user.display_name(),
        points: user.points,
        socials,
        data_sold_count: entries.len(),
        bot: false,
    }
}

pub fn fabricate_bots<R: Rng>(rng: &mut R, count: usize) -> Vec<LeaderboardEntry> {
    BOT_ROSTER
        .choose_multiple(&mut *rng, count)
        .map(|name| LeaderboardEntry {
            name: (*name).to_string(),
            points: rng.gen_range(75_000..=150_000),
            socials: BTreeMap::from([("note".to_string(), "[BOT]".to_string())]),
            data_sold_count: rng.gen_range(500..=1000),
            bot: true,
        })
        .collect()
}

/// Orders by points descending and keeps the top `size`. Ties keep input order.
pub fn rank(mut entries: Vec<LeaderboardEntry>, size: usize) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| b.points.cmp(&a.points));
    entries.truncate(size);
    entries
}

impl ScoringEngine {
    pub async fn leaderboard(
        &self,
        options: &LeaderboardOptions,
    ) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let limit = i64::try_from(options.size).unwrap_or(i64::MAX);
        let users = self.store().top_users(limit).await?;
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();

        let mut sold_by_user: HashMap<Uuid, Vec<SoldDataEntry>> = HashMap::new();
        for entry in self.store().sold_entries_for_users(&ids).await? {
            sold_by_user.entry(entry.user_id).or_default().push(entry);
        }

        let mut entries = Vec::with_capacity(users.len() + options.bot_count);
        for user in &users {
            let sold = sold_by_user.remove(&user.id).unwrap_or_default();
            entries.push(real_entry(user, &sold));
        }

        if options.include_bots {
            entries.extend(fabricate_bots(&mut rand::thread_rng(), options.bot_count));
        }
        Ok(rank(entries, options.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::engine::tests::engine_with;
    use crate::scoring::rules::ScoringRules;
    use crate::store::LedgerStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_bots() -> LeaderboardOptions {
        LeaderboardOptions {
            include_bots: false,
            ..LeaderboardOptions::default()
        }
    }

    #[test]
    fn test_bots_are_marked_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let bots = fabricate_bots(&mut rng, 3);
        assert_eq!(bots.len(), 3);
        for bot in &bots {
            assert!(bot.bot);
            assert!((75_000..=150_000).contains(&bot.points));
            assert!((500..=1000).contains(&bot.data_sold_count));
            assert_eq!(bot.socials.get("note").map(String::as_str), Some("[BOT]"));
        }
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let entry = |name: &str, points| LeaderboardEntry {
            name: name.to_string(),
            points,
            socials: BTreeMap::new(),
            data_sold_count: 0,
            bot: false,
        };
        let ranked = rank(vec![entry("a", 1), entry("b", 3), entry("c", 2)], 2);
        let names: Vec<_> = ranked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_bot_flag_omitted_for_real_players() {
        let entry = LeaderboardEntry {
            name: "x***".to_string(),
            points: 1,
            socials: BTreeMap::new(),
            data_sold_count: 1,
            bot: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("bot").is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_masks_names_and_truncates_socials() {
        let (engine, _) = engine_with(ScoringRules::default());
        let alice = engine.resolve_or_create_user("alice@x.io").await.unwrap().user;
        engine.resolve_or_create_user("bob@x.io").await.unwrap();
        engine
            .sell_data(alice.id, "twitter_handle", "@an_extremely_long_handle_name")
            .await
            .unwrap();

        let board = engine.leaderboard(&no_bots()).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "alice***");
        assert_eq!(board[0].data_sold_count, 2);
        let handle = board[0].socials.get("twitter_handle").unwrap();
        assert_eq!(handle.chars().count(), SOCIAL_HANDLE_MAX_CHARS);
        assert_eq!(board[1].name, "bob***");
        assert!(board[1].socials.is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_counts_only_each_players_own_sales() {
        let (engine, store) = engine_with(ScoringRules::default());
        let alice = engine.resolve_or_create_user("alice@x.io").await.unwrap().user;
        let bob = engine.resolve_or_create_user("bob@x.io").await.unwrap().user;
        let carol = engine.resolve_or_create_user("carol@x.io").await.unwrap().user;
        engine.sell_data(alice.id, "pet_name", "Rex").await.unwrap();
        engine.sell_data(alice.id, "tiktok", "@alice").await.unwrap();
        engine.sell_data(bob.id, "instagram_username", "@bob").await.unwrap();
        store.set_points(carol.id, 0);

        let board = engine
            .leaderboard(&LeaderboardOptions {
                size: 2,
                ..no_bots()
            })
            .await
            .unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "alice***");
        assert_eq!(board[0].data_sold_count, 3);
        assert!(board[0].socials.contains_key("tiktok"));
        assert!(!board[0].socials.contains_key("instagram_username"));
        assert_eq!(board[1].name, "bob***");
        assert_eq!(board[1].data_sold_count, 2);
        assert_eq!(
            board[1].socials.get("instagram_username").map(String::as_str),
            Some("@bob")
        );

        let batch = store.sold_entries_for_users(&[bob.id]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|e| e.user_id == bob.id));
        assert!(store.sold_entries_for_users(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_with_bots_stays_bounded() {
        let (engine, _) = engine_with(ScoringRules::default());
        engine.resolve_or_create_user("a@b.c").await.unwrap();

        let board = engine
            .leaderboard(&LeaderboardOptions::default())
            .await
            .unwrap();
        assert_eq!(board.len(), 4);
        assert_eq!(board.iter().filter(|e| e.bot).count(), 3);
        assert!(!board[3].bot);
    }
}
