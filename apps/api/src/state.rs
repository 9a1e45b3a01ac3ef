use std::sync::Arc;

use crate::scoring::{LeaderboardOptions, ScoringEngine};
use crate::theater::DataProtector;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScoringEngine>,
    /// Pluggable encryptor for theater previews. Default: DisabledProtector.
    pub protector: Arc<dyn DataProtector>,
    pub leaderboard: LeaderboardOptions,
}
