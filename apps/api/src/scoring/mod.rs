pub mod engine;
pub mod errors;
pub mod handlers;
pub mod leaderboard;
pub mod pricing;
pub mod rules;
pub mod signals;

pub use engine::ScoringEngine;
pub use errors::EngineError;
pub use leaderboard::LeaderboardOptions;
pub use pricing::PriceTable;
pub use rules::ScoringRules;
