use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;

use crate::auth::{bind_user, CurrentUser};
use crate::errors::AppError;
use crate::scoring::engine::UserStats;
use crate::scoring::leaderboard::LeaderboardEntry;
use crate::scoring::signals::{ClientSignals, ServerSignals};
use crate::state::AppState;

/// Renders a loosely-typed JSON field as ledger text.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct CreateAccountResponse {
    pub success: bool,
    pub message: String,
    pub current_page: i32,
    pub points: i64,
}

/// POST /api/create_account
pub async fn handle_create_account(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, AppError> {
    let resolution = state.engine.resolve_or_create_user(&req.email).await?;
    bind_user(&session, resolution.user.id).await?;

    let message = if resolution.created {
        format!("Account created! +{} points for your email", state.engine.rules().email_points)
    } else {
        "Welcome back!".to_string()
    };
    Ok(Json(CreateAccountResponse {
        success: true,
        message,
        current_page: resolution.user.current_page,
        points: resolution.user.points,
    }))
}

#[derive(Serialize)]
pub struct SoldDataResponse {
    pub success: bool,
    pub sold_data: Vec<String>,
    pub total_entries: usize,
}

/// GET /api/get_sold_data
pub async fn handle_get_sold_data(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<SoldDataResponse>, AppError> {
    let entries = state.engine.sold_data(user_id).await?;
    let mut sold_data: Vec<String> = Vec::new();
    for entry in &entries {
        if !sold_data.contains(&entry.data_type) {
            sold_data.push(entry.data_type.clone());
        }
    }
    Ok(Json(SoldDataResponse {
        success: true,
        sold_data,
        total_entries: entries.len(),
    }))
}

#[derive(Serialize)]
pub struct UserStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: UserStats,
}

/// GET /api/user_stats
pub async fn handle_user_stats(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<UserStatsResponse>, AppError> {
    let stats = state.engine.user_stats(user_id).await?;
    Ok(Json(UserStatsResponse {
        success: true,
        stats,
    }))
}

#[derive(Deserialize)]
pub struct SellRequest {
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Serialize)]
pub struct SellResponse {
    pub success: bool,
    pub points: i64,
    pub points_earned: i64,
    pub message: String,
}

/// POST /api/sell
pub async fn handle_sell(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SellRequest>,
) -> Result<Json<SellResponse>, AppError> {
    let signals = ServerSignals::observe(peer.ip(), &headers);
    let value = match signals.observed(req.data_type.trim()) {
        Some(observed) => observed.to_string(),
        None => value_text(&req.value),
    };

    let receipt = state
        .engine
        .sell_data(user_id, &req.data_type, &value)
        .await?;
    let harvest = state
        .engine
        .auto_collect_server_signals(user_id, &signals)
        .await?;

    let points_earned = receipt.points_earned + harvest.points_added;
    Ok(Json(SellResponse {
        success: true,
        points: harvest.total,
        points_earned,
        message: format!("Sold {} for {points_earned} points!", req.data_type.trim()),
    }))
}

#[derive(Serialize)]
pub struct CollectResponse {
    pub success: bool,
    pub points: i64,
    pub points_added: i64,
}

/// POST /api/collect_client_data
pub async fn handle_collect_client_data(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(signals): Json<ClientSignals>,
) -> Result<Json<CollectResponse>, AppError> {
    let collection = state
        .engine
        .collect_client_signals(user_id, &signals)
        .await?;
    Ok(Json(CollectResponse {
        success: true,
        points: collection.total,
        points_added: collection.points_added,
    }))
}

#[derive(Deserialize)]
pub struct BonusRequest {
    #[serde(default)]
    pub page: Value,
    pub points: Option<i64>,
}

#[derive(Serialize)]
pub struct PageBonusResponse {
    pub success: bool,
    pub points: i64,
    pub points_awarded: i64,
    pub current_page: i32,
    pub message: String,
}

/// POST /api/claim_bonus
pub async fn handle_claim_bonus(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<BonusRequest>,
) -> Result<Json<PageBonusResponse>, AppError> {
    let receipt = state
        .engine
        .claim_page_bonus(user_id, &value_text(&req.page), req.points)
        .await?;
    Ok(Json(PageBonusResponse {
        success: true,
        points: receipt.total,
        points_awarded: receipt.points_awarded,
        current_page: receipt.current_page,
        message: format!("Bonus claimed: +{} points", receipt.points_awarded),
    }))
}

#[derive(Serialize)]
pub struct PointsResponse {
    pub success: bool,
    pub points: i64,
    pub message: String,
}

/// POST /api/social_bonus
pub async fn handle_social_bonus(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<BonusRequest>,
) -> Result<Json<PointsResponse>, AppError> {
    let points = state
        .engine
        .claim_social_bonus(user_id, req.points)
        .await?;
    Ok(Json(PointsResponse {
        success: true,
        points,
        message: "Thanks for sharing!".to_string(),
    }))
}

#[derive(Serialize)]
pub struct DailyBonusResponse {
    pub success: bool,
    pub points: i64,
    pub added: i64,
}

/// POST /api/daily_bonus
pub async fn handle_daily_bonus(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Json<DailyBonusResponse>, AppError> {
    let bonus = state
        .engine
        .claim_daily_bonus(user_id, Utc::now(), &peer.ip().to_string())
        .await?;
    Ok(Json(DailyBonusResponse {
        success: true,
        points: bonus.total,
        added: bonus.added,
    }))
}

#[derive(Deserialize)]
pub struct SessionDataRequest {
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub pages_visited: Value,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// POST /api/session_data
pub async fn handle_session_data(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<SessionDataRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .engine
        .log_session(
            user_id,
            Utc::now(),
            req.duration,
            &value_text(&req.pages_visited),
        )
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// GET /api/leaderboard
pub async fn handle_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let leaderboard = state.engine.leaderboard(&state.leaderboard).await?;
    Ok(Json(LeaderboardResponse {
        success: true,
        leaderboard,
    }))
}
