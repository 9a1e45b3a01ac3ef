use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::SoldDataEntry;
use crate::theater::bridge::ProtectJob;
use crate::theater::levels::{self, SecurityReport};
use crate::theater::TheaterError;
use crate::state::AppState;

const PREVIEW_CHARS: usize = 32;

fn default_level() -> String {
    "basic".to_string()
}

fn default_funeral() -> String {
    "viking".to_string()
}

/// Leading characters of the base64 ciphertext.
pub fn preview(ciphertext: &[u8]) -> String {
    STANDARD.encode(ciphertext).chars().take(PREVIEW_CHARS).collect()
}

fn ledger_payload(entries: &[SoldDataEntry], level: &str) -> String {
    let items: Vec<Value> = entries
        .iter()
        .map(|e| json!({ "type": e.data_type, "value": e.data_value }))
        .collect();
    json!({
        "items": items,
        "protection_level": level,
        "sold_to": "highest_bidder",
    })
    .to_string()
}

#[derive(Deserialize)]
pub struct EncryptRequest {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Serialize)]
pub struct EncryptResponse {
    pub success: bool,
    pub points: i64,
    pub level: &'static str,
    pub protected_count: u64,
    pub theatrical_elements: &'static [&'static str],
    pub password_hint: &'static str,
    pub preview: Option<String>,
    pub message: String,
}

/// POST /api/theater/encrypt
pub async fn handle_encrypt(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, AppError> {
    let level = levels::protection_level(req.level.trim()).ok_or_else(|| {
        AppError::Validation(format!("Unknown protection level '{}'", req.level))
    })?;

    let receipt = state
        .engine
        .purchase_protection(user_id, level.name, level.cost)
        .await?;

    let entries = state.engine.sold_data(user_id).await?;
    let job = ProtectJob {
        label: format!("user_{}_{}", user_id.simple(), level.name),
        payload: ledger_payload(&entries, level.name),
        password: format!("user_{user_id}_{}", level.password_suffix),
        encrypt_passes: level.encrypt_passes,
        shred_passes: level.shred_passes,
    };
    let preview = match state.protector.protect(job).await {
        Ok(protected) => Some(preview(&protected.ciphertext)),
        Err(TheaterError::Unavailable) => None,
        Err(e) => {
            warn!("Theater encryption for user {user_id} failed: {e}");
            None
        }
    };

    Ok(Json(EncryptResponse {
        success: true,
        points: receipt.total,
        level: level.name,
        protected_count: receipt.protected,
        theatrical_elements: level.elements,
        password_hint: level.password_hint,
        preview,
        message: format!(
            "Your data is now {}-level protected! Sleep tight!",
            level.name
        ),
    }))
}

#[derive(Deserialize)]
pub struct FuneralRequest {
    #[serde(rename = "type", default = "default_funeral")]
    pub kind: String,
}

#[derive(Serialize)]
pub struct FuneralResponse {
    pub success: bool,
    pub points: i64,
    pub memorial: Value,
    pub message: &'static str,
}

/// POST /api/theater/funeral
pub async fn handle_funeral(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<FuneralRequest>,
) -> Result<Json<FuneralResponse>, AppError> {
    let kind = levels::funeral_kind(req.kind.trim())
        .ok_or_else(|| AppError::Validation(format!("Unknown funeral type '{}'", req.kind)))?;

    let data_count = state.engine.sold_data(user_id).await?.len();
    let memorial = kind.memorial(&mut rand::thread_rng(), data_count, Utc::now());
    let user = state
        .engine
        .schedule_funeral(user_id, &memorial.to_string(), kind.cost)
        .await?;

    Ok(Json(FuneralResponse {
        success: true,
        points: user.points,
        memorial,
        message: "Your data funeral has been scheduled. Dress code: Black.",
    }))
}

#[derive(Serialize)]
pub struct CertificateResponse {
    pub success: bool,
    pub certificate_id: Uuid,
    pub issued: String,
    pub report: SecurityReport,
    pub disclaimer: &'static str,
}

/// GET /api/theater/certificate
pub async fn handle_certificate(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CertificateResponse>, AppError> {
    let protected = state
        .engine
        .sold_data(user_id)
        .await?
        .iter()
        .filter(|e| e.protection_level.is_some())
        .count();

    let report = levels::security_report(&mut rand::thread_rng(), protected);
    Ok(Json(CertificateResponse {
        success: true,
        certificate_id: Uuid::new_v4(),
        issued: Utc::now().format("%Y-%m-%d").to_string(),
        report,
        disclaimer: "This report is for entertainment purposes only. Your data is still being sold.",
    }))
}
