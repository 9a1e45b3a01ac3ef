pub mod health;

use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::scoring::handlers;
use crate::state::AppState;
use crate::theater::handlers as theater;

pub fn build_router(state: AppState, static_dir: Option<&Path>, secure_cookie: bool) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default()).with_secure(secure_cookie);

    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/health", get(health::health_handler))
        // Account
        .route("/api/create_account", post(handlers::handle_create_account))
        .route("/api/get_sold_data", get(handlers::handle_get_sold_data))
        .route("/api/user_stats", get(handlers::handle_user_stats))
        // Selling and harvesting
        .route("/api/sell", post(handlers::handle_sell))
        .route(
            "/api/collect_client_data",
            post(handlers::handle_collect_client_data),
        )
        // Bonuses
        .route("/api/claim_bonus", post(handlers::handle_claim_bonus))
        .route("/api/social_bonus", post(handlers::handle_social_bonus))
        .route("/api/daily_bonus", post(handlers::handle_daily_bonus))
        // Telemetry and ranking
        .route("/api/session_data", post(handlers::handle_session_data))
        .route("/api/leaderboard", get(handlers::handle_leaderboard))
        // Theater
        .route("/api/theater/encrypt", post(theater::handle_encrypt))
        .route("/api/theater/funeral", post(theater::handle_funeral))
        .route("/api/theater/certificate", get(theater::handle_certificate))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router.layer(sessions)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::connect_info::MockConnectInfo,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::scoring::{LeaderboardOptions, PriceTable, ScoringEngine, ScoringRules};
    use crate::store::memory::MemoryLedgerStore;
    use crate::store::LedgerStore;
    use crate::theater::DisabledProtector;

    fn test_app() -> (Router, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = ScoringEngine::new(
            store.clone(),
            PriceTable::standard(),
            ScoringRules::default(),
        );
        let state = AppState {
            engine: Arc::new(engine),
            protector: Arc::new(DisabledProtector),
            leaderboard: LeaderboardOptions {
                include_bots: false,
                ..LeaderboardOptions::default()
            },
        };
        let app = build_router(state, None, false)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        (app, store)
    }

    struct Reply {
        status: StatusCode,
        cookie: Option<String>,
        body: Value,
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            cookie,
            body,
        }
    }

    async fn sign_up(app: &Router, email: &str) -> String {
        let reply = send(
            app,
            Method::POST,
            "/api/create_account",
            None,
            Some(json!({ "email": email })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.cookie.expect("session cookie")
    }

    #[tokio::test]
    async fn test_requires_session() {
        let (app, _) = test_app();
        let reply = send(
            &app,
            Method::POST,
            "/api/sell",
            None,
            Some(json!({ "type": "pet_name", "value": "Rex" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["success"], false);
        assert_eq!(reply.body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_create_account_awards_email_points() {
        let (app, _) = test_app();
        let reply = send(
            &app,
            Method::POST,
            "/api/create_account",
            None,
            Some(json!({ "email": "a@b.c" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["points"], 50);
        assert_eq!(reply.body["current_page"], 1);

        let missing = send(
            &app,
            Method::POST,
            "/api/create_account",
            None,
            Some(json!({ "email": "" })),
        )
        .await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sell_then_conflict() {
        let (app, _) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let sold = send(
            &app,
            Method::POST,
            "/api/sell",
            Some(&cookie),
            Some(json!({ "type": "pet_name", "value": "Rex" })),
        )
        .await;
        assert_eq!(sold.status, StatusCode::OK);
        // pet_name plus the first harvest of server signals
        assert_eq!(sold.body["points_earned"], 50 + 70);
        assert_eq!(sold.body["points"], 50 + 50 + 70);

        let again = send(
            &app,
            Method::POST,
            "/api/sell",
            Some(&cookie),
            Some(json!({ "type": "pet_name", "value": "Fido" })),
        )
        .await;
        assert_eq!(again.status, StatusCode::BAD_REQUEST);
        assert_eq!(again.body["error"]["code"], "CONFLICT");

        let sold_data = send(&app, Method::GET, "/api/get_sold_data", Some(&cookie), None).await;
        assert_eq!(sold_data.body["total_entries"], 10);
    }

    #[tokio::test]
    async fn test_selling_a_server_signal_uses_observed_value() {
        let (app, store) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        send(
            &app,
            Method::POST,
            "/api/sell",
            Some(&cookie),
            Some(json!({ "type": "ip_address", "value": "8.8.8.8" })),
        )
        .await;

        let user = store.find_user_by_email("a@b.c").await.unwrap().unwrap();
        let entries = store.sold_entries(user.id).await.unwrap();
        let ip = entries
            .iter()
            .find(|e| e.data_type == "ip_address")
            .unwrap();
        assert_eq!(ip.data_value, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_page_bonus_flow() {
        let (app, _) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let claimed = send(
            &app,
            Method::POST,
            "/api/claim_bonus",
            Some(&cookie),
            Some(json!({ "page": "page1", "points": 500 })),
        )
        .await;
        assert_eq!(claimed.status, StatusCode::OK);
        assert_eq!(claimed.body["current_page"], 2);
        assert_eq!(claimed.body["points"], 550);

        let again = send(
            &app,
            Method::POST,
            "/api/claim_bonus",
            Some(&cookie),
            Some(json!({ "page": 1, "points": 500 })),
        )
        .await;
        assert_eq!(again.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_bonus_is_a_validation_error() {
        let (app, store) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let social = send(
            &app,
            Method::POST,
            "/api/social_bonus",
            Some(&cookie),
            Some(json!({ "points": i64::MAX })),
        )
        .await;
        assert_eq!(social.status, StatusCode::BAD_REQUEST);
        assert_eq!(social.body["error"]["code"], "VALIDATION_ERROR");

        let user = store.find_user_by_email("a@b.c").await.unwrap().unwrap();
        store.set_points(user.id, i64::MAX - 1);
        let page = send(
            &app,
            Method::POST,
            "/api/claim_bonus",
            Some(&cookie),
            Some(json!({ "page": "page1", "points": 500 })),
        )
        .await;
        assert_eq!(page.status, StatusCode::BAD_REQUEST);
        assert_eq!(page.body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_session_data_rejects_out_of_range_duration() {
        let (app, _) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let huge = send(
            &app,
            Method::POST,
            "/api/session_data",
            Some(&cookie),
            Some(json!({ "duration": i64::MAX, "pages_visited": ["page1"] })),
        )
        .await;
        assert_eq!(huge.status, StatusCode::BAD_REQUEST);
        assert_eq!(huge.body["error"]["code"], "VALIDATION_ERROR");

        let ok = send(
            &app,
            Method::POST,
            "/api/session_data",
            Some(&cookie),
            Some(json!({ "duration": 120, "pages_visited": ["page1"] })),
        )
        .await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["success"], true);
    }

    #[tokio::test]
    async fn test_daily_bonus_once_per_day() {
        let (app, _) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let first = send(&app, Method::POST, "/api/daily_bonus", Some(&cookie), None).await;
        assert_eq!(first.body["added"], 150);
        let second = send(&app, Method::POST, "/api/daily_bonus", Some(&cookie), None).await;
        assert_eq!(second.body["added"], 0);
        assert_eq!(second.body["points"], first.body["points"]);
    }

    #[tokio::test]
    async fn test_theater_requires_balance_and_known_level() {
        let (app, store) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;

        let poor = send(
            &app,
            Method::POST,
            "/api/theater/encrypt",
            Some(&cookie),
            Some(json!({ "level": "premium" })),
        )
        .await;
        assert_eq!(poor.status, StatusCode::BAD_REQUEST);
        assert_eq!(poor.body["error"]["code"], "INSUFFICIENT_BALANCE");

        let unknown = send(
            &app,
            Method::POST,
            "/api/theater/encrypt",
            Some(&cookie),
            Some(json!({ "level": "military" })),
        )
        .await;
        assert_eq!(unknown.body["error"]["code"], "VALIDATION_ERROR");

        let user = store.find_user_by_email("a@b.c").await.unwrap().unwrap();
        store.set_points(user.id, 1000);
        let bought = send(
            &app,
            Method::POST,
            "/api/theater/encrypt",
            Some(&cookie),
            Some(json!({ "level": "premium" })),
        )
        .await;
        assert_eq!(bought.status, StatusCode::OK);
        assert_eq!(bought.body["points"], 500);
        assert_eq!(bought.body["protected_count"], 1);
        assert!(bought.body["preview"].is_null());
    }

    #[tokio::test]
    async fn test_funeral_once() {
        let (app, store) = test_app();
        let cookie = sign_up(&app, "a@b.c").await;
        let user = store.find_user_by_email("a@b.c").await.unwrap().unwrap();
        store.set_points(user.id, 20_000);

        let first = send(
            &app,
            Method::POST,
            "/api/theater/funeral",
            Some(&cookie),
            Some(json!({ "type": "space" })),
        )
        .await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.body["points"], 12_500);
        assert_eq!(first.body["memorial"]["funeral_type"], "space");

        let second = send(
            &app,
            Method::POST,
            "/api/theater/funeral",
            Some(&cookie),
            Some(json!({ "type": "space" })),
        )
        .await;
        assert_eq!(second.body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_leaderboard_and_health_are_public() {
        let (app, _) = test_app();
        sign_up(&app, "alice@b.c").await;

        let board = send(&app, Method::GET, "/api/leaderboard", None, None).await;
        assert_eq!(board.status, StatusCode::OK);
        assert_eq!(board.body["leaderboard"][0]["name"], "alice***");

        let health = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(health.status, StatusCode::OK);
        assert_eq!(health.body["stats"]["users"], 1);
    }
}
