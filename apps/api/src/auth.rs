use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::errors::AppError;

const USER_ID_KEY: &str = "user_id";

/// The user bound to the caller's session. Rejects with 401 when there is none.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(anyhow::anyhow!(msg)))?;
        let user_id: Option<Uuid> = session.get(USER_ID_KEY).await?;
        user_id.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

/// Binds `user_id` to the session under a fresh session id.
pub async fn bind_user(session: &Session, user_id: Uuid) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user_id).await?;
    Ok(())
}
