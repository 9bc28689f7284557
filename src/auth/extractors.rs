use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::claims::Identity;
use super::session::SessionManager;
use crate::cookies::session_token;
use crate::error::AppError;
use crate::state::AppState;

/// The identity bound to the request, if any. Never rejects an anonymous
/// request.
pub struct CurrentUser(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // already resolved by `require_login`
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(CurrentUser(Some(identity.clone())));
        }
        let token = session_token(&parts.headers);
        let session = SessionManager::from_state(state)
            .resolve(token.as_deref())
            .await?;
        Ok(CurrentUser(session.current_identity().cloned()))
    }
}

/// Requires an authenticated session; anonymous requests are redirected to
/// the login page.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        identity.map(AuthUser).ok_or(AppError::Unauthenticated)
    }
}
