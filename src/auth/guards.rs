//! Route guards, applied with `route_layer` so they wrap whole groups of
//! handlers. `require_admin` expects `require_login` to have run first.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use super::claims::Identity;
use super::policy;
use super::session::{Session, SessionManager};
use crate::cookies::session_token;
use crate::error::AppError;
use crate::outcome::Outcome;
use crate::state::AppState;

pub async fn require_login(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = session_token(req.headers());
    match SessionManager::from_state(&state).resolve(token.as_deref()).await {
        Ok(Session::Authenticated(identity)) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Ok(Session::Anonymous) => AppError::Unauthenticated.into_response(),
        Err(e) => AppError::Internal(e).into_response(),
    }
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<Identity>() {
        Some(identity) if policy::is_admin(identity) => next.run(req).await,
        Some(identity) => {
            tracing::warn!(user_id = identity.id, "non-admin tried the admin page");
            Outcome::redirect_with(
                "/dashboard",
                "Sorry you must be the Admin to access the Admin Page...",
            )
            .into_response()
        }
        None => AppError::Unauthenticated.into_response(),
    }
}

/// Every route in `router` requires a session.
pub fn login_required(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), require_login))
}

/// Every route in `router` requires the admin session.
pub fn admin_required(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    // the last layer added runs first
    login_required(router.route_layer(middleware::from_fn(require_admin)), state)
}
