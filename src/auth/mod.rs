use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod credentials;
mod dto;
pub mod extractors;
pub mod guards;
pub mod handlers;
pub mod password;
pub mod policy;
pub mod session;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::session_routes())
        .merge(handlers::account_routes(state))
        .merge(handlers::admin_routes(state))
}
