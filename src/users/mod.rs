pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub(crate) mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(handlers::protected_routes(state))
}
