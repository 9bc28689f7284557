use std::any::Any;
use std::net::SocketAddr;

use axum::{middleware, response::Response, Router};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::cookies::FLASH_COOKIE;
use crate::error::server_error;
use crate::outcome::keep_flash;
use crate::routes::pages;
use crate::state::{AppState, UPLOAD_URL_PREFIX};
use crate::{auth, posts, users};

/// The full routing table. Guards are attached per group inside each
/// feature router.
pub fn build_app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);
    let flash_sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(FLASH_COOKIE)
        .with_secure(state.config.session.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(10)));

    Router::new()
        .merge(pages::routes())
        .merge(users::router(&state))
        .merge(posts::router(&state))
        .merge(auth::router(&state))
        .nest_service(UPLOAD_URL_PREFIX, uploads)
        .fallback(pages::not_found)
        .with_state(state)
        .layer(middleware::from_fn(keep_flash))
        .layer(flash_sessions)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    server_error()
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
