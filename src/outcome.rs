//! What a handler produces: a rendered view, a form redisplayed with field
//! errors, or a redirect carrying a one-shot flash message.
//!
//! Views are JSON documents of the shape
//! `{"view": <name>, "flash": [..], "errors": {..}?, ...data}`.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tower_sessions::Session;

const FLASH_KEY: &str = "flash";

/// Flash message left by the previous response, if any. Extracting it
/// removes it from the session.
#[derive(Debug, Default, Clone)]
pub struct Flash(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Flash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(session) = Session::from_request_parts(parts, state).await else {
            return Ok(Flash(None));
        };
        let msg = session
            .remove::<String>(FLASH_KEY)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to read flash message");
                None
            });
        Ok(Flash(msg))
    }
}

/// A message a redirect wants shown on the next page. Set by `Outcome` on
/// the response, moved into the session by `keep_flash`.
#[derive(Debug, Clone)]
struct PendingFlash(String);

/// Middleware: stores the flash message of an outgoing redirect in the
/// request's session.
pub async fn keep_flash(session: Session, req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    if let Some(PendingFlash(msg)) = res.extensions_mut().remove::<PendingFlash>() {
        if let Err(e) = session.insert(FLASH_KEY, msg).await {
            tracing::warn!(error = %e, "failed to store flash message");
        }
    }
    res
}

/// Per-field validation messages.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, msg: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| msg.into());
    }

    /// Records "This field is required." when `value` is blank.
    pub fn require(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field is required.");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct View {
    name: &'static str,
    data: Map<String, Value>,
    flash: Vec<String>,
}

impl View {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            data: Map::new(),
            flash: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }

    /// Show the message left by the previous redirect first.
    pub fn pending(mut self, pending: Flash) -> Self {
        if let Some(msg) = pending.0 {
            self.flash.insert(0, msg);
        }
        self
    }

    pub fn flash(mut self, msg: impl Into<String>) -> Self {
        self.flash.push(msg.into());
        self
    }

    pub fn invalid(self, errors: FieldErrors) -> Outcome {
        Outcome::Invalid { view: self, errors }
    }

    fn render(self, status: StatusCode, errors: Option<FieldErrors>) -> Response {
        let mut body = self.data;
        body.insert("view".into(), Value::from(self.name));
        body.insert("flash".into(), Value::from(self.flash));
        if let Some(errors) = errors {
            body.insert(
                "errors".into(),
                serde_json::to_value(errors).unwrap_or(Value::Null),
            );
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        Outcome::from(self).into_response()
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    View(View),
    Invalid { view: View, errors: FieldErrors },
    Redirect { to: String, flash: String },
}

impl Outcome {
    pub fn redirect_with(to: impl Into<String>, flash: impl Into<String>) -> Self {
        Outcome::Redirect {
            to: to.into(),
            flash: flash.into(),
        }
    }
}

impl From<View> for Outcome {
    fn from(view: View) -> Self {
        Outcome::View(view)
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::View(view) => view.render(StatusCode::OK, None),
            Outcome::Invalid { view, errors } => {
                view.render(StatusCode::UNPROCESSABLE_ENTITY, Some(errors))
            }
            Outcome::Redirect { to, flash } => {
                let location =
                    HeaderValue::from_str(&to).unwrap_or_else(|_| HeaderValue::from_static("/"));
                let mut res = StatusCode::SEE_OTHER.into_response();
                res.headers_mut().insert(header::LOCATION, location);
                res.extensions_mut().insert(PendingFlash(flash));
                res
            }
        }
    }
}
