use axum::{
    extract::Path,
    http::Uri,
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::outcome::{FieldErrors, Flash, Outcome, View};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/user/:name", get(user))
        .route("/name", get(name_page).post(name))
        .route("/date", get(date))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NameForm {
    pub name: String,
}

#[instrument(skip(flash))]
pub async fn index(flash: Flash) -> Outcome {
    View::new("index")
        .with("first_name", "John")
        .with("stuff", "This is <strong>Bold</strong> text")
        .with("favorite_pizza", json!(["pepperoni", "cheese", "mushrooms", 41]))
        .pending(flash)
        .into()
}

#[instrument]
pub async fn user(Path(name): Path<String>) -> Outcome {
    View::new("user").with("user_name", name).into()
}

#[instrument(skip(flash))]
pub async fn name_page(flash: Flash) -> Outcome {
    View::new("name").with("name", Option::<String>::None).pending(flash).into()
}

/// Echoes the submitted name back; nothing is stored.
#[instrument(skip(form))]
pub async fn name(Form(form): Form<NameForm>) -> Outcome {
    let mut errors = FieldErrors::new();
    errors.require("name", &form.name);
    if !errors.is_empty() {
        return View::new("name").invalid(errors);
    }
    View::new("name")
        .with("name", form.name.trim())
        .flash("Form Submit Successfully!")
        .into()
}

#[instrument]
pub async fn date() -> Json<Value> {
    Json(json!({ "Date": OffsetDateTime::now_utc().date().to_string() }))
}

pub async fn not_found(uri: Uri) -> AppError {
    info!(%uri, "no route");
    AppError::NotFound("page")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    async fn body_json(outcome: Outcome) -> Value {
        let bytes = outcome
            .into_response()
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_has_landing_data() {
        let body = body_json(index(Flash(None)).await).await;
        assert_eq!(body["view"], "index");
        assert_eq!(body["first_name"], "John");
        assert_eq!(body["favorite_pizza"][3], 41);
    }

    #[tokio::test]
    async fn name_form_echoes_and_flashes() {
        let outcome = name(Form(NameForm { name: " Ada ".into() })).await;
        let body = body_json(outcome).await;
        assert_eq!(body["name"], "Ada");
        assert_eq!(body["flash"][0], "Form Submit Successfully!");
    }

    #[tokio::test]
    async fn blank_name_is_invalid() {
        let res = name(Form(NameForm::default())).await.into_response();
        assert_eq!(res.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn date_is_iso_formatted() {
        let Json(body) = date().await;
        let date = body["Date"].as_str().unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
    }
}
