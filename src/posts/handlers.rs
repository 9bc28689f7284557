use axum::{
    extract::{Path, State},
    routing::{get, post},
    Form, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        extractors::{AuthUser, CurrentUser},
        guards::login_required,
        policy,
    },
    db::RepoError,
    error::AppError,
    outcome::{FieldErrors, Flash, Outcome, View},
    state::AppState,
};

use super::dto::{PostForm, SearchForm};
use super::repo_types::Post;

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(show_post).post(show_post))
        .route("/search", post(search))
}

pub fn write_routes(state: &AppState) -> Router<AppState> {
    login_required(
        Router::new()
            .route("/add_post", get(add_post_page).post(add_post))
            .route("/posts/edit/:id", get(edit_post_page).post(edit_post))
            .route("/posts/delete/:id", get(delete_post).post(delete_post)),
        state,
    )
}

// --- handlers ---

#[instrument(skip(state, flash))]
pub async fn list_posts(State(state): State<AppState>, flash: Flash) -> Result<Outcome, AppError> {
    let posts = state.posts.list_posts().await?;
    Ok(View::new("posts").with("posts", posts).pending(flash).into())
}

#[instrument(skip(state, flash))]
pub async fn show_post(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
    flash: Flash,
) -> Result<Outcome, AppError> {
    let post = state.posts.get_post(id).await?;
    let can_edit = identity
        .as_ref()
        .is_some_and(|i| policy::can_edit_post(i, &post));
    Ok(View::new("post")
        .with("post", post)
        .with("can_edit", can_edit)
        .pending(flash)
        .into())
}

#[instrument(skip(flash))]
pub async fn add_post_page(AuthUser(identity): AuthUser, flash: Flash) -> Outcome {
    View::new("add_post").pending(flash).into()
}

#[instrument(skip(state, form))]
pub async fn add_post(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Form(form): Form<PostForm>,
) -> Result<Outcome, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new("add_post").invalid(errors));
    }

    match state.posts.create_post(form.into_new_post(), identity.id).await {
        Ok(post) => {
            info!(post_id = post.id, user_id = identity.id, "post created");
            Ok(View::new("add_post")
                .with("post", post)
                .flash("Blog Post Submitted Successfully!")
                .into())
        }
        Err(e) => {
            error!(user_id = identity.id, error = %e, "create post failed");
            Ok(View::new("add_post")
                .flash("Whoops! There was a problem submitting the post, try again...")
                .into())
        }
    }
}

#[instrument(skip(state, flash))]
pub async fn edit_post_page(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    flash: Flash,
) -> Result<Outcome, AppError> {
    let post = state.posts.get_post(id).await?;
    if !policy::can_edit_post(&identity, &post) {
        return Ok(Outcome::redirect_with(
            "/posts",
            "You Aren't Authorized To Edit This Post...",
        ));
    }
    Ok(View::new("edit_post").with("post", post).pending(flash).into())
}

#[instrument(skip(state, form))]
pub async fn edit_post(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<Outcome, AppError> {
    let post = state.posts.get_post(id).await?;
    if !policy::can_edit_post(&identity, &post) {
        warn!(user_id = identity.id, post_id = id, "edit of foreign post denied");
        return Ok(Outcome::redirect_with(
            "/posts",
            "You Aren't Authorized To Edit This Post...",
        ));
    }

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new("edit_post").with("post", post).invalid(errors));
    }

    match state.posts.update_post(id, form.into_changes()).await {
        Ok(updated) => {
            info!(post_id = id, "post updated");
            Ok(Outcome::redirect_with(
                format!("/posts/{}", updated.id),
                "Post Has Been Updated!",
            ))
        }
        Err(e) => recover_update_error(post, id, e),
    }
}

/// Maps a failed update back onto the edit form. Repository validation
/// messages are not tied to one field, so they are shown above the form.
fn recover_update_error(post: Post, id: i64, e: RepoError) -> Result<Outcome, AppError> {
    match e {
        RepoError::NotFound => Err(AppError::NotFound("post")),
        RepoError::Validation(msg) => Ok(View::new("edit_post")
            .with("post", post)
            .flash(msg)
            .invalid(FieldErrors::new())),
        e => {
            error!(post_id = id, error = %e, "update post failed");
            Ok(View::new("edit_post")
                .with("post", post)
                .flash("Whoops! There was a problem updating the post, try again...")
                .into())
        }
    }
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
) -> Result<Outcome, AppError> {
    let post = state.posts.get_post(id).await?;
    if !policy::can_delete_post(&identity, &post) {
        warn!(user_id = identity.id, post_id = id, "delete of foreign post denied");
        return Ok(Outcome::redirect_with(
            "/posts",
            "You Aren't Authorized To Delete That Post!",
        ));
    }

    match state.posts.delete_post(id).await {
        Ok(()) => {
            info!(post_id = id, "post deleted");
            Ok(Outcome::redirect_with("/posts", "Blog Post Was Deleted!"))
        }
        Err(RepoError::NotFound) => Err(AppError::NotFound("post")),
        Err(e) => {
            error!(post_id = id, error = %e, "delete post failed");
            Ok(Outcome::redirect_with(
                "/posts",
                "Whoops! There was a problem deleting post, try again...",
            ))
        }
    }
}

#[instrument(skip(state, form))]
pub async fn search(
    State(state): State<AppState>,
    Form(form): Form<SearchForm>,
) -> Result<Outcome, AppError> {
    let mut errors = FieldErrors::new();
    errors.require("searched", &form.searched);
    if !errors.is_empty() {
        return Ok(View::new("search").invalid(errors));
    }

    let posts = state.posts.search_posts(&form.searched).await?;
    Ok(View::new("search")
        .with("searched", &form.searched)
        .with("posts", posts)
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use time::OffsetDateTime;

    fn post() -> Post {
        Post {
            id: 7,
            title: "First".into(),
            content: "Hello".into(),
            slug: "first".into(),
            date_posted: OffsetDateTime::UNIX_EPOCH,
            poster_id: 1,
            poster_name: Some("alice".into()),
        }
    }

    async fn body_json(outcome: Outcome) -> (StatusCode, Value) {
        let res = outcome.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn update_validation_error_is_shown_above_the_form() {
        let outcome = recover_update_error(
            post(),
            7,
            RepoError::Validation("Content is required".into()),
        )
        .unwrap();
        let (status, body) = body_json(outcome).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["view"], "edit_post");
        assert_eq!(body["flash"][0], "Content is required");
        assert_eq!(body["errors"], serde_json::json!({}));
        assert_eq!(body["post"]["title"], "First");
    }

    #[tokio::test]
    async fn update_of_vanished_post_is_not_found() {
        let err = recover_update_error(post(), 7, RepoError::NotFound).unwrap_err();
        assert!(matches!(err, AppError::NotFound("post")));
    }

    #[tokio::test]
    async fn update_persistence_failure_keeps_the_form() {
        let outcome =
            recover_update_error(post(), 7, RepoError::Persistence(sqlx::Error::RowNotFound))
                .unwrap();
        let (status, body) = body_json(outcome).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["flash"][0],
            "Whoops! There was a problem updating the post, try again..."
        );
    }
}
