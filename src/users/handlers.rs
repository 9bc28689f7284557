use axum::{
    extract::{Multipart, Path, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        credentials::{CredentialError, Credentials},
        extractors::AuthUser,
        guards::login_required,
        policy,
    },
    cookies::{session_removal, set_cookie_header},
    error::AppError,
    images::services::discard_profile_pic,
    outcome::{Flash, Outcome, View},
    state::AppState,
};

use super::dto::{ProfileForm, UserForm};
use super::services::save_profile;

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/user/add", get(add_user_page).post(add_user))
}

pub fn protected_routes(state: &AppState) -> Router<AppState> {
    login_required(
        Router::new()
            .route("/update/:id", get(update_page).post(update_user))
            .route("/delete/:id", get(delete_user).post(delete_user)),
        state,
    )
}

async fn add_user_view(state: &AppState) -> Result<View, AppError> {
    let users = state.users.list_users().await?;
    Ok(View::new("add_user").with("our_users", users))
}

#[instrument(skip(state, flash))]
pub async fn add_user_page(
    State(state): State<AppState>,
    flash: Flash,
) -> Result<Outcome, AppError> {
    Ok(add_user_view(&state).await?.pending(flash).into())
}

#[instrument(skip(state, form))]
pub async fn add_user(
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> Result<Outcome, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        warn!("registration form invalid");
        return Ok(add_user_view(&state).await?.invalid(errors));
    }

    let name = form.name.clone();
    let registered = Credentials::new(state.users.as_ref())
        .register(form.into_registration())
        .await;

    let flash = match registered {
        Ok(_) => "User Added Successfully!".to_string(),
        Err(e @ (CredentialError::DuplicateEmail | CredentialError::DuplicateUsername)) => {
            warn!(error = %e, "registration rejected");
            format!("Sorry, {}!", e)
        }
        Err(CredentialError::Validation(msg)) => msg,
        Err(e) => {
            error!(error = %e, "registration failed");
            "Whoops! There was a problem adding the user, try again...".to_string()
        }
    };

    Ok(add_user_view(&state)
        .await?
        .with("name", name)
        .flash(flash)
        .into())
}

#[instrument(skip(state, flash))]
pub async fn update_page(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    flash: Flash,
) -> Result<Outcome, AppError> {
    let user = state.users.get_user(id).await?;
    if !policy::can_update_user(&identity, id) {
        return Ok(Outcome::redirect_with(
            "/dashboard",
            "Sorry, you can't update that user!",
        ));
    }
    Ok(View::new("update").with("user", user).pending(flash).into())
}

#[instrument(skip(state, mp))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
    mp: Multipart,
) -> Result<Outcome, AppError> {
    // 404 before 403, like the page itself
    state.users.get_user(id).await?;
    if !policy::can_update_user(&identity, id) {
        warn!(user_id = identity.id, target = id, "update of another user denied");
        return Ok(Outcome::redirect_with(
            "/dashboard",
            "Sorry, you can't update that user!",
        ));
    }
    let form = ProfileForm::from_multipart(mp).await?;
    save_profile(&state, id, form, "update").await
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = state.users.get_user(id).await?;
    if !policy::can_delete_user(&identity, id) {
        warn!(user_id = identity.id, target = id, "delete of another user denied");
        return Ok(
            Outcome::redirect_with("/dashboard", "Sorry, you can't delete that user!")
                .into_response(),
        );
    }

    match state.users.delete_user(id).await {
        Ok(()) => {
            if let Some(pic) = &user.profile_pic {
                discard_profile_pic(&state, pic).await;
            }
            info!(user_id = id, "user deleted");
            // the session row went with the user; drop the cookie too
            Ok((
                AppendHeaders([(SET_COOKIE, set_cookie_header(&session_removal())?)]),
                Outcome::redirect_with("/user/add", "User Deleted Successfully!!"),
            )
                .into_response())
        }
        Err(e) => {
            error!(user_id = id, error = %e, "delete user failed");
            Ok(Outcome::redirect_with(
                "/dashboard",
                "Whoops! There was a problem deleting user, try again...",
            )
            .into_response())
        }
    }
}
