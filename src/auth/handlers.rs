use axum::{
    extract::{Multipart, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        credentials::{CredentialError, Credentials},
        dto::{ChangePasswordForm, LoginForm, PasswordTestForm},
        extractors::AuthUser,
        guards::{admin_required, login_required},
        session::SessionManager,
    },
    cookies::{session_cookie, session_removal, session_token, set_cookie_header},
    error::AppError,
    outcome::{Flash, Outcome, View},
    state::AppState,
    users::{dto::ProfileForm, services::save_profile},
};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/test_pw", get(test_pw_page).post(test_pw))
}

pub fn account_routes(state: &AppState) -> Router<AppState> {
    login_required(
        Router::new()
            .route("/logout", get(logout).post(logout))
            .route("/dashboard", get(dashboard).post(update_dashboard))
            .route("/password", get(password_page).post(change_password)),
        state,
    )
}

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    admin_required(Router::new().route("/admin", get(admin)), state)
}

// --- login / logout ---

#[instrument(skip(flash))]
pub async fn login_page(flash: Flash) -> Outcome {
    View::new("login").pending(flash).into()
}

#[instrument(skip(state, headers, form))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new("login").invalid(errors).into_response());
    }

    let identity = match Credentials::new(state.users.as_ref())
        .verify(&form.username, &form.password)
        .await
    {
        Ok(identity) => identity,
        Err(CredentialError::NotFound) => {
            return Ok(Outcome::from(
                View::new("login").flash("That User Doesn't Exist! Try Again..."),
            )
            .into_response())
        }
        Err(CredentialError::WrongPassword) => {
            return Ok(
                Outcome::from(View::new("login").flash("Wrong Password - Try Again!"))
                    .into_response(),
            )
        }
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    let previous = session_token(&headers);
    let token = SessionManager::from_state(&state)
        .login(&identity, previous.as_deref())
        .await?;

    let session = &state.config.session;
    let cookie = session_cookie(
        token,
        time::Duration::minutes(session.ttl_minutes),
        session.cookie_secure,
    );
    info!(user_id = identity.id, "user logged in");
    Ok((
        AppendHeaders([(SET_COOKIE, set_cookie_header(&cookie)?)]),
        Outcome::redirect_with("/dashboard", "Login Succesfull!!"),
    )
        .into_response())
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        SessionManager::from_state(&state).logout(&token).await?;
    }
    info!(user_id = identity.id, "user logged out");
    Ok((
        AppendHeaders([(SET_COOKIE, set_cookie_header(&session_removal())?)]),
        Outcome::redirect_with(
            "/login",
            "You Have Been Logged Out!  Thanks For Stopping By...",
        ),
    )
        .into_response())
}

// --- dashboard / admin ---

#[instrument(skip(state, flash))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    flash: Flash,
) -> Result<Outcome, AppError> {
    let user = state.users.get_user(identity.id).await?;
    let pic_url = user
        .profile_pic
        .as_deref()
        .map(|p| state.storage.public_url(p));
    Ok(View::new("dashboard")
        .with("user", &user)
        .with("profile_pic_url", pic_url)
        .pending(flash)
        .into())
}

#[instrument(skip(state, mp))]
pub async fn update_dashboard(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mp: Multipart,
) -> Result<Outcome, AppError> {
    let form = ProfileForm::from_multipart(mp).await?;
    save_profile(&state, identity.id, form, "dashboard").await
}

#[instrument(skip(state, flash))]
pub async fn admin(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    flash: Flash,
) -> Result<Outcome, AppError> {
    let users = state.users.list_users().await?;
    let post_count = state.posts.count_posts().await?;
    Ok(View::new("admin")
        .with("our_users", users)
        .with("post_count", post_count)
        .pending(flash)
        .into())
}

// --- passwords ---

#[instrument(skip(flash))]
pub async fn test_pw_page(flash: Flash) -> Outcome {
    View::new("test_pw").pending(flash).into()
}

#[instrument(skip(state, form))]
pub async fn test_pw(
    State(state): State<AppState>,
    Form(form): Form<PasswordTestForm>,
) -> Result<Outcome, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new("test_pw").invalid(errors));
    }

    let email = form.email.trim().to_lowercase();
    let (user_found, passed) = match Credentials::new(state.users.as_ref())
        .verify(&email, &form.password_hash)
        .await
    {
        Ok(_) => (true, Some(true)),
        Err(CredentialError::WrongPassword) => (true, Some(false)),
        Err(CredentialError::NotFound) => (false, None),
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    Ok(View::new("test_pw")
        .with("email", &email)
        .with("user_found", user_found)
        .with("passed", passed)
        .into())
}

#[instrument(skip(flash))]
pub async fn password_page(AuthUser(identity): AuthUser, flash: Flash) -> Outcome {
    View::new("password").pending(flash).into()
}

#[instrument(skip(state, form))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Outcome, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new("password").invalid(errors));
    }

    let changed = Credentials::new(state.users.as_ref())
        .change_password(identity.id, &form.current_password, &form.new_password)
        .await;

    match changed {
        Ok(()) => Ok(View::new("password")
            .flash("Password Changed Successfully!")
            .into()),
        Err(CredentialError::WrongPassword) => {
            warn!(user_id = identity.id, "password change rejected");
            Ok(View::new("password")
                .flash("Wrong Password - Try Again!")
                .into())
        }
        Err(CredentialError::NotFound) => Err(AppError::NotFound("user")),
        Err(CredentialError::Validation(msg)) => Ok(View::new("password").flash(msg).into()),
        Err(e) => {
            error!(user_id = identity.id, error = %e, "password change failed");
            Ok(View::new("password")
                .flash("Error! Looks like there was a problem...try again!")
                .into())
        }
    }
}
