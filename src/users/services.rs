use tracing::{error, info, warn};

use crate::db::RepoError;
use crate::error::AppError;
use crate::images::services::{discard_profile_pic, store_profile_pic};
use crate::outcome::{Outcome, View};
use crate::state::AppState;
use crate::users::dto::ProfileForm;

/// Apply a submitted profile form to `user_id` and render `view` with the
/// result. Shared by `/update/:id` and `/dashboard`.
pub async fn save_profile(
    st: &AppState,
    user_id: i64,
    form: ProfileForm,
    view: &'static str,
) -> Result<Outcome, AppError> {
    let current = st.users.get_user(user_id).await?;

    let errors = form.validate();
    if !errors.is_empty() {
        return Ok(View::new(view).with("user", &current).invalid(errors));
    }

    let mut changes = form.changes();
    let new_pic = match form.profile_pic {
        Some(item) => Some(store_profile_pic(st, item).await?),
        None => None,
    };
    changes.profile_pic = new_pic.clone();

    match st.users.update_user(user_id, changes).await {
        Ok(user) => {
            if let (Some(old), Some(_)) = (&current.profile_pic, &new_pic) {
                discard_profile_pic(st, old).await;
            }
            info!(user_id, "profile updated");
            Ok(View::new(view)
                .with("user", &user)
                .with(
                    "profile_pic_url",
                    user.profile_pic.as_deref().map(|p| st.storage.public_url(p)),
                )
                .flash("User Updated Successfully!")
                .into())
        }
        Err(e) => {
            if let Some(pic) = &new_pic {
                discard_profile_pic(st, pic).await;
            }
            let msg = match e {
                RepoError::NotFound => return Err(AppError::NotFound("user")),
                RepoError::DuplicateEmail | RepoError::DuplicateUsername => {
                    warn!(user_id, error = %e, "profile update conflict");
                    e.to_string()
                }
                RepoError::Validation(msg) => msg,
                RepoError::Persistence(e) => {
                    error!(user_id, error = %e, "profile update failed");
                    "Error! Looks like there was a problem...try again!".to_string()
                }
            };
            Ok(View::new(view).with("user", &current).flash(msg).into())
        }
    }
}
