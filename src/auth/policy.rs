//! Ownership rules for mutations. Pure functions; callers turn a `false`
//! into a "not authorized" flash and leave state untouched.

use super::claims::Identity;
use crate::posts::repo_types::Post;

/// Legacy convention: the first account ever created is the admin.
pub const ADMIN_USER_ID: i64 = 1;

pub fn can_edit_post(identity: &Identity, post: &Post) -> bool {
    identity.id == post.poster_id
}

pub fn can_delete_post(identity: &Identity, post: &Post) -> bool {
    identity.id == post.poster_id
}

/// Self-delete only; being admin grants nothing here.
pub fn can_delete_user(identity: &Identity, target_user_id: i64) -> bool {
    identity.id == target_user_id
}

/// Profile edits follow the same self-only rule as deletion.
pub fn can_update_user(identity: &Identity, target_user_id: i64) -> bool {
    identity.id == target_user_id
}

pub fn is_admin(identity: &Identity) -> bool {
    identity.id == ADMIN_USER_ID
}
