use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::state::AppState;

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub(crate) fn is_supported_image(item: &UploadItem) -> bool {
    ext_from_mime(&item.content_type).is_some() && !item.body.is_empty()
}

/// Reduce a client-supplied file name to something safe to put on disk:
/// ASCII alphanumerics plus `.`, `-`, `_`, whitespace folded to `_`, no
/// directories, no leading dots.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else if c.is_whitespace() {
            out.push('_');
        }
    }
    let trimmed = out.trim_start_matches('.').trim_matches('_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<uuid>_<sanitized name>`; unique without any locking.
pub fn unique_file_name(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), secure_filename(original))
}

/// Store a profile picture and return the file name to record on the user.
pub async fn store_profile_pic(st: &AppState, item: UploadItem) -> anyhow::Result<String> {
    anyhow::ensure!(is_supported_image(&item), "not an image upload");
    let key = unique_file_name(&item.file_name);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Best-effort removal of a picture no longer referenced.
pub async fn discard_profile_pic(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        tracing::warn!(error = %e, key, "failed to remove profile picture");
    }
}
