use axum::extract::Multipart;
use serde::Deserialize;

use crate::auth::credentials::{is_valid_email, Registration};
use crate::error::AppError;
use crate::images::services::{is_supported_image, UploadItem};
use crate::outcome::FieldErrors;
use crate::users::repo_types::UserChanges;

/// Registration form (`/user/add`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub favorite_color: String,
    pub about_author: String,
    pub password_hash: String,
    pub password_hash2: String,
}

impl UserForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.require("username", &self.username);
        errors.require("email", &self.email);
        errors.require("password_hash", &self.password_hash);
        errors.require("password_hash2", &self.password_hash2);
        if !self.email.trim().is_empty() && !is_valid_email(self.email.trim()) {
            errors.add("email", "Invalid email address.");
        }
        if self.password_hash != self.password_hash2 {
            errors.add("password_hash", "Passwords must match!");
        }
        errors
    }

    pub fn into_registration(self) -> Registration {
        Registration {
            name: self.name,
            username: self.username,
            email: self.email,
            password: self.password_hash,
            favorite_color: non_empty(self.favorite_color),
            about_author: non_empty(self.about_author),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Profile form (`/update/:id`, `/dashboard`), sent as multipart. Fields
/// missing from the submission are left unchanged.
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub favorite_color: Option<String>,
    pub about_author: Option<String>,
    pub profile_pic: Option<UploadItem>,
}

impl ProfileForm {
    pub async fn from_multipart(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = ProfileForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "profile_pic" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                // browsers send an empty part when no file was chosen
                if !body.is_empty() || !file_name.is_empty() {
                    form.profile_pic = Some(UploadItem {
                        file_name,
                        content_type,
                        body,
                    });
                }
                continue;
            }
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            match name.as_str() {
                "name" => form.name = Some(value),
                "username" => form.username = Some(value),
                "email" => form.email = Some(value),
                "favorite_color" => form.favorite_color = Some(value),
                "about_author" => form.about_author = Some(value),
                _ => {}
            }
        }
        Ok(form)
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name);
        }
        if let Some(username) = &self.username {
            errors.require("username", username);
        }
        if let Some(email) = &self.email {
            errors.require("email", email);
            if !email.trim().is_empty() && !is_valid_email(email.trim()) {
                errors.add("email", "Invalid email address.");
            }
        }
        if let Some(pic) = &self.profile_pic {
            if !is_supported_image(pic) {
                errors.add("profile_pic", "Please upload a JPEG, PNG, GIF or WebP image.");
            }
        }
        errors
    }

    /// Text changes only; the picture is stored separately.
    pub fn changes(&self) -> UserChanges {
        UserChanges {
            name: self.name.as_ref().map(|s| s.trim().to_string()),
            username: self.username.as_ref().map(|s| s.trim().to_string()),
            email: self.email.as_ref().map(|s| s.trim().to_lowercase()),
            favorite_color: self.favorite_color.clone(),
            about_author: self.about_author.clone(),
            profile_pic: None,
            password_hash: None,
        }
    }
}
