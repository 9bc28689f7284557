use serde::Deserialize;

use crate::outcome::FieldErrors;

/// `/login`. `username` may also be the account's email.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.require("username", &self.username);
        errors.require("password", &self.password);
        errors
    }
}

/// `/test_pw`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordTestForm {
    pub email: String,
    pub password_hash: String,
}

impl PasswordTestForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.require("email", &self.email);
        errors.require("password_hash", &self.password_hash);
        errors
    }
}

/// `/password`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password2: String,
}

impl ChangePasswordForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.require("current_password", &self.current_password);
        errors.require("new_password", &self.new_password);
        errors.require("new_password2", &self.new_password2);
        if self.new_password != self.new_password2 {
            errors.add("new_password", "Passwords must match!");
        }
        errors
    }
}
