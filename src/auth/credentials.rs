use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::claims::Identity;
use crate::auth::password::{hash_password, verify_password};
use crate::db::RepoError;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("user not found")]
    NotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for CredentialError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => CredentialError::NotFound,
            RepoError::DuplicateEmail => CredentialError::DuplicateEmail,
            RepoError::DuplicateUsername => CredentialError::DuplicateUsername,
            RepoError::Validation(msg) => CredentialError::Validation(msg),
            RepoError::Persistence(e) => CredentialError::Internal(e.into()),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Plaintext registration data; the password never leaves this module unhashed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub favorite_color: Option<String>,
    pub about_author: Option<String>,
}

/// Credential store over a user repository.
pub struct Credentials<'a> {
    users: &'a dyn UserRepository,
}

impl<'a> Credentials<'a> {
    pub fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    pub async fn register(&self, reg: Registration) -> Result<User, CredentialError> {
        let email = reg.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(CredentialError::Validation("Invalid email".into()));
        }
        if reg.password.is_empty() {
            return Err(CredentialError::Validation("Password is required".into()));
        }

        let password_hash = hash_password(&reg.password)?;
        let user = self
            .users
            .create_user(NewUser {
                name: reg.name.trim().to_string(),
                username: reg.username.trim().to_string(),
                email,
                favorite_color: reg.favorite_color,
                about_author: reg.about_author,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check `password` against the stored hash of the user named (or
    /// emailed) `login`. Failures are only reported, never counted.
    pub async fn verify(&self, login: &str, password: &str) -> Result<Identity, CredentialError> {
        let login = login.trim();
        // emails are stored lowercased; usernames are case-sensitive
        let login = if login.contains('@') {
            login.to_lowercase()
        } else {
            login.to_string()
        };
        let login = login.as_str();
        let user = self
            .users
            .find_user_by_login(login)
            .await?
            .ok_or_else(|| {
                warn!(login, "login unknown user");
                CredentialError::NotFound
            })?;

        if !verify_password(password, &user.password_hash)? {
            warn!(login, user_id = user.id, "login invalid password");
            return Err(CredentialError::WrongPassword);
        }

        Ok(Identity {
            id: user.id,
            username: user.username,
        })
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), CredentialError> {
        if new_password.is_empty() {
            return Err(CredentialError::Validation("Password is required".into()));
        }
        let user = self.users.get_user(user_id).await?;
        if !verify_password(current, &user.password_hash)? {
            warn!(user_id, "password change with wrong current password");
            return Err(CredentialError::WrongPassword);
        }
        let password_hash = hash_password(new_password)?;
        self.users
            .update_user(
                user_id,
                UserChanges {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn registration(username: &str, password: &str) -> Registration {
    Registration {
        name: format!("{} name", username),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: password.to_string(),
        favorite_color: None,
        about_author: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, SqlRepository};

    async fn repo() -> SqlRepository {
        SqlRepository::new(test_pool().await)
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("not an email"));
    }

    #[tokio::test]
    async fn register_then_verify_returns_same_identity() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        let user = creds.register(registration("alice", "s3cret!")).await.unwrap();
        assert_ne!(user.password_hash, "s3cret!");

        let identity = creds.verify("alice", "s3cret!").await.unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.username, "alice");

        let by_email = creds.verify("alice@example.com", "s3cret!").await.unwrap();
        assert_eq!(by_email, identity);
    }

    #[tokio::test]
    async fn verify_by_email_ignores_case() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        let mut reg = registration("alice", "s3cret!");
        reg.email = "Alice@Example.com".into();
        let user = creds.register(reg).await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let identity = creds.verify("Alice@Example.com", "s3cret!").await.unwrap();
        assert_eq!(identity.id, user.id);
        assert!(matches!(
            creds.verify("ALICE", "s3cret!").await,
            Err(CredentialError::NotFound)
        ));
    }

    #[tokio::test]
    async fn verify_with_other_password_is_wrong_password() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        creds.register(registration("alice", "s3cret!")).await.unwrap();

        for attempt in ["s3cret", "S3CRET!", ""] {
            assert!(matches!(
                creds.verify("alice", attempt).await,
                Err(CredentialError::WrongPassword)
            ));
        }
    }

    #[tokio::test]
    async fn verify_unknown_user_is_not_found() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        assert!(matches!(
            creds.verify("ghost", "x").await,
            Err(CredentialError::NotFound)
        ));
    }

    #[tokio::test]
    async fn repeated_failures_do_not_lock_the_account() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        creds.register(registration("alice", "s3cret!")).await.unwrap();

        for _ in 0..3 {
            assert!(matches!(
                creds.verify("alice", "wrong").await,
                Err(CredentialError::WrongPassword)
            ));
        }
        assert!(creds.verify("alice", "s3cret!").await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_registration_leaves_count_unchanged() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        creds.register(registration("alice", "pw")).await.unwrap();

        let mut same_email = registration("bob", "pw");
        same_email.email = "ALICE@example.com".into();
        assert!(matches!(
            creds.register(same_email).await,
            Err(CredentialError::DuplicateEmail)
        ));

        let mut same_username = registration("alice", "pw");
        same_username.email = "other@example.com".into();
        assert!(matches!(
            creds.register(same_username).await,
            Err(CredentialError::DuplicateUsername)
        ));

        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_rejects_malformed_email() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        let mut reg = registration("alice", "pw");
        reg.email = "nope".into();
        assert!(matches!(
            creds.register(reg).await,
            Err(CredentialError::Validation(_))
        ));
        assert_eq!(repo.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let repo = repo().await;
        let creds = Credentials::new(&repo);
        let user = creds.register(registration("alice", "old-pw")).await.unwrap();

        assert!(matches!(
            creds.change_password(user.id, "not-it", "new-pw").await,
            Err(CredentialError::WrongPassword)
        ));
        assert!(creds.verify("alice", "old-pw").await.is_ok());

        creds.change_password(user.id, "old-pw", "new-pw").await.unwrap();
        assert!(matches!(
            creds.verify("alice", "old-pw").await,
            Err(CredentialError::WrongPassword)
        ));
        assert!(creds.verify("alice", "new-pw").await.is_ok());
    }
}
