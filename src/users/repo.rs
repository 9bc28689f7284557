use async_trait::async_trait;
use time::OffsetDateTime;

use crate::db::{RepoError, SqlRepository};
use crate::users::repo_types::{NewUser, User, UserChanges};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError>;
    async fn get_user(&self, id: i64) -> Result<User, RepoError>;
    /// Look a user up by username, falling back to email.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError>;
    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<User, RepoError>;
    async fn delete_user(&self, id: i64) -> Result<(), RepoError>;
    async fn count_users(&self) -> Result<i64, RepoError>;
}

const USER_COLUMNS: &str = "id, name, username, email, favorite_color, about_author, \
                            profile_pic, password_hash, date_added";

fn required(field: &str, value: &str) -> Result<(), RepoError> {
    if value.trim().is_empty() {
        return Err(RepoError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for SqlRepository {
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError> {
        required("name", &new.name)?;
        required("username", &new.username)?;
        required("email", &new.email)?;

        let mut tx = self.db.begin().await?;

        let email_taken: Option<(i64,)> = sqlx::query_as(r#"SELECT id FROM "user" WHERE email = ?"#)
            .bind(&new.email)
            .fetch_optional(&mut *tx)
            .await?;
        if email_taken.is_some() {
            return Err(RepoError::DuplicateEmail);
        }
        let username_taken: Option<(i64,)> =
            sqlx::query_as(r#"SELECT id FROM "user" WHERE username = ?"#)
                .bind(&new.username)
                .fetch_optional(&mut *tx)
                .await?;
        if username_taken.is_some() {
            return Err(RepoError::DuplicateUsername);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO "user" (name, username, email, favorite_color, about_author, password_hash, date_added)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&new.name)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.favorite_color)
        .bind(&new.about_author)
        .bind(&new.password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_write)?;

        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(&format!(r#"SELECT {} FROM "user" WHERE id = ?"#, USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {}
            FROM "user"
            WHERE username = ?1 OR email = ?1
            ORDER BY username = ?1 DESC
            LIMIT 1
            "#,
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        // AUTOINCREMENT ids never go backwards, so id order is creation order
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {} FROM "user" ORDER BY id"#,
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<User, RepoError> {
        let mut tx = self.db.begin().await?;

        let mut user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {} FROM "user" WHERE id = ?"#,
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepoError::NotFound)?;

        if let Some(email) = changes.email {
            required("email", &email)?;
            if email != user.email {
                let taken: Option<(i64,)> =
                    sqlx::query_as(r#"SELECT id FROM "user" WHERE email = ? AND id <> ?"#)
                        .bind(&email)
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if taken.is_some() {
                    return Err(RepoError::DuplicateEmail);
                }
            }
            user.email = email;
        }
        if let Some(username) = changes.username {
            required("username", &username)?;
            if username != user.username {
                let taken: Option<(i64,)> =
                    sqlx::query_as(r#"SELECT id FROM "user" WHERE username = ? AND id <> ?"#)
                        .bind(&username)
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if taken.is_some() {
                    return Err(RepoError::DuplicateUsername);
                }
            }
            user.username = username;
        }
        if let Some(name) = changes.name {
            required("name", &name)?;
            user.name = name;
        }
        if let Some(color) = changes.favorite_color {
            user.favorite_color = Some(color);
        }
        if let Some(about) = changes.about_author {
            user.about_author = Some(about);
        }
        if let Some(pic) = changes.profile_pic {
            user.profile_pic = Some(pic);
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }

        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE "user"
               SET name = ?, username = ?, email = ?, favorite_color = ?,
                   about_author = ?, profile_pic = ?, password_hash = ?
             WHERE id = ?
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.favorite_color)
        .bind(&user.about_author)
        .bind(&user.profile_pic)
        .bind(&user.password_hash)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_write)?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_user(&self, id: i64) -> Result<(), RepoError> {
        // posts and sessions go with the user (ON DELETE CASCADE)
        let res = sqlx::query(r#"DELETE FROM "user" WHERE id = ?"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn count_users(&self) -> Result<i64, RepoError> {
        let (n,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "user""#)
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
pub(crate) fn sample_user(username: &str) -> NewUser {
    NewUser {
        name: format!("{} name", username),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        favorite_color: Some("blue".into()),
        about_author: None,
        password_hash: "not-a-real-hash".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn repo() -> SqlRepository {
        SqlRepository::new(test_pool().await)
    }

    #[tokio::test]
    async fn create_and_get_user() {
        let repo = repo().await;
        let created = repo.create_user(sample_user("alice")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.username, "alice");
        assert_eq!(created.profile_pic, None);

        let fetched = repo.get_user(created.id).await.unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert_eq!(fetched.date_added, created.date_added);
    }

    #[tokio::test]
    async fn duplicate_email_and_username_are_rejected() {
        let repo = repo().await;
        repo.create_user(sample_user("alice")).await.unwrap();

        let mut same_email = sample_user("bob");
        same_email.email = "alice@example.com".into();
        assert!(matches!(
            repo.create_user(same_email).await,
            Err(RepoError::DuplicateEmail)
        ));

        let mut same_username = sample_user("alice");
        same_username.email = "other@example.com".into();
        assert!(matches!(
            repo.create_user(same_username).await,
            Err(RepoError::DuplicateUsername)
        ));

        assert_eq!(repo.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_required_field_is_a_validation_error() {
        let repo = repo().await;
        let mut user = sample_user("alice");
        user.name = "  ".into();
        assert!(matches!(
            repo.create_user(user).await,
            Err(RepoError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn partial_update_keeps_unspecified_fields() {
        let repo = repo().await;
        let user = repo.create_user(sample_user("alice")).await.unwrap();

        let updated = repo
            .update_user(
                user.id,
                UserChanges {
                    favorite_color: Some("green".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.favorite_color.as_deref(), Some("green"));
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn update_to_taken_email_fails_and_changes_nothing() {
        let repo = repo().await;
        let alice = repo.create_user(sample_user("alice")).await.unwrap();
        repo.create_user(sample_user("bob")).await.unwrap();

        let res = repo
            .update_user(
                alice.id,
                UserChanges {
                    name: Some("Alice Renamed".into()),
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(res, Err(RepoError::DuplicateEmail)));

        let stored = repo.get_user(alice.id).await.unwrap();
        assert_eq!(stored.name, alice.name);
        assert_eq!(stored.email, "alice@example.com");
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let repo = repo().await;
        let res = repo.update_user(99, UserChanges::default()).await;
        assert!(matches!(res, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let repo = repo().await;
        for name in ["carol", "alice", "bob"] {
            repo.create_user(sample_user(name)).await.unwrap();
        }
        let names: Vec<_> = repo
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[tokio::test]
    async fn find_by_login_accepts_username_or_email() {
        let repo = repo().await;
        let alice = repo.create_user(sample_user("alice")).await.unwrap();

        let by_name = repo.find_user_by_login("alice").await.unwrap().unwrap();
        let by_email = repo
            .find_user_by_login("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, alice.id);
        assert_eq!(by_email.id, alice.id);
        assert!(repo.find_user_by_login("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_user() {
        let repo = repo().await;
        let user = repo.create_user(sample_user("alice")).await.unwrap();
        repo.delete_user(user.id).await.unwrap();
        assert!(matches!(repo.get_user(user.id).await, Err(RepoError::NotFound)));
        assert!(matches!(repo.delete_user(user.id).await, Err(RepoError::NotFound)));
    }
}
