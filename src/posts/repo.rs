use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};
use time::OffsetDateTime;

use crate::db::{RepoError, SqlRepository};
use crate::posts::repo_types::{NewPost, Post, PostChanges};

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, new: NewPost, owner_id: i64) -> Result<Post, RepoError>;
    async fn get_post(&self, id: i64) -> Result<Post, RepoError>;
    /// All posts, oldest first.
    async fn list_posts(&self) -> Result<Vec<Post>, RepoError>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, RepoError>;
    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
    /// Posts whose content contains `needle` (case-sensitive), ordered by title.
    async fn search_posts(&self, needle: &str) -> Result<Vec<Post>, RepoError>;
    async fn count_posts(&self) -> Result<i64, RepoError>;
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.slug, p.date_posted, p.poster_id,
           u.name AS poster_name
      FROM posts p
      LEFT JOIN "user" u ON u.id = p.poster_id
"#;

fn required(field: &str, value: &str) -> Result<(), RepoError> {
    if value.trim().is_empty() {
        return Err(RepoError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

async fn fetch_post_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Option<Post>, RepoError> {
    let post = sqlx::query_as::<_, Post>(&format!("{} WHERE p.id = ?", POST_SELECT))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(post)
}

#[async_trait]
impl PostRepository for SqlRepository {
    async fn create_post(&self, new: NewPost, owner_id: i64) -> Result<Post, RepoError> {
        required("title", &new.title)?;
        required("content", &new.content)?;
        required("slug", &new.slug)?;

        let mut tx = self.db.begin().await?;

        let owner: Option<(i64,)> = sqlx::query_as(r#"SELECT id FROM "user" WHERE id = ?"#)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(RepoError::Validation(format!("owner {} does not exist", owner_id)));
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (title, content, slug, date_posted, poster_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.slug)
        .bind(OffsetDateTime::now_utc())
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::from_write)?;

        let post = fetch_post_tx(&mut tx, id).await?.ok_or(RepoError::NotFound)?;
        tx.commit().await?;
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Post, RepoError> {
        sqlx::query_as::<_, Post>(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, RepoError> {
        let rows = sqlx::query_as::<_, Post>(&format!("{} ORDER BY p.id", POST_SELECT))
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, RepoError> {
        let mut tx = self.db.begin().await?;

        let mut post = fetch_post_tx(&mut tx, id).await?.ok_or(RepoError::NotFound)?;
        if let Some(title) = changes.title {
            required("title", &title)?;
            post.title = title;
        }
        if let Some(content) = changes.content {
            required("content", &content)?;
            post.content = content;
        }
        if let Some(slug) = changes.slug {
            required("slug", &slug)?;
            post.slug = slug;
        }

        sqlx::query("UPDATE posts SET title = ?, content = ?, slug = ? WHERE id = ?")
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.slug)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::from_write)?;

        tx.commit().await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn search_posts(&self, needle: &str) -> Result<Vec<Post>, RepoError> {
        // instr() is a plain case-sensitive substring test; LIKE would fold
        // ASCII case and treat % and _ as wildcards.
        let rows = sqlx::query_as::<_, Post>(&format!(
            "{} WHERE instr(p.content, ?) > 0 ORDER BY p.title, p.id",
            POST_SELECT
        ))
        .bind(needle)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_posts(&self) -> Result<i64, RepoError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
pub(crate) fn sample_post(title: &str, content: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: content.to_string(),
        slug: title.to_lowercase().replace(' ', "-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::users::repo::{sample_user, UserRepository};

    async fn repo_with_owner() -> (SqlRepository, i64) {
        let repo = SqlRepository::new(test_pool().await);
        let owner = repo.create_user(sample_user("alice")).await.unwrap();
        (repo, owner.id)
    }

    #[tokio::test]
    async fn create_post_sets_owner_and_poster_name() {
        let (repo, owner) = repo_with_owner().await;
        let post = repo
            .create_post(sample_post("Hello", "first post"), owner)
            .await
            .unwrap();
        assert_eq!(post.poster_id, owner);
        assert_eq!(post.poster_name.as_deref(), Some("alice name"));
        assert_eq!(post.slug, "hello");

        let fetched = repo.get_post(post.id).await.unwrap();
        assert_eq!(fetched.title, "Hello");
    }

    #[tokio::test]
    async fn create_post_for_unknown_owner_fails() {
        let (repo, _) = repo_with_owner().await;
        let res = repo.create_post(sample_post("Hello", "x"), 404).await;
        assert!(matches!(res, Err(RepoError::Validation(_))));
        assert_eq!(repo.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_slugs_are_allowed() {
        let (repo, owner) = repo_with_owner().await;
        repo.create_post(sample_post("Same", "a"), owner).await.unwrap();
        repo.create_post(sample_post("Same", "b"), owner).await.unwrap();
        assert_eq!(repo.count_posts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_post_is_partial() {
        let (repo, owner) = repo_with_owner().await;
        let post = repo
            .create_post(sample_post("Old title", "body"), owner)
            .await
            .unwrap();

        let updated = repo
            .update_post(
                post.id,
                PostChanges {
                    title: Some("New title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, post.id);
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.content, "body");
        assert_eq!(updated.slug, "old-title");

        let stored = repo.get_post(post.id).await.unwrap();
        assert_eq!(stored.title, "New title");
    }

    #[tokio::test]
    async fn update_with_blank_title_changes_nothing() {
        let (repo, owner) = repo_with_owner().await;
        let post = repo.create_post(sample_post("Keep", "body"), owner).await.unwrap();
        let res = repo
            .update_post(
                post.id,
                PostChanges {
                    title: Some("".into()),
                    content: Some("new body".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(res, Err(RepoError::Validation(_))));
        assert_eq!(repo.get_post(post.id).await.unwrap().content, "body");
    }

    #[tokio::test]
    async fn delete_missing_post_leaves_table_unchanged() {
        let (repo, owner) = repo_with_owner().await;
        repo.create_post(sample_post("One", "x"), owner).await.unwrap();

        assert!(matches!(repo.delete_post(999).await, Err(RepoError::NotFound)));
        assert_eq!(repo.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_matches_content_substring() {
        let (repo, owner) = repo_with_owner().await;
        let a = repo
            .create_post(sample_post("A", "I like cheese"), owner)
            .await
            .unwrap();
        repo.create_post(sample_post("B", "no match"), owner).await.unwrap();

        let hits = repo.search_posts("cheese").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a.id);
    }

    #[tokio::test]
    async fn search_is_case_sensitive_and_ordered_by_title() {
        let (repo, owner) = repo_with_owner().await;
        repo.create_post(sample_post("Zebra", "rust is fun"), owner).await.unwrap();
        repo.create_post(sample_post("Apple", "more rust"), owner).await.unwrap();
        repo.create_post(sample_post("Mango", "Rust upper"), owner).await.unwrap();

        let titles: Vec<_> = repo
            .search_posts("rust")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Apple", "Zebra"]);

        assert!(repo.search_posts("100%").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_owner_cascades_to_posts() {
        let (repo, owner) = repo_with_owner().await;
        repo.create_post(sample_post("One", "x"), owner).await.unwrap();
        repo.delete_user(owner).await.unwrap();
        assert_eq!(repo.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_posts_in_creation_order() {
        let (repo, owner) = repo_with_owner().await;
        for t in ["Second", "First", "Third"] {
            repo.create_post(sample_post(t, "x"), owner).await.unwrap();
        }
        let titles: Vec<_> = repo
            .list_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Second", "First", "Third"]);
    }
}
