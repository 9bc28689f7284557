use serde::Deserialize;

use crate::outcome::FieldErrors;
use crate::posts::repo_types::{NewPost, PostChanges};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    pub slug: String,
}

impl PostForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.require("title", &self.title);
        errors.require("content", &self.content);
        errors.require("slug", &self.slug);
        errors
    }

    pub fn into_new_post(self) -> NewPost {
        NewPost {
            title: self.title.trim().to_string(),
            content: self.content,
            slug: self.slug.trim().to_string(),
        }
    }

    pub fn into_changes(self) -> PostChanges {
        PostChanges {
            title: Some(self.title.trim().to_string()),
            content: Some(self.content),
            slug: Some(self.slug.trim().to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub searched: String,
}
