use serde::{Deserialize, Serialize};

use crate::links::{Site, SiteTag, SITES};

/// A song thread on the forum.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: i64,
    /// Forum thread number (the `snA` query value).
    pub no: i64,
    pub title: String,
    pub url: String,
    /// Resolved subject date, `YYYY-MM-DD`.
    pub date: String,
    pub inserted_at: String,
}

/// A forum account seen as a post or comment author.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poster {
    pub id: i64,
    pub account: String,
    pub name: String,
    pub avatar_url: String,
    pub inserted_at: String,
}

/// A single post inside a thread.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub poster_id: i64,
    /// Forum post serial (the `snB` value used by the comment feed).
    pub no: i64,
    /// Post body as raw HTML.
    pub content: String,
    pub created_at: String,
    pub inserted_at: String,
    pub has_music: bool,
}

/// A recognized music link found in a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub post_id: i64,
    pub poster_id: i64,
    pub site: String,
    pub resource_id: String,
    /// How the link appeared in the post, `anchor` or `text`.
    pub mode: String,
    pub inserted_at: String,
}

impl Link {
    #[must_use]
    pub fn site_tag(&self) -> Option<SiteTag> {
        SiteTag::from_str(&self.site)
    }

    /// Canonical listening URL rebuilt from the stored id.
    #[must_use]
    pub fn general_url(&self) -> Option<String> {
        let site = SITES.site(self.site_tag()?)?;
        Some(site.general_url(&self.resource_id))
    }

    /// Embeddable player URL rebuilt from the stored id.
    #[must_use]
    pub fn embedded_url(&self) -> Option<String> {
        let site = SITES.site(self.site_tag()?)?;
        Some(site.embedded_url(&self.resource_id))
    }
}

/// A comment attached to a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub poster_id: i64,
    pub content: String,
    pub created_at: String,
    pub inserted_at: String,
}

/// Data for creating or refreshing a thread.
#[derive(Debug, Clone)]
pub struct NewThread {
    pub no: i64,
    pub title: String,
    pub url: String,
    pub date: String,
}

/// Data for creating or refreshing a poster.
#[derive(Debug, Clone)]
pub struct NewPoster {
    pub account: String,
    pub name: String,
    pub avatar_url: String,
}

/// Data for creating or refreshing a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub thread_id: i64,
    pub poster_id: i64,
    pub no: i64,
    pub content: String,
    pub created_at: String,
}

/// Data for creating a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub poster_id: i64,
    pub content: String,
    pub created_at: String,
}
