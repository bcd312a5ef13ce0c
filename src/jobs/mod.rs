//! Scraping jobs and their dispatch.
//!
//! Each job is one self-contained unit of work against one URL or one post.
//! Jobs queue their own follow-up work: a search page queues its threads and
//! its successor page, a thread page queues comment fetches for new posts.
//! Nothing here retries; the worker pool decides what happens to a failed
//! job.

mod cleanup;
mod comments;
mod search;
mod thread;

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::baha::{CommentFetcher, PageFetcher, PageUrl};
use crate::config::Config;
use crate::constants::AVATAR_BASE_URL;
use crate::db::Database;
use crate::queue::JobQueue;

/// One unit of scraping work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Scrape one page of title-search results.
    SearchTitle {
        title: String,
        /// Restrict to threads started by this account.
        user: Option<String>,
        page: u32,
    },
    /// Scrape one page of a user's post search.
    SearchUser { user: String, page: u32 },
    /// Scrape one page of a thread.
    ScrapeThread { url: PageUrl },
    /// Scrape a single-post page.
    ScrapePost { url: PageUrl },
    /// Walk one post's comment feed.
    FetchComments { post_no: i64 },
    /// Drop music flags that no longer have links behind them.
    CleanupPosts,
}

impl Job {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchTitle { .. } => "search_title",
            Self::SearchUser { .. } => "search_user",
            Self::ScrapeThread { .. } => "scrape_thread",
            Self::ScrapePost { .. } => "scrape_post",
            Self::FetchComments { .. } => "fetch_comments",
            Self::CleanupPosts => "cleanup_posts",
        }
    }
}

/// Everything a job needs to run.
#[derive(Clone)]
pub struct JobContext {
    pub config: Config,
    pub db: Database,
    pub fetcher: Arc<dyn PageFetcher>,
    pub comments: Arc<CommentFetcher>,
    pub queue: Arc<dyn JobQueue>,
}

/// Run one job to completion.
///
/// # Errors
///
/// Returns whatever the job fails with; scrape errors keep their type so the
/// caller can tell permanent failures from transient ones.
pub async fn run(ctx: &JobContext, job: Job) -> Result<()> {
    match job {
        Job::SearchTitle { title, user, page } => {
            search::run_title_search(ctx, &title, user.as_deref(), page).await
        }
        Job::SearchUser { user, page } => search::run_user_search(ctx, &user, page).await,
        Job::ScrapeThread { url } => thread::scrape_thread(ctx, &url).await,
        Job::ScrapePost { url } => thread::scrape_post(ctx, &url).await,
        Job::FetchComments { post_no } => comments::fetch_comments(ctx, post_no).await,
        Job::CleanupPosts => cleanup::clear_stale_music_flags(ctx).await,
    }
}

/// Profile picture URL for a forum account.
///
/// The avatar host shards by the account's first two characters.
pub(crate) fn avatar_url(account: &str) -> String {
    let mut chars = account.chars();
    let first = chars.next().unwrap_or('_');
    let second = chars.next().unwrap_or(first);
    format!("{AVATAR_BASE_URL}/{first}/{second}/{account}/{account}_s.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_shards_by_leading_characters() {
        assert_eq!(
            avatar_url("soda123"),
            "https://avatar2.bahamut.com.tw/avataruserpic/s/o/soda123/soda123_s.png"
        );
        assert_eq!(
            avatar_url("x"),
            "https://avatar2.bahamut.com.tw/avataruserpic/x/x/x/x_s.png"
        );
    }

    #[test]
    fn test_job_wire_shape_is_tagged_snake_case() {
        let job = Job::SearchTitle {
            title: "半夜歌串".into(),
            user: None,
            page: 2,
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["job"], "search_title");
        assert_eq!(json["page"], 2);

        let url = PageUrl::parse("https://forum.gamer.com.tw/C.php?bsn=60076&snA=1").unwrap();
        let json = serde_json::to_value(Job::ScrapeThread { url: url.clone() }).unwrap();
        assert_eq!(json["job"], "scrape_thread");
        assert_eq!(json["url"], url.as_str());

        let round: Job = serde_json::from_value(json).unwrap();
        assert_eq!(round, Job::ScrapeThread { url });
    }
}
