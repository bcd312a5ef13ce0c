use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::client::HttpFetcher;
use crate::config::Config;
use crate::error::ScrapeError;

/// One comment entry from the AJAX endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentRecord {
    pub userid: String,
    pub nick: String,
    pub content: String,
    /// Forum timestamp string, `YYYY-MM-DD HH:MM:SS`.
    pub wtime: String,
}

/// One page of comments plus the continuation cursor, if any.
#[derive(Debug, Clone)]
pub struct CommentBatch {
    pub comments: Vec<CommentRecord>,
    /// Cursor for the next batch; `None` means this was the last one.
    pub next: Option<String>,
}

/// Client for the `ajax/moreCommend.php` comment endpoint.
///
/// The endpoint returns a JSON object whose `next_snC` field carries the
/// pagination cursor and whose remaining entries are the comments. It is
/// plain-HTTP only; comments are never rendered through the browser.
pub struct CommentFetcher {
    http: HttpFetcher,
    config: Config,
}

impl CommentFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            config: config.clone(),
        })
    }

    /// Fetch one batch of comments for a post, optionally continuing from a
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns a fetch error, `ScrapeError::MissingCommentCursor` when the
    /// payload lacks `next_snC`, or `ScrapeError::BadCommentPayload` when it
    /// is not a JSON object.
    pub async fn fetch_page(
        &self,
        post_no: i64,
        cursor: Option<&str>,
    ) -> Result<CommentBatch, ScrapeError> {
        let url = self.config.comment_url(post_no, cursor);
        debug!(post_no, cursor, "Fetching comment batch");

        let body = self.http.get_text(&url).await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| ScrapeError::BadCommentPayload {
                post_no,
                reason: format!("not json: {e}"),
            })?;

        parse_payload(post_no, value)
    }
}

/// Interpret one endpoint payload.
///
/// The cursor is removed first: a payload without it (or with an explicit
/// null) means the endpoint's shape changed and the whole unit of work is
/// abandoned. A cursor of `0` or the empty string marks the final batch.
/// Remaining entries that do not parse as comments are skipped.
pub(crate) fn parse_payload(post_no: i64, value: Value) -> Result<CommentBatch, ScrapeError> {
    let Value::Object(mut map) = value else {
        return Err(ScrapeError::BadCommentPayload {
            post_no,
            reason: "payload is not a json object".to_string(),
        });
    };

    let cursor = match map.remove("next_snC") {
        None | Some(Value::Null) => return Err(ScrapeError::MissingCommentCursor { post_no }),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(ScrapeError::BadCommentPayload {
                post_no,
                reason: format!("next_snC is not a scalar: {other}"),
            })
        }
    };
    let next = match cursor.trim() {
        "" | "0" => None,
        trimmed => Some(trimmed.to_string()),
    };

    let mut comments = Vec::new();
    for (key, entry) in map {
        match serde_json::from_value::<CommentRecord>(entry) {
            Ok(comment) => comments.push(comment),
            Err(e) => warn!(post_no, key = %key, "Skipping malformed comment entry: {e}"),
        }
    }

    Ok(CommentBatch { comments, next })
}
