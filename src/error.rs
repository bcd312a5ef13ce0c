use thiserror::Error;

/// Which page contract a descriptor or document was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    SearchTitle,
    SearchUser,
    Thread,
}

impl PageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchTitle => "search-title",
            Self::SearchUser => "search-user",
            Self::Thread => "thread",
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while fetching and interpreting forum pages.
///
/// Structural errors (the page or payload no longer matches the markup this
/// scraper was written against) are permanent: retrying cannot help and the
/// failing unit of work must not enqueue successors. Transport problems are
/// transient and left to the worker pool's bounded retry.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unexpected {kind} page at {url}: {reason}")]
    NotExpectedPage {
        kind: PageKind,
        url: String,
        reason: String,
    },

    #[error("comment payload for post {post_no} has no next_snC field")]
    MissingCommentCursor { post_no: i64 },

    #[error("comment payload for post {post_no} is not usable: {reason}")]
    BadCommentPayload { post_no: i64, reason: String },

    #[error("malformed url {url}: {message}")]
    MalformedUrl { url: String, message: String },

    #[error("request for {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} returned status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("browser rendering of {url} failed: {message}")]
    Render { url: String, message: String },
}

impl ScrapeError {
    /// Whether retrying the same unit of work can ever succeed.
    ///
    /// Client-error statuses count as permanent: the resource is gone or
    /// forbidden, not momentarily unavailable.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::NotExpectedPage { .. }
            | Self::MissingCommentCursor { .. }
            | Self::BadCommentPayload { .. }
            | Self::MalformedUrl { .. } => true,
            Self::FetchStatus { status, .. } => (400..500).contains(status),
            Self::Fetch { .. } | Self::Render { .. } => false,
        }
    }

    pub(crate) fn not_expected(kind: PageKind, url: &str, reason: impl Into<String>) -> Self {
        Self::NotExpectedPage {
            kind,
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
