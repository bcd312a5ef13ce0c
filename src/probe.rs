//! Layout probe against the live site.
//!
//! Scrapers break silently when the forum's markup changes, so this fetches
//! one page of each kind and reports whether every landmark still extracts.
//! The probe stores nothing; it exists to be run from the command line
//! before trusting a scrape.

use tracing::debug;

use crate::baha::{CommentFetcher, PageFetcher, PageUrl, Paginated, SearchTitlePage, SearchUserPage, ThreadPage};
use crate::config::Config;

/// Listing pages show 30 rows when full; fewer rows on page 1 of a standing
/// search usually means the row selector only half-matches.
const WARN_THRESHOLD: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Passed,
    Warn,
    Failed,
}

impl ProbeStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Warn => "warn",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one probed landmark.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub subject: String,
    pub status: ProbeStatus,
    pub detail: String,
}

impl ProbeReport {
    fn passed(subject: &str, detail: String) -> Self {
        Self {
            subject: subject.to_string(),
            status: ProbeStatus::Passed,
            detail,
        }
    }

    fn failed(subject: &str, detail: String) -> Self {
        Self {
            subject: subject.to_string(),
            status: ProbeStatus::Failed,
            detail,
        }
    }

    fn counted(subject: &str, count: usize, unit: &str) -> Self {
        let status = if count == 0 {
            ProbeStatus::Failed
        } else if count < WARN_THRESHOLD {
            ProbeStatus::Warn
        } else {
            ProbeStatus::Passed
        };
        Self {
            subject: subject.to_string(),
            status,
            detail: format!("{count} {unit}"),
        }
    }

    fn presence(subject: &str, ok: bool, detail: String) -> Self {
        Self {
            subject: subject.to_string(),
            status: if ok {
                ProbeStatus::Passed
            } else {
                ProbeStatus::Failed
            },
            detail,
        }
    }
}

/// Probe every page kind with the given fetcher.
///
/// Later checks build on earlier ones (the thread comes from the first
/// search row), so a structural failure ends the run with that failure as
/// the last report. When a comment fetcher is given, the first post's
/// comment feed is requested too.
pub async fn run_probe(
    config: &Config,
    fetcher: &dyn PageFetcher,
    comments: Option<&CommentFetcher>,
) -> Vec<ProbeReport> {
    let mut reports = Vec::new();

    // Title search.
    let listing = match title_search_page(config, fetcher).await {
        Ok(listing) => listing,
        Err(e) => {
            reports.push(ProbeReport::failed("search page", e));
            return reports;
        }
    };
    reports.push(ProbeReport::counted("search items", listing.rows().len(), "rows"));
    reports.push(ProbeReport {
        subject: "search paginator".to_string(),
        status: if listing.has_next_page() {
            ProbeStatus::Passed
        } else {
            ProbeStatus::Warn
        },
        detail: if listing.has_next_page() {
            "next page present".to_string()
        } else {
            "no next page on page 1".to_string()
        },
    });

    let Some(first_row) = listing.rows().first() else {
        return reports;
    };
    reports.push(ProbeReport::passed(
        "thread url",
        first_row.url.as_str().to_string(),
    ));

    // Thread page, via the first search row.
    let thread = match ThreadPage::fetch(fetcher, first_row.url.clone()).await {
        Ok(thread) => thread,
        Err(e) => {
            reports.push(ProbeReport::failed("thread page", e.to_string()));
            return reports;
        }
    };
    reports.push(ProbeReport::presence(
        "thread title",
        !thread.title().is_empty(),
        thread.title().to_string(),
    ));
    reports.push(ProbeReport::counted("post sections", thread.posts().len(), "posts"));

    let first_post = &thread.posts()[0];
    reports.push(ProbeReport::presence(
        "post index",
        first_post.no > 0,
        first_post.no.to_string(),
    ));
    reports.push(ProbeReport::presence(
        "post userid",
        !first_post.author_account.is_empty(),
        first_post.author_account.clone(),
    ));
    reports.push(ProbeReport::presence(
        "post username",
        !first_post.author_name.is_empty(),
        first_post.author_name.clone(),
    ));
    reports.push(ProbeReport::presence(
        "post content",
        !first_post.content_html.trim().is_empty(),
        format!("{} bytes", first_post.content_html.len()),
    ));
    reports.push(ProbeReport::passed(
        "post time",
        first_post.created_at.to_string(),
    ));

    // User search, with the first row's author.
    match user_search_page(config, fetcher, &first_row.user).await {
        Ok(user_listing) => {
            reports.push(ProbeReport::counted(
                "user search items",
                user_listing.rows().len(),
                "rows",
            ));
        }
        Err(e) => {
            reports.push(ProbeReport::failed("user search page", e));
        }
    }

    // Comment feed of the first post.
    if let Some(comments) = comments {
        reports.push(comment_probe(comments, first_post.no).await);
    }

    debug!(reports = reports.len(), "Probe finished");
    reports
}

async fn title_search_page(
    config: &Config,
    fetcher: &dyn PageFetcher,
) -> Result<SearchTitlePage, String> {
    let url = PageUrl::parse(&config.title_search_url(&config.search_title, 1))
        .map_err(|e| e.to_string())?;
    SearchTitlePage::fetch(fetcher, url)
        .await
        .map_err(|e| e.to_string())
}

async fn user_search_page(
    config: &Config,
    fetcher: &dyn PageFetcher,
    user: &str,
) -> Result<SearchUserPage, String> {
    let url = PageUrl::parse(&config.user_search_url(user, 1)).map_err(|e| e.to_string())?;
    SearchUserPage::fetch(fetcher, url)
        .await
        .map_err(|e| e.to_string())
}

async fn comment_probe(comments: &CommentFetcher, post_no: i64) -> ProbeReport {
    match comments.fetch_page(post_no, None).await {
        Ok(batch) => {
            let detail = match batch.next {
                Some(cursor) => format!("{} comments, next cursor {cursor}", batch.comments.len()),
                None => format!("{} comments, final batch", batch.comments.len()),
            };
            ProbeReport::passed("comment request", detail)
        }
        Err(e) => ProbeReport::failed("comment request", e.to_string()),
    }
}

/// Whether any probed landmark failed outright.
#[must_use]
pub fn has_failures(reports: &[ProbeReport]) -> bool {
    reports
        .iter()
        .any(|report| report.status == ProbeStatus::Failed)
}

/// Align reports into a printable table.
#[must_use]
pub fn render(reports: &[ProbeReport]) -> String {
    let width = reports
        .iter()
        .map(|report| report.subject.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for report in reports {
        out.push_str(&format!(
            "{:<width$}  {:<6}  {}\n",
            report.subject,
            report.status.as_str(),
            report.detail
        ));
    }
    out
}
