use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::client::PageFetcher;
use super::page::{
    element_text, trailing_digits, Paginated, DOC_TITLE, POST_CONTENT, POST_SECTION,
    POST_TIME_LINK, POST_USER_ID, POST_USER_NAME, SHAPE_DRIFT, THREAD_META,
};
use super::url::PageUrl;
use crate::error::{PageKind, ScrapeError};

/// Timestamp format used by the forum's `data-mtime` attributes and the
/// comment endpoint's `wtime` fields.
pub const FORUM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static TITLE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})").expect("valid regex"));

/// A title date is only trusted when it lands within this many days of the
/// first post. Song-chain threads are posted the night they are about;
/// anything further off is a stray number in the title.
const TITLE_DATE_TOLERANCE_DAYS: i64 = 2;

/// One post on a thread page.
#[derive(Debug, Clone)]
pub struct PostSection {
    /// Forum-wide serial number of the post.
    pub no: i64,
    pub author_account: String,
    pub author_name: String,
    /// Inner HTML of the post body.
    pub content_html: String,
    pub created_at: NaiveDateTime,
}

impl PostSection {
    fn from_element(section: &ElementRef) -> Result<Self, String> {
        let id = section
            .value()
            .attr("id")
            .ok_or_else(|| "section has no id".to_string())?;
        let no = id
            .strip_prefix("post_")
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| format!("section id '{id}' is not a post number"))?;

        let content = section
            .select(&POST_CONTENT)
            .next()
            .ok_or_else(|| "no content cell".to_string())?;

        let mtime = section
            .select(&POST_TIME_LINK)
            .next()
            .and_then(|a| a.value().attr("data-mtime"))
            .ok_or_else(|| "no data-mtime".to_string())?;
        let created_at = NaiveDateTime::parse_from_str(mtime, FORUM_TIME_FORMAT)
            .map_err(|e| format!("bad data-mtime '{mtime}': {e}"))?;

        let account = section
            .select(&POST_USER_ID)
            .next()
            .map(|el| element_text(&el))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "no userid".to_string())?;
        let name = section
            .select(&POST_USER_NAME)
            .next()
            .map(|el| element_text(&el))
            .ok_or_else(|| "no username".to_string())?;

        Ok(Self {
            no,
            author_account: account,
            author_name: name,
            content_html: content.inner_html(),
            created_at,
        })
    }
}

/// A thread page (`C.php?snA=`) or single-post page (`Co.php?sn=`).
///
/// Both shapes share the same markup; a single-post page simply carries one
/// section and still identifies its owning thread through the app-link meta
/// tag, which is why the thread index comes from page content rather than
/// from the requested URL.
pub struct ThreadPage {
    url: PageUrl,
    html: String,
    index: i64,
    title: String,
    date: NaiveDate,
    posts: Vec<PostSection>,
}

impl ThreadPage {
    /// Fetch and validate a thread page.
    ///
    /// # Errors
    ///
    /// Returns a fetch error, or `ScrapeError::NotExpectedPage` when the
    /// descriptor or document does not look like a thread.
    pub async fn fetch(fetcher: &dyn PageFetcher, url: PageUrl) -> Result<Self, ScrapeError> {
        Self::check_url(&url)?;
        let html = fetcher.fetch(&url).await?;
        Self::from_html(url, html)
    }

    /// Build from already-fetched HTML, validating shape.
    ///
    /// Requires the app-link meta tag with a numeric thread id, a document
    /// title, and at least one parseable post section. Sections that fail to
    /// parse individually are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::NotExpectedPage` when any requirement is
    /// missing, which is also what an "article does not exist" interstitial
    /// produces.
    pub fn from_html(url: PageUrl, html: String) -> Result<Self, ScrapeError> {
        Self::check_url(&url)?;

        let document = Html::parse_document(&html);
        let shape_err = || ScrapeError::not_expected(PageKind::Thread, url.as_str(), SHAPE_DRIFT);

        let index = document
            .select(&THREAD_META)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .and_then(trailing_digits)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(shape_err)?;

        let raw_title = document
            .select(&DOC_TITLE)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .ok_or_else(shape_err)?;
        // Document titles carry a " @board" suffix on the live site.
        let title = raw_title
            .split(" @")
            .next()
            .unwrap_or(&raw_title)
            .to_string();

        let mut posts = Vec::new();
        for section in document.select(&POST_SECTION) {
            match PostSection::from_element(&section) {
                Ok(post) => posts.push(post),
                Err(reason) => {
                    warn!(url = %url, reason, "Skipping unparseable post section");
                }
            }
        }
        if posts.is_empty() {
            return Err(shape_err());
        }

        let date = resolve_date(&title, posts[0].created_at);

        debug!(url = %url, index, posts = posts.len(), "Parsed thread page");

        Ok(Self {
            url,
            html,
            index,
            title,
            date,
            posts,
        })
    }

    fn check_url(url: &PageUrl) -> Result<(), ScrapeError> {
        let thread_shape = url.path().ends_with("/C.php") && url.has_query("snA");
        let single_post_shape = url.path().ends_with("/Co.php") && url.has_query("sn");
        if thread_shape || single_post_shape {
            Ok(())
        } else {
            Err(ScrapeError::not_expected(
                PageKind::Thread,
                url.as_str(),
                "not a thread url",
            ))
        }
    }

    /// Forum-wide thread id, taken from page content.
    #[must_use]
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Thread title with the board suffix removed.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The calendar date this thread is about.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Posts in document order.
    #[must_use]
    pub fn posts(&self) -> &[PostSection] {
        &self.posts
    }
}

impl Paginated for ThreadPage {
    fn url(&self) -> &PageUrl {
        &self.url
    }

    fn html(&self) -> &str {
        &self.html
    }
}

/// Resolve the date a thread is about.
///
/// Song-chain titles name their evening as `M/D` without a year. The year is
/// taken from the first post by trying it and its neighbors and keeping the
/// candidate closest to the post's timestamp, which corrects titles written
/// just before or after New Year. Titles without a usable token resolve to
/// the first post's date.
pub(crate) fn resolve_date(title: &str, first_post: NaiveDateTime) -> NaiveDate {
    title_date_candidate(title, first_post.date()).unwrap_or_else(|| first_post.date())
}

fn title_date_candidate(title: &str, anchor: NaiveDate) -> Option<NaiveDate> {
    let caps = TITLE_DATE.captures(title)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;

    let best = (-1i32..=1)
        .filter_map(|offset| NaiveDate::from_ymd_opt(anchor.year() + offset, month, day))
        .min_by_key(|candidate| (*candidate - anchor).num_days().abs())?;

    ((best - anchor).num_days().abs() <= TITLE_DATE_TOLERANCE_DAYS).then_some(best)
}
