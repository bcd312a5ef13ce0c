use scraper::Html;
use tracing::debug;

use super::client::PageFetcher;
use super::page::{element_text, Paginated, LIST_MAIN_LINK, NO_RESULT_APOLOGY, SHAPE_DRIFT};
use super::url::PageUrl;
use crate::error::{PageKind, ScrapeError};

/// One post row of a user-search listing.
///
/// User search returns individual posts, so row URLs point at `Co.php`
/// single-post pages rather than whole threads.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub url: PageUrl,
    pub title: String,
}

/// A `Bo.php?qt=6` search-result page.
pub struct SearchUserPage {
    url: PageUrl,
    html: String,
    rows: Vec<UserRow>,
}

impl SearchUserPage {
    /// Fetch and validate a user-search page.
    ///
    /// # Errors
    ///
    /// Returns a fetch error, or `ScrapeError::NotExpectedPage` when the
    /// descriptor or document does not look like a user search.
    pub async fn fetch(fetcher: &dyn PageFetcher, url: PageUrl) -> Result<Self, ScrapeError> {
        Self::check_url(&url)?;
        let html = fetcher.fetch(&url).await?;
        Self::from_html(url, html)
    }

    /// Build from already-fetched HTML, validating shape.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::NotExpectedPage` when the descriptor is not a
    /// user search or the markup has drifted.
    pub fn from_html(url: PageUrl, html: String) -> Result<Self, ScrapeError> {
        Self::check_url(&url)?;

        let document = Html::parse_document(&html);
        let mut rows = Vec::new();

        for link in document.select(&LIST_MAIN_LINK) {
            let href = link.value().attr("href").ok_or_else(|| {
                ScrapeError::not_expected(PageKind::SearchUser, url.as_str(), SHAPE_DRIFT)
            })?;
            rows.push(UserRow {
                url: url.join(href)?,
                title: element_text(&link),
            });
        }

        if rows.is_empty() && !html.contains(NO_RESULT_APOLOGY) {
            return Err(ScrapeError::not_expected(
                PageKind::SearchUser,
                url.as_str(),
                SHAPE_DRIFT,
            ));
        }

        debug!(url = %url, rows = rows.len(), "Parsed user-search page");

        Ok(Self { url, html, rows })
    }

    fn check_url(url: &PageUrl) -> Result<(), ScrapeError> {
        let shape_ok = url.path().ends_with("/Bo.php")
            && url.query("qt").as_deref() == Some("6")
            && url.has_query("q");
        if shape_ok {
            Ok(())
        } else {
            Err(ScrapeError::not_expected(
                PageKind::SearchUser,
                url.as_str(),
                "not a user-search url",
            ))
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[UserRow] {
        &self.rows
    }
}

impl Paginated for SearchUserPage {
    fn url(&self) -> &PageUrl {
        &self.url
    }

    fn html(&self) -> &str {
        &self.html
    }
}
