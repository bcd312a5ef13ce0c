use scraper::Html;
use tracing::debug;

use super::client::PageFetcher;
use super::page::{
    element_text, Paginated, LIST_MAIN, LIST_ROW, LIST_TITLE_LINK, LIST_USER, NO_RESULT_APOLOGY,
    SHAPE_DRIFT,
};
use super::url::PageUrl;
use crate::error::{PageKind, ScrapeError};

/// One thread row of a title-search listing.
#[derive(Debug, Clone)]
pub struct ListingRow {
    /// Absolute thread URL.
    pub url: PageUrl,
    pub title: String,
    /// Account of the thread starter, as shown in the listing.
    pub user: String,
}

/// A `B.php?qt=1` search-result page.
///
/// Rows are extracted eagerly at construction; a page that yields no rows is
/// only valid when the forum's "nothing found" apology is present.
pub struct SearchTitlePage {
    url: PageUrl,
    html: String,
    rows: Vec<ListingRow>,
}

impl SearchTitlePage {
    /// Fetch and validate a title-search page.
    ///
    /// # Errors
    ///
    /// Returns a fetch error, or `ScrapeError::NotExpectedPage` when the
    /// descriptor or document does not look like a title search.
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
    /// title search or the markup has drifted.
    pub fn from_html(url: PageUrl, html: String) -> Result<Self, ScrapeError> {
        Self::check_url(&url)?;

        let document = Html::parse_document(&html);
        let mut rows = Vec::new();

        for row in document.select(&LIST_ROW) {
            // Rows without a main cell are ad slots dressed as results.
            if row.select(&LIST_MAIN).next().is_none() {
                continue;
            }

            let title_link = row.select(&LIST_TITLE_LINK).next().ok_or_else(|| {
                ScrapeError::not_expected(PageKind::SearchTitle, url.as_str(), SHAPE_DRIFT)
            })?;
            let href = title_link.value().attr("href").ok_or_else(|| {
                ScrapeError::not_expected(PageKind::SearchTitle, url.as_str(), SHAPE_DRIFT)
            })?;
            let user_cell = row.select(&LIST_USER).next().ok_or_else(|| {
                ScrapeError::not_expected(PageKind::SearchTitle, url.as_str(), SHAPE_DRIFT)
            })?;

            rows.push(ListingRow {
                url: url.join(href)?,
                title: element_text(&title_link),
                user: element_text(&user_cell),
            });
        }

        if rows.is_empty() && !html.contains(NO_RESULT_APOLOGY) {
            return Err(ScrapeError::not_expected(
                PageKind::SearchTitle,
                url.as_str(),
                SHAPE_DRIFT,
            ));
        }

        debug!(url = %url, rows = rows.len(), "Parsed title-search page");

        Ok(Self { url, html, rows })
    }

    fn check_url(url: &PageUrl) -> Result<(), ScrapeError> {
        let shape_ok =
            url.path().ends_with("/B.php") && url.query("qt").as_deref() == Some("1") && url.has_query("q");
        if shape_ok {
            Ok(())
        } else {
            Err(ScrapeError::not_expected(
                PageKind::SearchTitle,
                url.as_str(),
                "not a title-search url",
            ))
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[ListingRow] {
        &self.rows
    }

    /// Rows, optionally narrowed to threads started by exactly `user`.
    #[must_use]
    pub fn rows_for(&self, user: Option<&str>) -> Vec<&ListingRow> {
        self.rows
            .iter()
            .filter(|row| user.map_or(true, |u| row.user == u))
            .collect()
    }
}

impl Paginated for SearchTitlePage {
    fn url(&self) -> &PageUrl {
        &self.url
    }

    fn html(&self) -> &str {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://forum.gamer.com.tw/B.php?bsn=60076&qt=1&q=%E6%AD%8C%E4%B8%B2";

    fn result_row(title: &str, href: &str, user: &str) -> String {
        format!(
            r#"<tr class="b-list__row">
                <td class="b-list__main">
                    <a class="b-list__main__title" href="{href}">{title}</a>
                </td>
                <td class="b-list__count"><p class="b-list__count__user">{user}</p></td>
            </tr>"#
        )
    }

    fn ad_row() -> String {
        r#"<tr class="b-list__row"><td class="b-list__ad">sponsored</td></tr>"#.to_string()
    }

    fn listing_page(rows: &[String], paginator: &str) -> String {
        format!(
            "<html><body><table>{}</table>{paginator}</body></html>",
            rows.join("\n")
        )
    }

    fn parse(html: String) -> Result<SearchTitlePage, ScrapeError> {
        SearchTitlePage::from_html(PageUrl::parse(PAGE_URL).unwrap(), html)
    }

    #[test]
    fn test_rows_have_absolute_urls_titles_and_users() {
        let html = listing_page(
            &[
                result_row("11/7 半夜歌串", "C.php?bsn=60076&snA=6004847", "alice1"),
                result_row("11/8 半夜歌串", "C.php?bsn=60076&snA=6004900", "bob2"),
            ],
            "",
        );

        let page = parse(html).unwrap();
        let rows = page.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].url.as_str(),
            "https://forum.gamer.com.tw/C.php?bsn=60076&snA=6004847"
        );
        assert_eq!(rows[0].title, "11/7 半夜歌串");
        assert_eq!(rows[0].user, "alice1");
        assert_eq!(rows[1].user, "bob2");
    }

    #[test]
    fn test_ad_rows_are_skipped() {
        let html = listing_page(
            &[
                ad_row(),
                result_row("11/7 半夜歌串", "C.php?bsn=60076&snA=1", "alice1"),
                ad_row(),
            ],
            "",
        );

        let page = parse(html).unwrap();
        assert_eq!(page.rows().len(), 1);
    }

    #[test]
    fn test_user_filter_matches_exactly() {
        let html = listing_page(
            &[
                result_row("a", "C.php?bsn=60076&snA=1", "alice1"),
                result_row("b", "C.php?bsn=60076&snA=2", "bob2"),
                result_row("c", "C.php?bsn=60076&snA=3", "alice1"),
            ],
            "",
        );

        let page = parse(html).unwrap();
        assert_eq!(page.rows_for(None).len(), 3);

        let filtered = page.rows_for(Some("alice1"));
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|row| row.user == "alice1"));

        assert!(page.rows_for(Some("alice")).is_empty());
    }

    #[test]
    fn test_zero_results_need_the_apology() {
        let apology = format!("<html><body><p>{NO_RESULT_APOLOGY}「xyz」的文章</p></body></html>");
        let page = parse(apology).unwrap();
        assert!(page.rows().is_empty());
        assert!(!page.has_next_page());

        let silent_empty = listing_page(&[], "");
        assert!(matches!(
            parse(silent_empty),
            Err(ScrapeError::NotExpectedPage { .. })
        ));
    }

    #[test]
    fn test_renamed_classes_fail_construction() {
        let html = listing_page(
            &[result_row("a", "C.php?bsn=60076&snA=1", "alice1")],
            "",
        )
        .replace("b-list__main", "changed_class");

        assert!(matches!(
            parse(html),
            Err(ScrapeError::NotExpectedPage { .. })
        ));
    }

    #[test]
    fn test_wrong_descriptor_is_rejected() {
        let thread_url = PageUrl::parse("https://forum.gamer.com.tw/C.php?bsn=60076&snA=1").unwrap();
        assert!(SearchTitlePage::from_html(thread_url, String::new()).is_err());

        // Right path, wrong search mode.
        let user_search =
            PageUrl::parse("https://forum.gamer.com.tw/B.php?bsn=60076&qt=6&q=x").unwrap();
        assert!(SearchTitlePage::from_html(user_search, String::new()).is_err());
    }

    #[test]
    fn test_pagination_protocol() {
        let html = listing_page(
            &[result_row("a", "C.php?bsn=60076&snA=1", "alice1")],
            r#"<p class="pagenow">1</p><a href="?page=2">2</a>"#,
        );

        let page = parse(html).unwrap();
        assert!(page.has_next_page());
        assert_eq!(
            page.next_url().as_str(),
            format!("{PAGE_URL}&page=2")
        );

        let last = listing_page(
            &[result_row("a", "C.php?bsn=60076&snA=1", "alice1")],
            r#"<a href="?page=1">1</a><p class="pagenow">2</p>"#,
        );
        let page = parse(last).unwrap();
        assert!(!page.has_next_page());
    }
}
