//! Shared plumbing for the page types.
//!
//! The CSS landmarks and the zero-result apology text are the contract this
//! scraper has with the forum's markup. When the site redesigns, these are
//! the strings that break, so they live in one place.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::url::PageUrl;

/// Substring shown by the forum when a search legitimately matches nothing.
pub(crate) const NO_RESULT_APOLOGY: &str = "很抱歉，無法搜尋到有關";

/// Validation failure message shared by the page types.
pub(crate) const SHAPE_DRIFT: &str = "has the html structure or css changed?";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

pub(crate) static LIST_ROW: Lazy<Selector> = Lazy::new(|| selector(".b-list__row"));
pub(crate) static LIST_MAIN: Lazy<Selector> = Lazy::new(|| selector(".b-list__main"));
pub(crate) static LIST_TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector(".b-list__main__title"));
pub(crate) static LIST_USER: Lazy<Selector> = Lazy::new(|| selector(".b-list__count__user"));
pub(crate) static LIST_MAIN_LINK: Lazy<Selector> = Lazy::new(|| selector(".b-list__main > a"));
pub(crate) static PAGINATOR_CURRENT: Lazy<Selector> = Lazy::new(|| selector(".pagenow"));
pub(crate) static POST_SECTION: Lazy<Selector> =
    Lazy::new(|| selector(r#".c-section[id^="post_"]"#));
pub(crate) static POST_CONTENT: Lazy<Selector> = Lazy::new(|| selector(".c-article__content"));
pub(crate) static POST_TIME_LINK: Lazy<Selector> = Lazy::new(|| selector("a[data-mtime]"));
pub(crate) static POST_USER_ID: Lazy<Selector> = Lazy::new(|| selector(".userid"));
pub(crate) static POST_USER_NAME: Lazy<Selector> = Lazy::new(|| selector(".username"));
pub(crate) static DOC_TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
pub(crate) static THREAD_META: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="al:ios:url"]"#));

/// A fetched page that may continue onto a next page.
///
/// The forum renders the current page number as a `.pagenow` node inside the
/// paginator; further pages show up as its following siblings. A page
/// without a paginator is a complete, single-page result.
pub trait Paginated {
    fn url(&self) -> &PageUrl;
    fn html(&self) -> &str;

    /// Whether the paginator advertises a page after this one.
    fn has_next_page(&self) -> bool {
        let document = Html::parse_document(self.html());
        has_following_page(&document)
    }

    /// Descriptor for the next page. Meaningful only when
    /// `has_next_page()` is true.
    fn next_url(&self) -> PageUrl {
        let url = self.url();
        url.with_page(url.page() + 1)
    }
}

pub(crate) fn has_following_page(document: &Html) -> bool {
    let Some(current) = document.select(&PAGINATOR_CURRENT).next() else {
        return false;
    };

    current
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .any(|sibling| !element_text(&sibling).is_empty())
}

/// Concatenated, trimmed text of an element.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trailing run of ASCII digits in a string, if any.
pub(crate) fn trailing_digits(value: &str) -> Option<&str> {
    let trimmed = value.trim_end_matches(|c: char| !c.is_ascii_digit());
    let start = trimmed.rfind(|c: char| !c.is_ascii_digit()).map_or(0, |i| {
        i + trimmed[i..].chars().next().map_or(1, char::len_utf8)
    });
    let digits = &trimmed[start..];
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
