//! Music link recognition.
//!
//! Post content is scanned for URLs, each URL is offered to the site
//! registry, and recognized ones are reduced to `(site, resource id)` pairs.
//! Ids are stored instead of raw URLs so that the same song shared through
//! different URL shapes collapses into one row.

mod registry;
mod spotify;
mod street_voice;
mod traits;
mod youtube;

pub use registry::SiteRegistry;
pub use traits::{Site, SiteTag};

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Global site registry, in fixed precedence order.
pub static SITES: Lazy<SiteRegistry> = Lazy::new(SiteRegistry::with_known_sites);

/// Bare URLs in text runs. Quotes and angle brackets end a match so URLs
/// inside attribute values or tags do not bleed into neighboring markup.
static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>\\`]+"#).expect("valid url pattern"));

static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// How a link was written in the content it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractMode {
    /// Href of an anchor element.
    Anchor,
    /// Bare URL in a text run.
    Text,
}

impl ExtractMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchor => "anchor",
            Self::Text => "text",
        }
    }
}

/// A recognized music link found in post content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractedLink {
    pub site: SiteTag,
    pub resource_id: String,
    pub mode: ExtractMode,
}

/// Extract recognized music links from post content.
///
/// The content is parsed as an HTML fragment and anchor hrefs are collected
/// first, then a URL scan over the text nodes picks up links pasted as bare
/// text. Results are deduplicated on `(site, resource id)` keeping first
/// appearance order, so the same song linked twice yields one entry and a
/// song both linked and pasted records as the anchor form.
#[must_use]
pub fn extract_links(content: &str) -> Vec<ExtractedLink> {
    let fragment = Html::parse_fragment(content);

    let mut candidates: Vec<(String, ExtractMode)> = Vec::new();
    for element in fragment.select(&ANCHOR) {
        if let Some(href) = element.value().attr("href") {
            if href.starts_with("http://") || href.starts_with("https://") {
                candidates.push((href.to_owned(), ExtractMode::Anchor));
            }
        }
    }
    let text: String = fragment.root_element().text().collect();
    for m in URL_PATTERN.find_iter(&text) {
        candidates.push((
            trim_trailing_punctuation(m.as_str()).to_owned(),
            ExtractMode::Text,
        ));
    }

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for (candidate, mode) in candidates {
        let Ok(url) = Url::parse(&candidate) else {
            continue;
        };
        let Some((site, resource_id)) = SITES.resolve(&url) else {
            continue;
        };
        if seen.insert((site, resource_id.clone())) {
            links.push(ExtractedLink {
                site,
                resource_id,
                mode,
            });
        }
    }
    links
}

/// Sentence punctuation glued onto a pasted URL is not part of it.
fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']'])
}
