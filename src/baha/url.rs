use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ScrapeError;

/// Immutable descriptor for a forum page address.
///
/// Wraps a parsed absolute URL and answers the questions the page types and
/// continuations ask of it. Derivation (`with_page`, `join`) always returns a
/// new descriptor; nothing here performs I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageUrl {
    inner: Url,
}

impl PageUrl {
    /// Parse an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::MalformedUrl` for relative URLs, non-http
    /// schemes, or anything the `url` crate rejects.
    pub fn parse(raw: &str) -> Result<Self, ScrapeError> {
        let inner = Url::parse(raw).map_err(|e| ScrapeError::MalformedUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;

        if !matches!(inner.scheme(), "http" | "https") {
            return Err(ScrapeError::MalformedUrl {
                url: raw.to_string(),
                message: format!("unsupported scheme '{}'", inner.scheme()),
            });
        }
        if inner.host_str().is_none() {
            return Err(ScrapeError::MalformedUrl {
                url: raw.to_string(),
                message: "missing host".to_string(),
            });
        }

        Ok(Self { inner })
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.inner.host_str().unwrap_or_default()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    #[must_use]
    pub fn has_query(&self, key: &str) -> bool {
        self.inner.query_pairs().any(|(k, _)| k == key)
    }

    /// Value of a query parameter, percent-decoded. First occurrence wins.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<String> {
        self.inner
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The `page` query parameter; pages are 1-based and an absent parameter
    /// means page 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.query("page")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    /// A copy of this descriptor pointing at a different page.
    ///
    /// Replaces the `page` parameter in place when present, appends it
    /// otherwise. Every other URL component, including the relative order of
    /// the remaining query parameters, is preserved.
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        let mut pairs: Vec<(String, String)> = self
            .inner
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let page_value = page.to_string();
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == "page") {
            existing.1 = page_value;
        } else {
            pairs.push(("page".to_string(), page_value));
        }

        let mut inner = self.inner.clone();
        inner
            .query_pairs_mut()
            .clear()
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        Self { inner }
    }

    /// Resolve an anchor href (possibly relative) against this page.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::MalformedUrl` when the href cannot be resolved.
    pub fn join(&self, href: &str) -> Result<Self, ScrapeError> {
        let inner = self.inner.join(href).map_err(|e| ScrapeError::MalformedUrl {
            url: href.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }
}

impl std::fmt::Display for PageUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PageUrl {
    type Error = ScrapeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PageUrl> for String {
    fn from(url: PageUrl) -> Self {
        url.inner.into()
    }
}
