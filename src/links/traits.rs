use serde::{Deserialize, Serialize};
use url::Url;

/// Music sites whose links are worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteTag {
    Youtube,
    Spotify,
    StreetVoice,
}

impl SiteTag {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Spotify => "spotify",
            Self::StreetVoice => "street_voice",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(Self::Youtube),
            "spotify" => Some(Self::Spotify),
            "street_voice" => Some(Self::StreetVoice),
            _ => None,
        }
    }
}

/// Trait for site-specific link matchers.
///
/// A matcher owns a domain and knows how to reduce that site's URL shapes to
/// a stable resource id, and how to rebuild presentation URLs from a stored
/// id.
pub trait Site: Send + Sync {
    /// Which site this matcher recognizes.
    fn tag(&self) -> SiteTag;

    /// Whether the URL's host belongs to this site.
    fn matches(&self, url: &Url) -> bool;

    /// The stable resource id, if this URL points at playable content.
    fn resource_id(&self, url: &Url) -> Option<String>;

    /// Canonical listening URL for a stored id.
    fn general_url(&self, id: &str) -> String;

    /// Embeddable player URL for a stored id.
    fn embedded_url(&self, id: &str) -> String;
}
