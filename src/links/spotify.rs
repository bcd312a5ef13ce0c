use url::Url;

use crate::links::traits::{Site, SiteTag};

pub struct Spotify;

impl Site for Spotify {
    fn tag(&self) -> SiteTag {
        SiteTag::Spotify
    }

    fn matches(&self, url: &Url) -> bool {
        url.host_str() == Some("open.spotify.com")
    }

    fn resource_id(&self, url: &Url) -> Option<String> {
        let path = url.path();
        // Plain track links are checked before the embed form so that
        // `/track/{id}` never falls through to the embed prefix.
        let rest = path
            .strip_prefix("/track/")
            .or_else(|| path.strip_prefix("/embed/track/"))?;
        let id = rest.trim_matches('/');
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(id.to_owned())
    }

    fn general_url(&self, id: &str) -> String {
        format!("https://open.spotify.com/track/{id}")
    }

    fn embedded_url(&self, id: &str) -> String {
        format!("https://open.spotify.com/embed/track/{id}")
    }
}
