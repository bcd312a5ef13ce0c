use url::Url;

use crate::links::traits::{Site, SiteTag};

pub struct StreetVoice;

impl Site for StreetVoice {
    fn tag(&self) -> SiteTag {
        SiteTag::StreetVoice
    }

    fn matches(&self, url: &Url) -> bool {
        matches!(url.host_str(), Some("streetvoice.com" | "www.streetvoice.com"))
    }

    fn resource_id(&self, url: &Url) -> Option<String> {
        // Song pages live at `/{account}/songs/{number}/`. The whole trimmed
        // path is the id; anything other than three segments is a profile,
        // album, or site page.
        let trimmed = url.path().trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        let well_formed = segments.len() == 3 && segments.iter().all(|s| !s.is_empty());
        well_formed.then(|| trimmed.to_owned())
    }

    fn general_url(&self, id: &str) -> String {
        format!("https://streetvoice.com/{id}")
    }

    fn embedded_url(&self, id: &str) -> String {
        format!("https://streetvoice.com/music/embed/?id={}", between(id, "songs/", "/"))
    }
}

/// The substring after the first `from` and before the last `to`. Either
/// bound is ignored when absent.
fn between<'a>(subject: &'a str, from: &str, to: &str) -> &'a str {
    let after = subject
        .find(from)
        .map_or(subject, |i| &subject[i + from.len()..]);
    after.rfind(to).map_or(after, |j| &after[..j])
}
