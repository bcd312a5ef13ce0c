use url::Url;

use crate::links::traits::{Site, SiteTag};

const HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

/// Path prefixes that carry the video id as their first segment.
const ID_PREFIXES: &[&str] = &["/shorts/", "/live/", "/embed/"];

pub struct YouTube;

impl Site for YouTube {
    fn tag(&self) -> SiteTag {
        SiteTag::Youtube
    }

    fn matches(&self, url: &Url) -> bool {
        url.host_str().map_or(false, |host| HOSTS.contains(&host))
    }

    fn resource_id(&self, url: &Url) -> Option<String> {
        if url.host_str() == Some("youtu.be") {
            return first_segment(url.path());
        }
        if url.path() == "/watch" {
            return url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
                .filter(|id| !id.is_empty());
        }
        for prefix in ID_PREFIXES {
            if let Some(rest) = url.path().strip_prefix(prefix) {
                return first_segment(rest);
            }
        }
        None
    }

    fn general_url(&self, id: &str) -> String {
        format!("https://www.youtube.com/watch?v={id}")
    }

    fn embedded_url(&self, id: &str) -> String {
        format!("https://www.youtube.com/embed/{id}")
    }
}

fn first_segment(path: &str) -> Option<String> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(ToOwned::to_owned)
}
