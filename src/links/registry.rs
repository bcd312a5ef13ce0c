use url::Url;

use crate::links::spotify::Spotify;
use crate::links::street_voice::StreetVoice;
use crate::links::traits::{Site, SiteTag};
use crate::links::youtube::YouTube;

/// Ordered collection of site matchers. Registration order is precedence:
/// the first matcher whose host gate passes claims the URL, even when it
/// then fails to extract an id.
pub struct SiteRegistry {
    sites: Vec<Box<dyn Site>>,
}

impl SiteRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { sites: Vec::new() }
    }

    /// All supported sites, in their fixed precedence order.
    #[must_use]
    pub fn with_known_sites() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(YouTube));
        registry.register(Box::new(Spotify));
        registry.register(Box::new(StreetVoice));
        registry
    }

    pub fn register(&mut self, site: Box<dyn Site>) {
        self.sites.push(site);
    }

    /// The first registered site whose host gate passes.
    #[must_use]
    pub fn find(&self, url: &Url) -> Option<&dyn Site> {
        self.sites
            .iter()
            .find(|site| site.matches(url))
            .map(Box::as_ref)
    }

    /// The matcher registered for a stored tag.
    #[must_use]
    pub fn site(&self, tag: SiteTag) -> Option<&dyn Site> {
        self.sites
            .iter()
            .find(|site| site.tag() == tag)
            .map(Box::as_ref)
    }

    /// Reduce a URL to `(site, resource id)`, if any site claims it and can
    /// extract an id.
    #[must_use]
    pub fn resolve(&self, url: &Url) -> Option<(SiteTag, String)> {
        let site = self.find(url)?;
        let id = site.resource_id(url)?;
        Some((site.tag(), id))
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::with_known_sites()
    }
}
