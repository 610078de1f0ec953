//! State owned by a single crawl run.

use crate::dedup::FormDeduplicator;
use crate::extract::FormExtractor;
use crate::page::Page;
use crate::scope::is_login_url;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use url::Url;

/// Normalized URLs already navigated to. Only ever grows.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    urls: HashSet<Url>,
    order: Vec<Url>,
    login_seen: bool,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a normalized URL. Returns `false` if it was already present.
    pub fn insert(&mut self, normalized: Url) -> bool {
        if self.urls.contains(&normalized) {
            return false;
        }
        if is_login_url(&normalized) {
            self.login_seen = true;
        }
        self.order.push(normalized.clone());
        self.urls.insert(normalized);
        true
    }

    pub fn contains(&self, normalized: &Url) -> bool {
        self.urls.contains(normalized)
    }

    /// Whether a login-like URL has been visited in this run.
    pub fn has_login(&self) -> bool {
        self.login_seen
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Visited URLs in the order they were first recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.order.iter()
    }
}

/// Rendered content kept between traversal and extraction.
#[derive(Debug, Clone)]
pub struct CachedPage {
    /// URL as first discovered.
    pub discovered_url: Url,
    /// URL of the rendered document after redirects.
    pub document_url: Url,
    pub html: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct CrawlSession {
    pub visited: VisitedSet,
    page_cache: Vec<(Url, CachedPage)>,
    cache_index: HashMap<Url, usize>,
    pub signatures: FormDeduplicator,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache rendered HTML under its normalized URL. A second entry for the same
    /// key replaces the first.
    pub fn cache_page(&mut self, normalized: Url, page: CachedPage) {
        match self.cache_index.get(&normalized) {
            Some(&slot) => self.page_cache[slot].1 = page,
            None => {
                self.cache_index.insert(normalized.clone(), self.page_cache.len());
                self.page_cache.push((normalized, page));
            }
        }
    }

    pub fn cached_page(&self, normalized: &Url) -> Option<&CachedPage> {
        self.cache_index
            .get(normalized)
            .map(|&slot| &self.page_cache[slot].1)
    }

    pub fn cached_count(&self) -> usize {
        self.page_cache.len()
    }

    /// Run extraction over every cached page, in visit order, and keep the pages
    /// that still carry forms after deduplication.
    pub fn extract_pages(&mut self, extractor: &FormExtractor) -> Vec<Page> {
        let mut pages = Vec::new();
        for (key, cached) in &self.page_cache {
            let extracted = extractor.extract(
                &cached.html,
                &cached.document_url,
                &cached.headers,
                &mut self.signatures,
            );
            if extracted.forms.is_empty() {
                debug!("No new forms on {}", key);
                continue;
            }
            pages.push(Page {
                path: cached.discovered_url.to_string(),
                response_headers: cached.headers.clone(),
                forms: extracted.forms,
                login_forms: extracted.login_forms,
            });
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputTypes;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn cached(raw: &str, html: &str) -> CachedPage {
        CachedPage {
            discovered_url: url(raw),
            document_url: url(raw),
            html: html.to_string(),
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_visited_is_monotonic_and_tracks_login() {
        let mut visited = VisitedSet::new();
        assert!(visited.insert(url("http://example.com/")));
        assert!(!visited.has_login());
        assert!(!visited.insert(url("http://example.com/")));
        assert!(visited.insert(url("http://example.com/auth/login")));
        assert!(visited.has_login());
        assert_eq!(visited.len(), 2);
        assert_eq!(
            visited.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["http://example.com/", "http://example.com/auth/login"]
        );
    }

    #[test]
    fn test_extract_pages_drops_formless_and_duplicate_pages() {
        let mut session = CrawlSession::new();
        let form = r#"<form action="/search"><input name="q"></form>"#;
        session.cache_page(url("http://example.com/"), cached("http://example.com/", form));
        session.cache_page(url("http://example.com/a"), cached("http://example.com/a", form));
        session.cache_page(
            url("http://example.com/b"),
            cached("http://example.com/b", "<p>no forms</p>"),
        );

        let extractor = FormExtractor::new(InputTypes::default()).unwrap();
        let pages = session.extract_pages(&extractor);

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "http://example.com/");
        assert_eq!(session.signatures.len(), 1);
    }

    #[test]
    fn test_cache_replaces_same_key() {
        let mut session = CrawlSession::new();
        session.cache_page(url("http://example.com/"), cached("http://example.com/", "one"));
        session.cache_page(url("http://example.com/"), cached("http://example.com/?back=x", "two"));
        assert_eq!(session.cached_count(), 1);
        assert_eq!(
            session.cached_page(&url("http://example.com/")).map(|p| p.html.as_str()),
            Some("two")
        );
    }

    #[test]
    fn test_cache_lookup_keeps_visit_order() {
        let mut session = CrawlSession::new();
        for i in 0..500 {
            let raw = format!("http://example.com/p{i}");
            session.cache_page(url(&raw), cached(&raw, &format!("page {i}")));
        }
        session.cache_page(url("http://example.com/p7"), cached("http://example.com/p7", "again"));

        assert_eq!(session.cached_count(), 500);
        assert_eq!(
            session.cached_page(&url("http://example.com/p499")).map(|p| p.html.as_str()),
            Some("page 499")
        );
        assert_eq!(
            session.cached_page(&url("http://example.com/p7")).map(|p| p.html.as_str()),
            Some("again")
        );
        assert!(session.cached_page(&url("http://example.com/p500")).is_none());
        assert_eq!(
            session.page_cache.first().map(|(key, _)| key.as_str()),
            Some("http://example.com/p0")
        );
    }
}
