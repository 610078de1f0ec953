use crate::config::CrawlConfig;
use crate::driver::BrowserDriver;
use crate::error::{NavigationError, Result, ScanError};
use crate::extract::{FormExtractor, document_base, selector};
use crate::normalize::{is_route_fragment, normalize, same_document};
use crate::page::Page;
use crate::scope::{ScopeDecision, ScopeGuard, is_login_url};
use crate::session::{CachedPage, CrawlSession};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Called with the running visited count and the URL about to be navigated.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

const IGNORED_LINK_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Credentials submitted before the crawl starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginBootstrap {
    /// Login page, relative to the start URL or absolute.
    pub path: String,
    /// Input name to value.
    pub fields: BTreeMap<String, String>,
}

impl LoginBootstrap {
    pub fn new(path: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.trim().is_empty() || self.fields.is_empty()
    }
}

struct WorkItem {
    url: Url,
    depth: usize,
}

/// Depth-first crawler over a single browser driver. Navigation is strictly
/// sequential; the work stack replaces recursion.
pub struct Crawler<D: BrowserDriver> {
    driver: D,
    config: CrawlConfig,
    extractor: FormExtractor,
    link_selector: Selector,
    base_selector: Selector,
    progress_callback: Option<ProgressCallback>,
}

impl<D: BrowserDriver> Crawler<D> {
    pub fn new(driver: D, config: CrawlConfig) -> Result<Self> {
        Ok(Self {
            extractor: FormExtractor::new(config.input_types.clone())?,
            link_selector: selector("a[href]")?,
            base_selector: selector("base[href]")?,
            driver,
            config,
            progress_callback: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Crawl from `start_url` and return every page that still carries forms after
    /// deduplication. Only an unusable start URL is an error; everything that goes
    /// wrong on a branch is logged and the branch dropped.
    pub async fn crawl(
        &mut self,
        start_url: &str,
        login: Option<&LoginBootstrap>,
    ) -> Result<Vec<Page>> {
        let mut session = self.crawl_session(start_url, login).await?;
        let pages = session.extract_pages(&self.extractor);
        info!(
            "Extracted {} pages with forms from {} rendered pages",
            pages.len(),
            session.cached_count()
        );
        self.driver.close().await;
        Ok(pages)
    }

    /// Traversal only: the returned session holds the visited set and the rendered
    /// page cache, ready for extraction.
    pub async fn crawl_session(
        &mut self,
        start_url: &str,
        login: Option<&LoginBootstrap>,
    ) -> Result<CrawlSession> {
        let start = Url::parse(start_url.trim())
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let scope = ScopeGuard::new(&start, &self.config)?;

        info!(
            "Starting crawl of {} (max depth {}, max pages {})",
            start, self.config.max_depth, self.config.max_pages
        );

        if let Some(login) = login.filter(|l| !l.is_empty()) {
            self.bootstrap_login(&start, login).await;
        }

        let mut session = CrawlSession::new();
        let mut stack = vec![WorkItem {
            url: start.clone(),
            depth: 0,
        }];

        while let Some(item) = stack.pop() {
            match scope.check(&item.url, &session.visited, item.depth) {
                ScopeDecision::Allowed => {}
                ScopeDecision::PageBudgetExhausted => {
                    info!("Page budget of {} reached", self.config.max_pages);
                    break;
                }
                decision => {
                    debug!("Skipping {} ({:?})", item.url, decision);
                    continue;
                }
            }

            let key = normalize(&item.url);
            session.visited.insert(key.clone());
            if let Some(ref callback) = self.progress_callback {
                callback(session.visited.len(), item.url.to_string());
            }

            match self.visit(&item, &key, &start, &scope, &mut session).await {
                Ok(links) => {
                    debug!("{} new links on {}", links.len(), item.url);
                    // reversed so the first link on the page is explored first
                    stack.extend(links.into_iter().rev().map(|url| WorkItem {
                        url,
                        depth: item.depth + 1,
                    }));
                }
                Err(e) => warn!("Crawl error for {}: {}", item.url, e),
            }
        }

        info!(
            "Crawl complete. Visited {} URLs, rendered {} pages",
            session.visited.len(),
            session.cached_count()
        );
        Ok(session)
    }

    async fn bootstrap_login(&mut self, start: &Url, login: &LoginBootstrap) {
        let login_url = match start.join(login.path.trim()) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid login path {}: {}", login.path, e);
                return;
            }
        };

        info!("Logging in at {}", login_url);
        let timeout = self.config.navigation_timeout();
        if let Err(e) = bounded(&login_url, timeout, self.driver.navigate(&login_url, timeout)).await {
            warn!("Login failed: {}", e);
            return;
        }

        let settle = self.config.login_settle();
        match tokio::time::timeout(timeout + settle, self.driver.fill_login(&login.fields, settle)).await {
            Ok(Ok(())) => info!("Login form submitted at {}", login_url),
            Ok(Err(e)) => warn!("Login failed: {}", e),
            Err(_) => warn!("Login submission at {} timed out", login_url),
        }
    }

    /// Navigate one admitted URL, cache what it rendered and return the links to
    /// schedule. An empty list means the branch ends here.
    async fn visit(
        &mut self,
        item: &WorkItem,
        key: &Url,
        start: &Url,
        scope: &ScopeGuard,
        session: &mut CrawlSession,
    ) -> std::result::Result<Vec<Url>, NavigationError> {
        let timeout = self.config.navigation_timeout();
        let route = item.url.fragment().filter(|f| is_route_fragment(f));
        let on_document = self
            .driver
            .current_url()
            .is_some_and(|current| same_document(&current, &item.url));

        let navigation = match route {
            Some(fragment) if on_document => {
                debug!("Hash navigation to #{}", fragment);
                let settle = self.config.hash_settle();
                bounded(
                    &item.url,
                    timeout + settle,
                    self.driver.navigate_fragment(fragment, settle),
                )
                .await?
            }
            _ => {
                let navigation =
                    bounded(&item.url, timeout, self.driver.navigate(&item.url, timeout)).await?;
                if !same_document(&navigation.final_url, &item.url)
                    && self.redirect_aborts(&item.url, &navigation.final_url, key, session)
                {
                    return Ok(Vec::new());
                }
                navigation
            }
        };

        if !(200..300).contains(&navigation.status) {
            warn!("HTTP {} for {}", navigation.status, item.url);
            return Ok(Vec::new());
        }
        if !scope.is_same_host(&navigation.final_url) {
            info!("External redirect: {} -> {}", item.url, navigation.final_url);
            return Ok(Vec::new());
        }

        let links = if item.depth < self.config.max_depth {
            self.discover_links(&navigation.html, &navigation.final_url, start, scope, session)
        } else {
            Vec::new()
        };

        session.cache_page(
            key.clone(),
            CachedPage {
                discovered_url: item.url.clone(),
                document_url: navigation.final_url,
                html: navigation.html,
                headers: navigation.headers,
            },
        );
        Ok(links)
    }

    fn redirect_aborts(&self, requested: &Url, landed: &Url, key: &Url, session: &CrawlSession) -> bool {
        if is_login_url(landed) {
            info!("Redirected to login page: {} -> {}", requested, landed);
            return true;
        }
        let landed_key = normalize(landed);
        if landed_key != *key && session.visited.contains(&landed_key) {
            debug!("Redirected to visited page: {} -> {}", requested, landed);
            return true;
        }
        false
    }

    fn discover_links(
        &self,
        html: &str,
        page_url: &Url,
        start: &Url,
        scope: &ScopeGuard,
        session: &CrawlSession,
    ) -> Vec<Url> {
        let document = Html::parse_document(html);
        let base = document_base(&document, &self.base_selector, page_url);

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for element in document.select(&self.link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(href, &base, start) else {
                continue;
            };
            match scope.prefilter(&url, &session.visited) {
                ScopeDecision::Allowed => {}
                decision => {
                    debug!("  -> {} skipped ({:?})", url, decision);
                    continue;
                }
            }
            if seen.insert(normalize(&url)) {
                debug!("Found link: {}", url);
                links.push(url);
            }
        }
        links
    }
}

/// Resolve an anchor's `href`. Hash routes (`#/…`, `#!/…`) attach to the start URL;
/// other in-page anchors and non-navigational schemes yield nothing.
pub fn resolve_link(href: &str, base: &Url, start: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if IGNORED_LINK_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }

    if let Some(fragment) = href.strip_prefix('#') {
        if !is_route_fragment(fragment) {
            return None;
        }
        let mut url = start.clone();
        url.set_fragment(Some(fragment));
        return Some(url);
    }

    let mut url = base.join(href).ok()?;
    if url.fragment().is_some_and(|f| !is_route_fragment(f)) {
        url.set_fragment(None);
    }
    Some(url)
}

async fn bounded<T, F>(url: &Url, timeout: Duration, operation: F) -> std::result::Result<T, NavigationError>
where
    F: Future<Output = std::result::Result<T, NavigationError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(NavigationError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}
