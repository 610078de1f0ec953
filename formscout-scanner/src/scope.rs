use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::normalize::{host_key, normalize};
use crate::session::VisitedSet;
use url::{Position, Url};

pub const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "jpg", "jpeg", "png", "gif", "svg", "ico", "webp", "bmp", "woff",
    "woff2", "ttf", "otf", "eot", "pdf", "mp3", "mp4", "webm", "avi", "mov", "zip", "gz", "tar",
];

/// Path fragments that never lead to form-bearing content.
pub const NON_CONTENT_FRAGMENTS: &[&str] =
    &["/images/", "/css/", "/js/", "/modules/", "/pdf/", "/redirect"];

pub const LOGIN_MARKERS: &[&str] = &["login", "auth", "connexion"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    Allowed,
    UnsupportedScheme,
    ExternalHost,
    PageBudgetExhausted,
    TooDeep,
    RedirectLoop,
    StaticAsset,
    AlreadyVisited,
    /// A login-like URL after one was already visited.
    RepeatLogin,
}

impl ScopeDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ScopeDecision::Allowed)
    }
}

/// Decides which URLs belong to the crawl target.
#[derive(Debug, Clone)]
pub struct ScopeGuard {
    base_host: String,
    include_subdomains: bool,
    max_depth: usize,
    max_pages: usize,
}

impl ScopeGuard {
    pub fn new(start_url: &Url, config: &CrawlConfig) -> Result<Self> {
        let base_host = host_key(start_url)
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", start_url)))?;
        Ok(Self {
            base_host,
            include_subdomains: config.include_subdomains,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
        })
    }

    pub fn is_same_host(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return false;
        };
        host == self.base_host
            || (self.include_subdomains && host.ends_with(&format!(".{}", self.base_host)))
    }

    /// Full admission check run right before a URL is navigated.
    pub fn check(&self, candidate: &Url, visited: &VisitedSet, depth: usize) -> ScopeDecision {
        if visited.len() >= self.max_pages {
            return ScopeDecision::PageBudgetExhausted;
        }
        if depth > self.max_depth {
            return ScopeDecision::TooDeep;
        }
        self.prefilter(candidate, visited)
    }

    pub fn in_scope(&self, candidate: &Url, visited: &VisitedSet, depth: usize) -> bool {
        self.check(candidate, visited, depth).is_allowed()
    }

    /// The depth- and budget-independent part of `check`, cheap enough to run on
    /// every discovered link before it is scheduled.
    pub fn prefilter(&self, candidate: &Url, visited: &VisitedSet) -> ScopeDecision {
        if !matches!(candidate.scheme(), "http" | "https") {
            return ScopeDecision::UnsupportedScheme;
        }
        if !self.is_same_host(candidate) {
            return ScopeDecision::ExternalHost;
        }
        if is_redirect_loop(candidate.as_str()) {
            return ScopeDecision::RedirectLoop;
        }
        if is_static_asset(candidate) {
            return ScopeDecision::StaticAsset;
        }

        let key = normalize(candidate);
        if visited.contains(&key) {
            return ScopeDecision::AlreadyVisited;
        }
        if is_login_url(&key) && visited.has_login() {
            return ScopeDecision::RepeatLogin;
        }
        ScopeDecision::Allowed
    }
}

/// Case-insensitive match against the login/auth markers.
pub fn is_login_like(url: &str) -> bool {
    let lower = url.to_lowercase();
    LOGIN_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Login markers are matched against path, query and fragment only, so a host
/// name such as `auth.example.com` does not make every page login-like.
pub fn is_login_url(url: &Url) -> bool {
    is_login_like(&url[Position::BeforePath..])
}

/// A login URL whose `back=` target is itself a login URL.
pub fn is_redirect_loop(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("login?back=") && lower.matches("login").count() > 1
}

pub fn is_static_asset(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    if NON_CONTENT_FRAGMENTS.iter().any(|frag| path.contains(frag)) {
        return true;
    }
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => STATIC_EXTENSIONS.contains(&ext),
        None => false,
    }
}
