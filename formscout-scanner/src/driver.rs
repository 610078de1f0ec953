//! The rendering seam between the crawl and whatever loads pages.
//!
//! `BrowserDriver` is the capability the crawl needs from a browser: load a URL and
//! report where it ended up, run a script in the page, and say which document is
//! currently loaded. Hash-route navigation and login filling are provided on top of
//! script evaluation; drivers without a script engine override them.
//!
//! `HttpDriver` is the built-in implementation. It fetches documents with reqwest
//! and never requests subresources, so resource blocking reduces to reading only
//! document bodies, and only up to `MAX_DOCUMENT_BYTES`.

use crate::config::CrawlConfig;
use crate::error::{NavigationError, Result};
use crate::extract::{document_base, resolve_action, selector};
use crate::normalize::{same_document, without_fragment};
use crate::page::Method;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use scraper::{ElementRef, Html};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Largest document body `HttpDriver` will read.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Outcome of loading a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub final_url: Url,
    pub status: u16,
    pub html: String,
    /// Lower-cased header names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
}

pub trait BrowserDriver: Send {
    /// Load `url`, following redirects, and return the rendered document.
    fn navigate(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> impl Future<Output = std::result::Result<Navigation, NavigationError>> + Send;

    fn evaluate_script(
        &mut self,
        script: &str,
    ) -> impl Future<Output = std::result::Result<Value, NavigationError>> + Send;

    /// URL of the currently loaded document, fragment included.
    fn current_url(&self) -> Option<Url>;

    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Client-side route change: only the fragment of the loaded document changes
    /// and the DOM is re-read after `settle`.
    fn navigate_fragment(
        &mut self,
        fragment: &str,
        settle: Duration,
    ) -> impl Future<Output = std::result::Result<Navigation, NavigationError>> + Send {
        async move {
            let mut final_url = self.current_url().ok_or(NavigationError::NoDocument)?;
            let script = format!(
                "window.location.hash = {}",
                Value::String(fragment.to_string())
            );
            self.evaluate_script(&script).await?;
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            let html = self
                .evaluate_script("document.documentElement.outerHTML")
                .await?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| NavigationError::Script("outerHTML is not a string".into()))?;
            final_url.set_fragment(Some(fragment));
            Ok(Navigation {
                final_url,
                status: 200,
                html,
                headers: BTreeMap::new(),
            })
        }
    }

    /// Fill the named inputs of the loaded page and submit. Fields that cannot be
    /// found are skipped.
    fn fill_login(
        &mut self,
        fields: &BTreeMap<String, String>,
        settle: Duration,
    ) -> impl Future<Output = std::result::Result<(), NavigationError>> + Send {
        async move {
            for (name, value) in fields {
                let css = format!("input[name=\"{}\"]", name.replace('"', "\\\""));
                let script = format!(
                    "(() => {{ const el = document.querySelector({}); \
                     if (!el) return false; el.value = {}; \
                     el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()",
                    Value::String(css),
                    Value::String(value.clone())
                );
                match self.evaluate_script(&script).await {
                    Ok(Value::Bool(true)) => debug!("Filled login field {}", name),
                    Ok(_) => warn!("Login field {} not found", name),
                    Err(e) => warn!("Could not fill login field {}: {}", name, e),
                }
            }

            let submitted = self
                .evaluate_script(
                    "(() => { const b = document.querySelector('button[type=\"submit\"], \
                     input[type=\"submit\"]'); if (b) { b.click(); return true; } \
                     const f = document.querySelector('form'); \
                     if (f) { f.submit(); return true; } return false; })()",
                )
                .await?;
            if submitted != Value::Bool(true) {
                let at = self.current_url().map(|u| u.to_string()).unwrap_or_default();
                return Err(NavigationError::NoLoginForm(at));
            }
            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            Ok(())
        }
    }
}

/// Script-less driver backed by reqwest. Cookies persist for the driver's lifetime,
/// so a login performed through `fill_login` carries over to the crawl.
pub struct HttpDriver {
    client: Client,
    timeout: Duration,
    current: Option<Url>,
    html: String,
    headers: BTreeMap<String, String>,
}

impl HttpDriver {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let timeout = config.navigation_timeout();
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            timeout,
            current: None,
            html: String::new(),
            headers: BTreeMap::new(),
        })
    }

    async fn load(
        &mut self,
        request: RequestBuilder,
        requested: &Url,
        timeout: Duration,
    ) -> std::result::Result<Navigation, NavigationError> {
        let mut response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error(e, requested, timeout))?;

        let mut final_url = response.url().clone();
        if same_document(&final_url, requested) {
            final_url = requested.clone();
        }
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        if let Some(content_type) = headers.get("content-type")
            && is_blocked_content_type(content_type)
        {
            return Err(NavigationError::Blocked {
                url: final_url.to_string(),
                content_type: content_type.clone(),
            });
        }

        let too_large = || NavigationError::TooLarge {
            url: final_url.to_string(),
            limit: MAX_DOCUMENT_BYTES,
        };
        if response
            .content_length()
            .is_some_and(|len| len > MAX_DOCUMENT_BYTES as u64)
        {
            return Err(too_large());
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| request_error(e, requested, timeout))?
        {
            if body.len() + chunk.len() > MAX_DOCUMENT_BYTES {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        let html = String::from_utf8_lossy(&body).into_owned();

        self.current = Some(final_url.clone());
        self.html = html.clone();
        self.headers = headers.clone();

        Ok(Navigation {
            final_url,
            status,
            html,
            headers,
        })
    }
}

impl BrowserDriver for HttpDriver {
    async fn navigate(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<Navigation, NavigationError> {
        debug!("Fetching {}", url);
        let request = self.client.get(without_fragment(url));
        self.load(request, url, timeout).await
    }

    async fn evaluate_script(&mut self, _script: &str) -> std::result::Result<Value, NavigationError> {
        Err(NavigationError::ScriptUnsupported)
    }

    fn current_url(&self) -> Option<Url> {
        self.current.clone()
    }

    async fn close(&mut self) {
        self.current = None;
        self.html.clear();
        self.headers.clear();
    }

    /// Without a script engine the route change cannot re-render anything; the
    /// loaded document is re-read under the new fragment.
    async fn navigate_fragment(
        &mut self,
        fragment: &str,
        _settle: Duration,
    ) -> std::result::Result<Navigation, NavigationError> {
        let mut final_url = self.current.clone().ok_or(NavigationError::NoDocument)?;
        final_url.set_fragment(Some(fragment));
        self.current = Some(final_url.clone());
        Ok(Navigation {
            final_url,
            status: 200,
            html: self.html.clone(),
            headers: self.headers.clone(),
        })
    }

    /// Submits the page's login form directly, keeping its hidden fields.
    async fn fill_login(
        &mut self,
        fields: &BTreeMap<String, String>,
        _settle: Duration,
    ) -> std::result::Result<(), NavigationError> {
        let page_url = self.current.clone().ok_or(NavigationError::NoDocument)?;
        let submission = login_submission(&self.html, &page_url, fields)
            .ok_or_else(|| NavigationError::NoLoginForm(page_url.to_string()))?;

        debug!(
            "Submitting login form {} {} ({} fields)",
            submission.method,
            submission.action,
            submission.params.len()
        );
        let request = match submission.method {
            Method::Get => self.client.get(submission.action.clone()).query(&submission.params),
            Method::Post => self.client.post(submission.action.clone()).form(&submission.params),
        };
        let navigation = self.load(request, &submission.action, self.timeout).await?;
        debug!("Login response {} from {}", navigation.status, navigation.final_url);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoginSubmission {
    action: Url,
    method: Method,
    params: Vec<(String, String)>,
}

/// Pick the login form (first with a password input, else first naming one of
/// `fields`) and build its submission: the form's own values, overlaid by `fields`.
fn login_submission(
    html: &str,
    page_url: &Url,
    fields: &BTreeMap<String, String>,
) -> Option<LoginSubmission> {
    let document = Html::parse_document(html);
    let form_selector = selector("form").ok()?;
    let field_selector = selector("input, textarea").ok()?;
    let base_selector = selector("base[href]").ok()?;
    let base = document_base(&document, &base_selector, page_url);

    let forms: Vec<ElementRef> = document.select(&form_selector).collect();
    let form = forms
        .iter()
        .find(|form| {
            form.select(&field_selector)
                .any(|field| input_type(&field) == "password")
        })
        .or_else(|| {
            forms.iter().find(|form| {
                form.select(&field_selector).any(|field| {
                    field
                        .value()
                        .attr("name")
                        .is_some_and(|name| fields.contains_key(name))
                })
            })
        })?;

    let action = resolve_action(form.value().attr("action"), page_url, &base)?;
    let method = Method::from_attr(form.value().attr("method"));

    let mut params = Vec::new();
    let mut submit_included = false;
    for field in form.select(&field_selector) {
        let element = field.value();
        let Some(name) = element.attr("name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        if element.attr("disabled").is_some() || fields.contains_key(name) {
            continue;
        }
        let kind = input_type(&field);
        match kind.as_str() {
            "button" | "reset" => continue,
            "submit" | "image" if submit_included => continue,
            "submit" | "image" => submit_included = true,
            "checkbox" | "radio" if element.attr("checked").is_none() => continue,
            _ => {}
        }
        let value = if element.name() == "textarea" {
            field.text().collect()
        } else {
            element.attr("value").unwrap_or("").to_string()
        };
        params.push((name.to_string(), value));
    }
    params.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));

    Some(LoginSubmission {
        action,
        method,
        params,
    })
}

fn input_type(field: &ElementRef) -> String {
    field
        .value()
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "text".to_string())
}

fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map.iter() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match headers.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                headers.insert(name.as_str().to_string(), value);
            }
        }
    }
    headers
}

/// Content types a crawl never needs the body of: anything that is not a document.
pub fn is_blocked_content_type(content_type: &str) -> bool {
    let lower = content_type.trim().to_ascii_lowercase();
    let essence = lower.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        return false;
    }
    let document = matches!(essence, "text/html" | "application/xhtml+xml")
        || (essence.starts_with("text/") && essence != "text/css");
    !document
}

fn request_error(error: reqwest::Error, url: &Url, timeout: Duration) -> NavigationError {
    if error.is_timeout() {
        NavigationError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        NavigationError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    fn driver() -> HttpDriver {
        HttpDriver::new(&CrawlConfig::default()).unwrap()
    }

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(body)
    }

    #[tokio::test]
    async fn test_navigate_reports_final_url_and_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/new", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                html_response("<html><body>moved</body></html>")
                    .insert_header("x-frame-options", "DENY"),
            )
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/old", mock_server.uri())).unwrap();
        let navigation = driver.navigate(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(navigation.status, 200);
        assert_eq!(navigation.final_url.path(), "/new");
        assert!(navigation.html.contains("moved"));
        assert_eq!(navigation.headers.get("x-frame-options").map(String::as_str), Some("DENY"));
        assert_eq!(driver.current_url(), Some(navigation.final_url));
    }

    #[tokio::test]
    async fn test_blocked_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8; 16]),
            )
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/logo", mock_server.uri())).unwrap();
        let result = driver.navigate(&url, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(NavigationError::Blocked { .. })));
        assert!(driver.current_url().is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(html_response("<p>late</p>").set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
        let result = driver.navigate(&url, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(NavigationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fragment_navigation_rereads_document() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .respond_with(html_response("<div id=app></div>"))
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/app", mock_server.uri())).unwrap();
        driver.navigate(&url, Duration::from_secs(5)).await.unwrap();
        let navigation = driver
            .navigate_fragment("/settings", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(navigation.final_url.fragment(), Some("/settings"));
        assert_eq!(navigation.html, "<div id=app></div>");
    }

    #[tokio::test]
    async fn test_fill_login_posts_form_with_hidden_fields() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(html_response(
                r#"<form action="/session" method="post">
                    <input type="hidden" name="csrf" value="tok123">
                    <input name="username"><input type="password" name="password">
                    <input type="submit" name="Login" value="Login">
                </form>"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(body_string_contains("csrf=tok123"))
            .and(body_string_contains("username=admin"))
            .and(body_string_contains("password=s3cret"))
            .and(body_string_contains("Login=Login"))
            .respond_with(html_response("<p>welcome</p>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/login", mock_server.uri())).unwrap();
        driver.navigate(&url, Duration::from_secs(5)).await.unwrap();

        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), "admin".to_string());
        fields.insert("password".to_string(), "s3cret".to_string());
        driver.fill_login(&fields, Duration::ZERO).await.unwrap();

        assert_eq!(driver.current_url().map(|u| u.path().to_string()), Some("/session".to_string()));
    }

    #[tokio::test]
    async fn test_fill_login_without_form() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_response("<p>nothing here</p>"))
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&mock_server.uri()).unwrap();
        driver.navigate(&url, Duration::from_secs(5)).await.unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("user".to_string(), "a".to_string());
        let result = driver.fill_login(&fields, Duration::ZERO).await;
        assert!(matches!(result, Err(NavigationError::NoLoginForm(_))));
    }

    #[test]
    fn test_blocked_content_types() {
        assert!(is_blocked_content_type("image/png"));
        assert!(is_blocked_content_type("text/css; charset=utf-8"));
        assert!(is_blocked_content_type("font/woff2"));
        assert!(is_blocked_content_type("video/mp4"));
        assert!(is_blocked_content_type("application/octet-stream"));
        assert!(is_blocked_content_type("application/pdf"));
        assert!(is_blocked_content_type("Application/ZIP"));
        assert!(!is_blocked_content_type("text/html; charset=utf-8"));
        assert!(!is_blocked_content_type("application/xhtml+xml"));
        assert!(!is_blocked_content_type("text/plain"));
        assert!(!is_blocked_content_type(""));
    }

    #[tokio::test]
    async fn test_binary_downloads_are_not_read() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(vec![0u8; 1024 * 1024]),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/report"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        for resource in ["/download", "/report"] {
            let url = Url::parse(&format!("{}{}", mock_server.uri(), resource)).unwrap();
            let result = driver.navigate(&url, Duration::from_secs(5)).await;
            assert!(
                matches!(result, Err(NavigationError::Blocked { .. })),
                "{resource} was read"
            );
        }
        assert!(driver.current_url().is_none());
    }

    #[tokio::test]
    async fn test_oversized_document_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(html_response(&"a".repeat(MAX_DOCUMENT_BYTES + 1)))
            .mount(&mock_server)
            .await;

        let mut driver = driver();
        let url = Url::parse(&format!("{}/huge", mock_server.uri())).unwrap();
        let result = driver.navigate(&url, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(NavigationError::TooLarge { .. })));
        assert!(driver.current_url().is_none());
    }
}
