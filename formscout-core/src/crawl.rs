use colored::Colorize;
use formscout_scanner::{CrawlConfig, Crawler, HttpDriver, LoginBootstrap, Page};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use url::{Position, Url};

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub config: CrawlConfig,
    pub login: Option<LoginBootstrap>,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Pages with forms found on one crawl target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub pages: Vec<Page>,
}

impl TargetResult {
    pub fn form_count(&self) -> usize {
        self.pages.iter().map(Page::form_count).sum()
    }

    pub fn login_form_count(&self) -> usize {
        self.pages.iter().map(|p| p.login_forms.len()).sum()
    }

    pub fn fuzzable_field_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.forms)
            .map(|f| f.fuzzable_fields().count())
            .sum()
    }
}

/// Path, query and fragment of a URL; the URL itself if it does not parse.
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = &u[Position::BeforePath..];
            if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Crawl every target in turn, each with its own driver and session. A target that
/// cannot be crawled is reported through `progress_callback` and skipped.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<Vec<TargetResult>, String> {
    let CrawlOptions {
        urls,
        config,
        login,
        show_progress_bars,
    } = options;

    if urls.is_empty() {
        return Err("No targets to crawl".to_string());
    }

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let visited_total = Arc::new(AtomicUsize::new(0));
    let mut all_results = Vec::new();

    for (idx, url_str) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling host {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        let driver = match HttpDriver::new(&config) {
            Ok(driver) => driver,
            Err(e) => {
                report_failure(&progress_callback, url_str, &e.to_string());
                continue;
            }
        };

        let pb_clone = progress_bar.clone();
        let count_clone = visited_total.clone();
        let internal_progress: formscout_scanner::ProgressCallback =
            Arc::new(move |_visited: usize, url: String| {
                let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref pb) = pb_clone {
                    pb.set_message(format!(
                        "Crawling... {} URLs visited ({})",
                        count,
                        extract_url_path(&url)
                    ));
                }
            });

        let crawler = Crawler::new(driver, config.clone())
            .map(|crawler| crawler.with_progress_callback(internal_progress));
        let mut crawler = match crawler {
            Ok(crawler) => crawler,
            Err(e) => {
                report_failure(&progress_callback, url_str, &e.to_string());
                continue;
            }
        };

        match crawler.crawl(url_str, login.as_ref()).await {
            Ok(pages) => {
                info!("{}: {} pages with forms", url_str, pages.len());
                all_results.push(TargetResult {
                    target: url_str.clone(),
                    pages,
                });
            }
            Err(e) => report_failure(&progress_callback, url_str, &e.to_string()),
        }
    }

    if let Some(ref pb) = progress_bar {
        let total = visited_total.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} URLs visited", total));
    }

    Ok(all_results)
}

fn report_failure(callback: &Option<CrawlProgressCallback>, url: &str, error: &str) {
    warn!("Failed to crawl {}: {}", url, error);
    if let Some(callback) = callback {
        callback(format!("[!]  Failed to crawl {}: {}", url, error));
    }
}

/// Human-readable summary: totals, then every page's forms grouped by target.
/// Fuzzable inputs are marked with `*`.
pub fn generate_crawl_report(results: &[TargetResult]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Targets crawled: {}\n", results.len()));

    let total_pages: usize = results.iter().map(|r| r.pages.len()).sum();
    report.push_str(&format!("  Pages with forms: {}\n", total_pages));

    let total_forms: usize = results.iter().map(TargetResult::form_count).sum();
    report.push_str(&format!("  Total forms found: {}\n", total_forms));

    let total_logins: usize = results.iter().map(TargetResult::login_form_count).sum();
    report.push_str(&format!("  Login forms: {}\n", total_logins));

    let total_fuzzable: usize = results.iter().map(TargetResult::fuzzable_field_count).sum();
    report.push_str(&format!("  Fuzzable fields: {}\n", total_fuzzable));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for result in results {
        report.push_str(&format!("## {}\n", result.target.bold()));
        if result.pages.is_empty() {
            report.push_str(&format!("  {}\n\n", "no forms found".dimmed()));
            continue;
        }
        report.push_str(&format!("  {} pages with forms\n\n", result.pages.len()));

        for page in &result.pages {
            let marker = if page.has_login_form() {
                format!(" {}", "[login]".yellow())
            } else {
                String::new()
            };
            report.push_str(&format!("  {}{}\n", extract_url_path(&page.path), marker));

            for form in &page.forms {
                let method = match form.method {
                    formscout_scanner::Method::Get => form.method.as_str().green(),
                    formscout_scanner::Method::Post => form.method.as_str().cyan(),
                };
                report.push_str(&format!("    {} {}\n", method, form.action));

                let inputs: Vec<String> = form
                    .inputs
                    .iter()
                    .map(|(name, value)| {
                        if value.is_fuzzable() {
                            format!("{}*", name)
                        } else {
                            name.clone()
                        }
                    })
                    .collect();
                report.push_str(&format!("      {}\n", inputs.join(", ").dimmed()));
            }
        }
        report.push('\n');
    }

    report
}
