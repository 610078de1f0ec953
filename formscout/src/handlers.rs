use anyhow::{Context, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use formscout_core::config::{build_login, load_crawl_config, load_input_types};
use formscout_core::report::{ReportFormat, render_report, save_report};
use formscout_scanner::{CrawlConfig, LoginBootstrap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

// Helper functions for crawl handler

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(&expand_path(hosts_file_path))
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file. Blank lines and `#` comments are skipped.
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an http(s) URL, adding `http://` if it has no scheme
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|url| url.host_str().is_some()) {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Config file (if any) with command-line overrides applied.
pub fn build_crawl_config(sub_matches: &ArgMatches) -> Result<CrawlConfig, String> {
    let config_path = sub_matches.get_one::<PathBuf>("config").map(|p| expand_path(p));
    let mut config = load_crawl_config(config_path.as_deref())?;

    if let Some(path) = sub_matches.get_one::<PathBuf>("input-types") {
        config.input_types = load_input_types(&expand_path(path))?;
    }
    if let Some(depth) = sub_matches.get_one::<usize>("depth") {
        config = config.with_max_depth(*depth);
    }
    if let Some(pages) = sub_matches.get_one::<usize>("max-pages") {
        config = config.with_max_pages(*pages);
    }
    if let Some(timeout) = sub_matches.get_one::<u64>("timeout") {
        config = config.with_navigation_timeout_ms(*timeout);
    }
    if sub_matches.get_flag("include-subdomains") {
        config = config.with_include_subdomains(true);
    }
    Ok(config)
}

pub fn build_login_from_args(sub_matches: &ArgMatches) -> Result<Option<LoginBootstrap>, String> {
    let pairs: Vec<String> = sub_matches
        .get_many::<String>("login")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let login_file = sub_matches.get_one::<PathBuf>("login-file").map(|p| expand_path(p));
    build_login(
        sub_matches.get_one::<String>("login-path").map(String::as_str),
        &pairs,
        login_file.as_deref(),
    )
}

// Re-export crawl types and functions from formscout-core
pub use formscout_core::crawl::{
    CrawlOptions, CrawlProgressCallback, TargetResult, execute_crawl, extract_url_path,
    generate_crawl_report,
};

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let urls = load_urls_from_source(url, hosts_file).map_err(|e| anyhow!(e))?;
    let config = build_crawl_config(sub_matches).map_err(|e| anyhow!(e))?;
    let login = build_login_from_args(sub_matches).map_err(|e| anyhow!(e))?;

    let format_name = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let format = ReportFormat::from_str(format_name)
        .ok_or_else(|| anyhow!("Unsupported report format: {}", format_name))?;
    let output = sub_matches.get_one::<PathBuf>("output").map(|p| expand_path(p));

    if !quiet {
        println!("\n{} Crawling {} host(s)", "→".blue(), urls.len());
        println!("Max depth: {}", config.max_depth);
        println!("Max pages: {}", config.max_pages);
        println!("Navigation timeout: {}ms", config.navigation_timeout_ms);
        if let Some(ref login) = login {
            println!("Login: {} ({} fields)", login.path, login.fields.len());
        }
        println!();
    }

    let options = CrawlOptions {
        urls,
        config,
        login,
        show_progress_bars: !quiet,
    };

    let progress_callback: CrawlProgressCallback = Arc::new(|msg: String| {
        println!("{}", msg);
    });

    let all_results = execute_crawl(options, Some(progress_callback))
        .await
        .map_err(|e| anyhow!("Crawl failed: {}", e))?;

    if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    let report = render_report(format, all_results).map_err(|e| anyhow!(e))?;
    match output {
        Some(path) => {
            save_report(&report, &path)
                .with_context(|| format!("Failed to save report to {}", path.display()))?;
            println!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}
