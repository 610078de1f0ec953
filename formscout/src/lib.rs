// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    build_crawl_config, build_login_from_args, expand_path, load_urls_from_file,
    load_urls_from_source, parse_url_line,
};

// Re-export crawl functionality from formscout-core
pub use formscout_core::crawl::{
    CrawlOptions, CrawlProgressCallback, TargetResult, execute_crawl, extract_url_path,
    generate_crawl_report,
};
