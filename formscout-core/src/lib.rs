pub mod config;
pub mod crawl;
pub mod report;

use colored::Colorize;

pub use formscout_scanner::{CrawlConfig, LoginBootstrap, Page};

const BANNER: &str = r#"
  ┏━╸┏━┓┏━┓┏┳┓┏━┓┏━╸┏━┓╻ ╻╺┳╸
  ┣╸ ┃ ┃┣┳┛┃┃┃┗━┓┃  ┃ ┃┃ ┃ ┃
  ╹  ┗━┛╹┗╸╹ ╹┗━┛┗━╸┗━┛┗━┛ ╹
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_white(),
        "form-centric attack surface discovery".dimmed()
    );
    println!("  {}\n", "For authorized security testing only.".yellow());
}
