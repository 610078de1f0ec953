use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for a single crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Deepest recursion level that is still visited; the start URL is depth 0.
    pub max_depth: usize,
    /// Visited-count ceiling. Once reached no further URL is scheduled.
    pub max_pages: usize,
    pub navigation_timeout_ms: u64,
    /// Wait after a hash-route change before the DOM is re-read.
    pub hash_settle_ms: u64,
    pub login_settle_ms: u64,
    pub include_subdomains: bool,
    pub user_agent: String,
    pub input_types: InputTypes,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            navigation_timeout_ms: 5000,
            hash_settle_ms: 500,
            login_settle_ms: 1000,
            include_subdomains: false,
            user_agent: format!(
                "Mozilla/5.0 (compatible; formscout/{})",
                env!("CARGO_PKG_VERSION")
            ),
            input_types: InputTypes::default(),
        }
    }
}

impl CrawlConfig {
    /// Load a config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_navigation_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.navigation_timeout_ms = timeout_ms;
        self
    }

    pub fn with_include_subdomains(mut self, include: bool) -> Self {
        self.include_subdomains = include;
        self
    }

    /// Zero every settle delay. Useful against drivers that render synchronously.
    pub fn without_settle_delays(mut self) -> Self {
        self.hash_settle_ms = 0;
        self.login_settle_ms = 0;
        self
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn hash_settle(&self) -> Duration {
        Duration::from_millis(self.hash_settle_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }
}

/// Input types that are replayed with their literal value and never fuzzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputTypes {
    pub non_input_types: Vec<String>,
}

impl Default for InputTypes {
    fn default() -> Self {
        Self {
            non_input_types: ["submit", "button", "reset", "image", "hidden"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl InputTypes {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn is_non_input(&self, input_type: &str) -> bool {
        self.non_input_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(input_type))
    }
}
