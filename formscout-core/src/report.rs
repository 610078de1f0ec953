// Report generation from crawl results

use crate::crawl::{TargetResult, generate_crawl_report};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Serialized form of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub generator: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub targets: Vec<TargetResult>,
}

impl CrawlReport {
    pub fn new(targets: Vec<TargetResult>) -> Self {
        Self {
            generator: "formscout".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            targets,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.targets.iter().map(|t| t.pages.len()).sum()
    }

    pub fn total_forms(&self) -> usize {
        self.targets.iter().map(TargetResult::form_count).sum()
    }
}

pub fn generate_json_report(report: &CrawlReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Render results in the requested format.
pub fn render_report(format: ReportFormat, targets: Vec<TargetResult>) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_crawl_report(&targets)),
        ReportFormat::Json => generate_json_report(&CrawlReport::new(targets))
            .map_err(|e| format!("Failed to serialize report: {}", e)),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
