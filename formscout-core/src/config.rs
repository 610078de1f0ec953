//! Crawl settings and login credentials from files and command-line pairs.

use formscout_scanner::{CrawlConfig, InputTypes, LoginBootstrap};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Defaults, or the JSON file at `path` layered over them.
pub fn load_crawl_config(path: Option<&Path>) -> Result<CrawlConfig, String> {
    match path {
        Some(path) => CrawlConfig::from_json_file(path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(CrawlConfig::default()),
    }
}

pub fn load_input_types(path: &Path) -> Result<InputTypes, String> {
    InputTypes::from_json_file(path)
        .map_err(|e| format!("Failed to load input types {}: {}", path.display(), e))
}

/// Split `name=value` at the first `=`. The value may be empty, the name may not.
pub fn parse_login_pair(pair: &str) -> Result<(String, String), String> {
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("Login field '{}' must be name=value", pair))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Login field '{}' has an empty name", pair));
    }
    Ok((name.to_string(), value.to_string()))
}

/// A JSON object of input name to string value.
pub fn load_login_fields(path: &Path) -> Result<BTreeMap<String, String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read login file {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid login file {}: {}", path.display(), e))
}

/// Combine `--login-path`, `--login-file` and `--login` pairs. Pairs override
/// fields from the file. Credentials without a path, or a path without
/// credentials, are rejected.
pub fn build_login(
    login_path: Option<&str>,
    pairs: &[String],
    login_file: Option<&Path>,
) -> Result<Option<LoginBootstrap>, String> {
    let mut fields = match login_file {
        Some(file) => load_login_fields(file)?,
        None => BTreeMap::new(),
    };
    for pair in pairs {
        let (name, value) = parse_login_pair(pair)?;
        fields.insert(name, value);
    }

    match login_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) if fields.is_empty() => Err(format!(
            "Login path {} given without any login fields",
            path
        )),
        Some(path) => Ok(Some(LoginBootstrap::new(path, fields))),
        None if !fields.is_empty() => {
            Err("Login fields given without --login-path".to_string())
        }
        None => Ok(None),
    }
}
