use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    /// Parse a form's `method` attribute. Missing or unknown methods submit as GET.
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("post") => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a form input as handed to scanners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    /// Must be replayed unchanged (CSRF tokens, hidden ids, submit labels).
    Fixed(String),
    /// Substitution point for attack payloads.
    Fuzzable,
}

impl InputValue {
    pub fn is_fuzzable(&self) -> bool {
        matches!(self, InputValue::Fuzzable)
    }

    /// The value to send: the payload for fuzzable inputs, the literal otherwise.
    pub fn fill<'a>(&'a self, payload: &'a str) -> &'a str {
        match self {
            InputValue::Fixed(value) => value,
            InputValue::Fuzzable => payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: Method,
    pub inputs: BTreeMap<String, InputValue>,
    pub headers: BTreeMap<String, String>,
}

impl Form {
    pub fn fuzzable_fields(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|(_, value)| value.is_fuzzable())
            .map(|(name, _)| name.as_str())
    }

    pub fn fixed_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs.iter().filter_map(|(name, value)| match value {
            InputValue::Fixed(v) => Some((name.as_str(), v.as_str())),
            InputValue::Fuzzable => None,
        })
    }

    pub fn has_fuzzable(&self) -> bool {
        self.inputs.values().any(InputValue::is_fuzzable)
    }

    /// Request parameters with every fuzzable input replaced by `payload`.
    pub fn with_payload(&self, payload: &str) -> Vec<(String, String)> {
        self.inputs
            .iter()
            .map(|(name, value)| (name.clone(), value.fill(payload).to_string()))
            .collect()
    }
}

/// A crawled page that carries at least one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// URL as first discovered, before normalization.
    pub path: String,
    pub response_headers: BTreeMap<String, String>,
    pub forms: Vec<Form>,
    /// Forms with a password input; each also appears in `forms`.
    pub login_forms: Vec<Form>,
}

impl Page {
    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    pub fn has_login_form(&self) -> bool {
        !self.login_forms.is_empty()
    }
}
