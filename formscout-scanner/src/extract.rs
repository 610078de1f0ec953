//! Form and input extraction from rendered HTML.

use crate::config::InputTypes;
use crate::dedup::FormDeduplicator;
use crate::error::{Result, ScanError};
use crate::page::{Form, InputValue, Method};
use crate::scope::is_redirect_loop;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedForms {
    pub forms: Vec<Form>,
    pub login_forms: Vec<Form>,
}

/// A form as parsed from one page, before cross-page deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedForm {
    pub form: Form,
    pub is_login: bool,
}

pub struct FormExtractor {
    input_types: InputTypes,
    form_selector: Selector,
    field_selector: Selector,
    base_selector: Selector,
}

impl FormExtractor {
    pub fn new(input_types: InputTypes) -> Result<Self> {
        Ok(Self {
            input_types,
            form_selector: selector("form")?,
            field_selector: selector("input, textarea")?,
            base_selector: selector("base[href]")?,
        })
    }

    /// Extract the page's forms, dropping any whose signature `dedup` has seen.
    pub fn extract(
        &self,
        html: &str,
        page_url: &Url,
        headers: &BTreeMap<String, String>,
        dedup: &mut FormDeduplicator,
    ) -> ExtractedForms {
        let mut extracted = ExtractedForms::default();
        for parsed in self.parse_forms(html, page_url, headers) {
            if dedup.is_duplicate_form(&parsed.form) {
                debug!("Duplicate form {} {} on {}", parsed.form.method, parsed.form.action, page_url);
                continue;
            }
            if parsed.is_login {
                extracted.login_forms.push(parsed.form.clone());
            }
            extracted.forms.push(parsed.form);
        }
        extracted
    }

    /// Every form on the page that carries at least one named, submittable input.
    pub fn parse_forms(
        &self,
        html: &str,
        page_url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Vec<ParsedForm> {
        let document = Html::parse_document(html);
        let base = document_base(&document, &self.base_selector, page_url);
        let mut forms = Vec::new();

        for form_element in document.select(&self.form_selector) {
            let Some(action) = resolve_action(form_element.value().attr("action"), page_url, &base)
            else {
                continue;
            };
            let action = action.to_string();
            if is_redirect_loop(&action) {
                debug!("Skipping redirect-loop form action {}", action);
                continue;
            }

            let method = Method::from_attr(form_element.value().attr("method"));
            let mut inputs = BTreeMap::new();
            let mut is_login = false;

            for field in form_element.select(&self.field_selector) {
                if field.value().name() == "input" && field_type(&field) == "password" {
                    is_login = true;
                }
                let Some(name) = field.value().attr("name") else {
                    continue;
                };
                if name.trim().is_empty() {
                    continue;
                }
                if let Some(value) = self.classify(&field) {
                    inputs.insert(name.to_string(), value);
                }
            }

            if inputs.is_empty() {
                continue;
            }

            forms.push(ParsedForm {
                form: Form {
                    action,
                    method,
                    inputs,
                    headers: headers.clone(),
                },
                is_login,
            });
        }

        forms
    }

    /// `None` for inputs an attacker-controlled request cannot submit
    /// (`disabled`, `readonly`).
    pub fn classify(&self, field: &ElementRef) -> Option<InputValue> {
        let element = field.value();
        if element.attr("disabled").is_some() || element.attr("readonly").is_some() {
            return None;
        }

        let value = field_value(field);
        if self.input_types.is_non_input(&field_type(field)) {
            return Some(InputValue::Fixed(value));
        }

        let trimmed = value.trim();
        let name = element.attr("name").unwrap_or("").trim();
        let id = element.attr("id").unwrap_or("").trim();
        // A value equal to the field's own name or id is usually a placeholder.
        let placeholder_value = trimmed.is_empty() || trimmed == name || trimmed == id;
        let has_placeholder = element.attr("placeholder").is_some();
        let autocomplete_off = element
            .attr("autocomplete")
            .is_some_and(|a| a.trim().eq_ignore_ascii_case("off"));

        if placeholder_value || has_placeholder || autocomplete_off {
            Some(InputValue::Fuzzable)
        } else {
            Some(InputValue::Fixed(value))
        }
    }
}

/// Resolve a form's `action`. Empty, `#` and `javascript:` actions submit to the
/// hosting page itself.
pub fn resolve_action(raw: Option<&str>, page_url: &Url, base: &Url) -> Option<Url> {
    let raw = raw.unwrap_or("").trim();
    let mut action = if raw.is_empty()
        || raw == "#"
        || raw.to_ascii_lowercase().starts_with("javascript:")
    {
        page_url.clone()
    } else {
        base.join(raw).ok()?
    };
    action.set_fragment(None);
    Some(action)
}

/// The URL relative references resolve against: `<base href>` when present.
pub fn document_base(document: &Html, base_selector: &Selector, page_url: &Url) -> Url {
    document
        .select(base_selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector {}: {}", css, e)))
}

fn field_type(field: &ElementRef) -> String {
    if field.value().name() == "textarea" {
        return "textarea".to_string();
    }
    match field.value().attr("type").map(str::trim) {
        Some(t) if !t.is_empty() => t.to_ascii_lowercase(),
        _ => "text".to_string(),
    }
}

fn field_value(field: &ElementRef) -> String {
    if field.value().name() == "textarea" {
        return field.text().collect();
    }
    field.value().attr("value").unwrap_or("").to_string()
}
