use crate::page::{Form, InputValue, Method};
use std::collections::{BTreeMap, HashSet};

/// Structural identity of a form: where it submits, how, and what it sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormSignature {
    action: String,
    method: String,
    inputs: Vec<(String, InputValue)>,
}

impl FormSignature {
    pub fn new(action: &str, method: Method, inputs: &BTreeMap<String, InputValue>) -> Self {
        Self {
            action: action.trim().to_string(),
            method: method.as_str().to_lowercase(),
            // BTreeMap iteration is already sorted by name
            inputs: inputs
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    pub fn of(form: &Form) -> Self {
        Self::new(&form.action, form.method, &form.inputs)
    }
}

/// Remembers every form signature seen during one crawl run.
#[derive(Debug, Default)]
pub struct FormDeduplicator {
    seen: HashSet<FormSignature>,
}

impl FormDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if an identical form was already recorded; otherwise records
    /// it and returns `false`.
    pub fn is_duplicate(
        &mut self,
        action: &str,
        method: Method,
        inputs: &BTreeMap<String, InputValue>,
    ) -> bool {
        !self.seen.insert(FormSignature::new(action, method, inputs))
    }

    pub fn is_duplicate_form(&mut self, form: &Form) -> bool {
        !self.seen.insert(FormSignature::of(form))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
