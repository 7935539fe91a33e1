use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named variables used to resolve `${NAME}` and `%%NAME%%` references in
/// paths and settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Copies every variable of `other`, overwriting existing names.
    pub fn copy_from(&mut self, other: &Variables) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Replaces variable references in `text`. Unknown references are kept
    /// verbatim.
    pub fn substitute(&self, text: &str) -> String {
        let text = self.substitute_delimited(text, "${", "}");
        self.substitute_delimited(&text, "%%", "%%")
    }

    fn substitute_delimited(&self, text: &str, open: &str, close: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(open) {
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close) else {
                break;
            };
            let name = &after_open[..end];

            result.push_str(&rest[..start]);
            match self.get(name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push_str(open);
                    result.push_str(name);
                    result.push_str(close);
                }
            }
            rest = &after_open[end + close.len()..];
        }

        result.push_str(rest);
        result
    }
}
