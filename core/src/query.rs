//! Query parameters for REST calls.

use std::collections::BTreeMap;

use serde_json::Value;
use url::form_urlencoded;

use crate::response::Record;

/// Ordered multimap of query parameters.
///
/// Keys are kept sorted so encoded URLs are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestQuery {
    values: BTreeMap<String, Vec<String>>,
}

impl RestQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any values of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), vec![value.into()]);
        self
    }

    /// Append `value` to the values of `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.entry(key.into()).or_default().push(value.into());
        self
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Select the fields ONTAP should return, as a comma-joined `fields` value.
    pub fn fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = fields
            .into_iter()
            .map(|field| field.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.set("fields", joined)
    }

    /// Set one parameter per entry. Strings are used as-is, other scalars
    /// in their JSON form; nulls and empty strings are skipped.
    pub fn set_values(&mut self, key_values: &Record) -> &mut Self {
        for (key, value) in key_values {
            let value = match value {
                Value::Null => continue,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            if !value.is_empty() {
                self.set(key.as_str(), value);
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.values
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    /// Form-urlencoded query string, without the leading `?`.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}
