use serde::Serialize;
use std::collections::BTreeMap;

/// Ordered key/value collection fed by the log adapters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Bag {
    values: BTreeMap<String, String>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let key = key.trim();
        let value = value.into();
        if let Some(previous) = self.values.get(key) {
            if previous != &value {
                tracing::debug!(key, previous = %previous, value = %value, "overwriting value");
            }
        }
        self.values.insert(key.to_string(), value);
    }

    /// Numeric counter stored as text. A non-numeric previous value restarts at 1.
    pub fn increment(&mut self, key: &str) {
        let key = key.trim();
        let next = self
            .values
            .get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        self.values.insert(key.to_string(), next.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key.trim()).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_count(&self, key: &str) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
