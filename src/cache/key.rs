//! Request key: the identity used for caching and deduplication.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// A logical resource plus its query parameters.
///
/// Parameters keep insertion order; setting a parameter that already exists
/// replaces its value in place so the canonical form stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    path: String,
    params: Vec<(String, String)>,
}

impl RequestKey {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: path.trim_start_matches('/').to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical `path?k=v&...` form, percent-encoded.
    pub fn canonical(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl From<&str> for RequestKey {
    fn from(s: &str) -> Self {
        match s.split_once('?') {
            Some((path, query)) => form_urlencoded::parse(query.as_bytes())
                .fold(Self::new(path), |key, (k, v)| key.with_param(k, v)),
            None => Self::new(s),
        }
    }
}

impl From<String> for RequestKey {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
