// ABOUTME: Query string parsing for the HTTP endpoints.
// ABOUTME: Percent-decodes values and keeps the first occurrence of each key.

use std::collections::HashMap;

/// Parsed query parameters of one request.
#[derive(Debug, Default)]
pub struct Query {
    params: HashMap<String, String>,
}

impl Query {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = HashMap::new();

        for pair in raw.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode(key), decode(value)) else {
                tracing::debug!("skipping undecodable query pair {}", pair);
                continue;
            };
            params.entry(key).or_insert(value);
        }

        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// A parameter that must be present and non-empty.
    pub fn require(&self, key: &'static str) -> Result<&str, MissingParam> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or(MissingParam(key))
    }
}

fn decode(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|v| v.into_owned())
}

/// A mandatory query parameter was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing query parameter {0}")]
pub struct MissingParam(pub &'static str);
