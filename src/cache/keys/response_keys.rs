use std::fmt;
use std::str::FromStr;

use axum::extract::Query;
use axum::http::{Method, Uri};
use serde_json::{Map, Value};

/// How query parameters are folded into a response cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyMode {
    /// Parameters in the order the client sent them. `?a=1&b=2` and
    /// `?b=2&a=1` are different keys.
    #[default]
    Raw,
    /// Parameters stably sorted by name first.
    Canonical,
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(KeyMode::Raw),
            "canonical" => Ok(KeyMode::Canonical),
            other => Err(format!("unknown cache key mode: {other}")),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Raw => f.write_str("raw"),
            KeyMode::Canonical => f.write_str("canonical"),
        }
    }
}

/// Decoded query string, kept in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// `None` when the query string cannot be decoded.
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        Query::<Vec<(String, String)>>::try_from_uri(uri)
            .ok()
            .map(|Query(pairs)| Self(pairs))
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object of the parameters. Repeated names collapse into an array
    /// at the position of their first occurrence.
    pub fn to_json(&self, mode: KeyMode) -> String {
        let mut pairs: Vec<&(String, String)> = self.0.iter().collect();
        if mode == KeyMode::Canonical {
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let mut map = Map::new();
        for (name, value) in pairs {
            let value = Value::String(value.clone());
            match map.get_mut(name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(name.clone(), value);
                }
            }
        }
        Value::Object(map).to_string()
    }
}

/// `METHOD:path:{query json}`
pub fn response_key(method: &Method, path: &str, query: &QueryParams, mode: KeyMode) -> String {
    format!("{}:{}:{}", method.as_str(), path, query.to_json(mode))
}
