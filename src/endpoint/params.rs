//! Endpoint URI and parameter handling

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::Serialize;

use vdbgate_core::{GatewayError, GatewayResult};

/// Endpoint parameters not yet consumed by the adapter.
///
/// Every `take*` call removes what it reads, so whatever is left at the end
/// is forwarded verbatim to the query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointParameters(BTreeMap<String, String>);

impl EndpointParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn take(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Takes the first key present, removing all of them.
    pub fn take_first(&mut self, keys: &[&str]) -> Option<String> {
        let mut found = None;
        for key in keys {
            let value = self.take(key);
            if found.is_none() {
                found = value;
            }
        }
        found
    }

    pub fn take_bool(&mut self, key: &str, default: bool) -> GatewayResult<bool> {
        match self.take(key) {
            None => Ok(default),
            Some(value) => parse_bool_param(&value).ok_or_else(|| {
                GatewayError::validation(format!("{key}: expected a boolean, got '{value}'"))
            }),
        }
    }

    /// Takes every `prefix*` key, returned with the prefix stripped
    pub fn take_prefixed(&mut self, prefix: &str) -> BTreeMap<String, String> {
        let keys: Vec<String> = self
            .0
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let value = self.0.remove(&key)?;
                let stripped = key.strip_prefix(prefix)?.to_string();
                Some((stripped, value))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EndpointParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A split endpoint URI: `scheme:remaining?key=value&…`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUri {
    pub scheme: String,
    /// Everything between the scheme and the parameters, i.e. the query text
    pub remaining: String,
    pub parameters: EndpointParameters,
}

/// Splits an endpoint URI.
///
/// The query text is percent-decoded; parameters are form-decoded. A repeated
/// parameter keeps its last value.
pub fn parse_endpoint_uri(uri: &str) -> GatewayResult<EndpointUri> {
    let (scheme, rest) = uri
        .split_once(':')
        .ok_or_else(|| GatewayError::validation(format!("Endpoint URI has no scheme: {uri}")))?;

    if scheme.is_empty() {
        return Err(GatewayError::validation(format!(
            "Endpoint URI has no scheme: {uri}"
        )));
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (remaining, query) = match rest.split_once('?') {
        Some((remaining, query)) => (remaining, Some(query)),
        None => (rest, None),
    };

    let remaining = percent_decode_str(remaining)
        .decode_utf8()
        .map_err(|_| GatewayError::validation("Endpoint query text is not valid UTF-8"))?
        .into_owned();

    let parameters: EndpointParameters = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    Ok(EndpointUri {
        scheme: scheme.to_string(),
        remaining,
        parameters,
    })
}

fn parse_bool_param(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
