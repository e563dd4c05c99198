//! Ordered key/value parameters for query strings and multipart fields.

use std::fmt::Display;

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Ordered string parameters. Absent values are never stored, so they can
/// never reach the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Like `set`, but `None` leaves the key out entirely.
    pub fn set_opt<V: Display>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Form-urlencoded pairs without a leading `?`.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

/// Null values are omitted; strings are taken verbatim and other scalars
/// are rendered as JSON text.
impl From<&Map<String, Value>> for Params {
    fn from(map: &Map<String, Value>) -> Self {
        let pairs = map
            .iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key.clone(), s.clone())),
                other => Some((key.clone(), other.to_string())),
            })
            .collect();
        Self { pairs }
    }
}
