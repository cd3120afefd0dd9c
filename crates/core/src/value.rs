//! Parameter values: raw request inputs and validated, typed values.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One validated parameter value.
///
/// Batched fields always produce [`ParamValue::List`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Text form sent as a `param_<name>` value to the backend.
    ///
    /// Top-level strings travel unquoted; inside a sequence every string is
    /// a quoted literal.
    pub fn to_backend_param(&self) -> String {
        match self {
            Self::Text(v) => v.clone(),
            other => other.to_backend_literal(),
        }
    }

    fn to_backend_literal(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "\\'")),
            Self::List(items) => {
                let items: Vec<String> = items.iter().map(|i| i.to_backend_literal()).collect();
                format!("[{}]", items.join(","))
            }
        }
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Validated runtime values for one request, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParamsRecord(BTreeMap<String, ParamValue>);

impl ParamsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(ParamValue::as_u64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Copy every entry of `other` over `self`; `other` wins on collision.
    pub fn overlay(mut self, other: ParamsRecord) -> Self {
        self.0.extend(other.0);
        self
    }
}

impl FromIterator<(String, ParamValue)> for ParamsRecord {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One raw request input before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Single(String),
    /// A native sequence, e.g. a repeated query-string key
    Many(Vec<String>),
}

impl RawValue {
    pub fn values(&self) -> &[String] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Many(items) => items.as_slice(),
        }
    }

    fn push(self, value: String) -> Self {
        match self {
            Self::Single(first) => Self::Many(vec![first, value]),
            Self::Many(mut items) => {
                items.push(value);
                Self::Many(items)
            }
        }
    }
}

/// Raw inputs of one request source (path or query string).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams(BTreeMap<String, RawValue>);

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Repeated keys become a [`RawValue::Many`] in order of appearance.
    pub fn from_query_string(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: RawValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.0.get(name)
    }
}

impl FromIterator<(String, String)> for RawParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in iter {
            let next = match params.remove(&key) {
                Some(existing) => RawValue::push(existing, value),
                None => RawValue::Single(value),
            };
            params.insert(key, next);
        }
        Self(params)
    }
}

impl From<HashMap<String, String>> for RawParams {
    fn from(map: HashMap<String, String>) -> Self {
        Self(
            map.into_iter()
                .map(|(k, v)| (k, RawValue::Single(v)))
                .collect(),
        )
    }
}
