use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::method::Method;

/// Cache identity of a request: `[method, path, init, pageAccessor?]`.
///
/// Equality is structural over every element, so the same logical request
/// always lands on the same cache entry. A fourth element is present only
/// for paginated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    method: Method,
    path: String,
    init: Option<Value>,
    page_accessor: Option<String>,
}

/// Build a query key. `init` is stored as given; nothing is validated here.
pub fn build_key(
    method: Method,
    path: impl Into<String>,
    init: Option<Value>,
    page_accessor: Option<String>,
) -> QueryKey {
    QueryKey {
        method,
        path: path.into(),
        init,
        page_accessor,
    }
}

impl QueryKey {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn init(&self) -> Option<&Value> {
        self.init.as_ref()
    }

    pub fn page_accessor(&self) -> Option<&str> {
        self.page_accessor.as_deref()
    }

    pub fn is_paginated(&self) -> bool {
        self.page_accessor.is_some()
    }

    /// Canonical JSON rendering of the key, with object fields in sorted
    /// order. Numbers keep their written form, so `0.0` and `-0.0` render
    /// differently even though the keys are equal.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.path.hash(state);
        self.init.is_some().hash(state);
        if let Some(init) = &self.init {
            hash_value(init, state);
        }
        self.page_accessor.hash(state);
    }
}

// Must agree with `Value`'s `PartialEq`: objects compare regardless of entry
// order and floats compare by value.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(flag) => {
            1u8.hash(state);
            flag.hash(state);
        }
        Value::Number(number) => {
            2u8.hash(state);
            hash_number(number, state);
        }
        Value::String(text) => {
            3u8.hash(state);
            text.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            for (name, field) in entries {
                name.hash(state);
                hash_value(field, state);
            }
        }
    }
}

fn hash_number<H: Hasher>(number: &Number, state: &mut H) {
    if let Some(n) = number.as_u64() {
        0u8.hash(state);
        n.hash(state);
    } else if let Some(n) = number.as_i64() {
        1u8.hash(state);
        n.hash(state);
    } else if let Some(n) = number.as_f64() {
        2u8.hash(state);
        // -0.0 == 0.0
        let n = if n == 0.0 { 0.0 } else { n };
        n.to_bits().hash(state);
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.page_accessor.is_some() { 4 } else { 3 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.method)?;
        seq.serialize_element(&self.path)?;
        seq.serialize_element(&self.init)?;
        if let Some(accessor) = &self.page_accessor {
            seq.serialize_element(accessor)?;
        }
        seq.end()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Bookkeeping key for mutations: `[method, path]`.
///
/// Mutations are not cached by request identity; the init arrives when the
/// mutation is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MutationKey(pub Method, pub String);

impl MutationKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        MutationKey(method, path.into())
    }

    pub fn method(&self) -> Method {
        self.0
    }

    pub fn path(&self) -> &str {
        &self.1
    }
}
