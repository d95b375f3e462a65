//! JSON value types that tolerate the inconsistent shapes the CRM emits.
//!
//! - [`StringOrArray`]: a field that arrives either as `"x"` or `["x", "y"]`.
//!   Always held as a list. A one-element list is written back as a bare
//!   string, so `["x"]` does not survive a round trip unchanged.
//! - [`EnforcedString`]: a string field the server sometimes sends without
//!   its quotes (`123` instead of `"123"`).

use std::fmt;
use std::ops::Deref;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Wire shape of a value that may be a scalar or an array of scalars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// A list of strings that may arrive as a single string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringOrArray(pub Vec<String>);

impl StringOrArray {
    /// Decode raw JSON bytes. A leading `[` selects the array form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') => Ok(Self(serde_json::from_slice::<Vec<String>>(bytes)?)),
            _ => Ok(Self(vec![serde_json::from_slice::<String>(bytes)?])),
        }
    }

    /// Wire form: bare string for exactly one element, array otherwise.
    pub fn as_wire(&self) -> OneOrMany<&str> {
        match self.0.as_slice() {
            [single] => OneOrMany::One(single.as_str()),
            many => OneOrMany::Many(many.iter().map(String::as_str).collect()),
        }
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for StringOrArray {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<OneOrMany<String>> for StringOrArray {
    fn from(value: OneOrMany<String>) -> Self {
        Self(value.into_vec())
    }
}

impl From<Vec<String>> for StringOrArray {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl Serialize for StringOrArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_wire().serialize(serializer)
    }
}

struct OneOrManyVisitor;

impl<'de> Visitor<'de> for OneOrManyVisitor {
    type Value = OneOrMany<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or an array of strings")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(OneOrMany::One(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(OneOrMany::One(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element::<String>()? {
            values.push(value);
        }
        Ok(OneOrMany::Many(values))
    }
}

impl<'de> Deserialize<'de> for StringOrArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OneOrManyVisitor).map(Self::from)
    }
}

/// A string that may have been sent without surrounding quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnforcedString(pub String);

impl EnforcedString {
    /// Decode raw JSON bytes into a string.
    ///
    /// Well-formed JSON strings are decoded as-is. Anything else is escaped
    /// and quoted first: every `"` becomes `\"`, a doubled `\\"` collapses
    /// back to `\"`, and the whole payload, whitespace included, is wrapped
    /// in quotes.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'"') {
            return serde_json::from_slice::<String>(bytes).map(Self);
        }
        serde_json::from_slice::<String>(&requote(bytes)).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn requote(bytes: &[u8]) -> Vec<u8> {
    let escaped = replace_all(bytes, b"\"", b"\\\"");
    let collapsed = replace_all(&escaped, b"\\\\\"", b"\\\"");

    let mut quoted = Vec::with_capacity(collapsed.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(&collapsed);
    quoted.push(b'"');
    quoted
}

fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while !rest.is_empty() {
        if rest.starts_with(from) {
            out.extend_from_slice(to);
            rest = &rest[from.len()..];
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}

impl Deref for EnforcedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnforcedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnforcedString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EnforcedString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for EnforcedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EnforcedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Box<RawValue>>::deserialize(deserializer)?;
        Self::decode(raw.get().as_bytes()).map_err(de::Error::custom)
    }
}
