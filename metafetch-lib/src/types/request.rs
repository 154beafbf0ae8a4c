use std::{fmt::Display, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::ErrorKind;

/// Identifier of a single remote resource, e.g. a file ID.
///
/// A `Key` is always trimmed and never empty. Two keys which only differ in
/// surrounding whitespace are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(Arc<str>);

impl Key {
    /// Create a key from a raw input line.
    ///
    /// Returns `None` if the line is blank.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    /// Returns the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Key {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or(ErrorKind::EmptyKey)
    }
}

impl TryFrom<&str> for Key {
    type Error = ErrorKind;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Key {
    type Error = ErrorKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0.to_string()
    }
}

/// Partial response selector shared by every request of a batch,
/// e.g. `id,name,mimeType`.
///
/// `*` selects all fields. If no selector is given the remote API
/// decides which fields to return.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fields(Arc<str>);

impl Fields {
    /// Create a selector, returning `None` for a blank string
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    /// Selector which asks for every field of a resource
    #[must_use]
    pub fn all() -> Self {
        Self(Arc::from("*"))
    }

    /// Returns the selector as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fields {
    type Error = ErrorKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or(ErrorKind::EmptyFields)
    }
}

impl From<Fields> for String {
    fn from(fields: Fields) -> Self {
        fields.0.to_string()
    }
}

/// A single unit of work for the dispatcher.
///
/// Cloning a `Request` is cheap; the key and the field selector are
/// reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// Identifier of the requested resource
    pub key: Key,
    /// Which fields of the resource to retrieve
    pub fields: Option<Fields>,
}

impl Request {
    /// Instantiate a new `Request` object
    #[inline]
    #[must_use]
    pub const fn new(key: Key, fields: Option<Fields>) -> Self {
        Request { key, fields }
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fields {
            Some(fields) => write!(f, "{} ({fields})", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

impl From<Key> for Request {
    fn from(key: Key) -> Self {
        Request::new(key, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("abc", "abc")]
    #[case("  abc ", "abc")]
    #[case("\tid3\n", "id3")]
    fn test_key_is_trimmed(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Key::new(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_blank_key_is_rejected(#[case] input: &str) {
        assert!(Key::new(input).is_none());
        assert!(matches!(input.parse::<Key>(), Err(ErrorKind::EmptyKey)));
    }

    #[test]
    fn test_keys_equal_regardless_of_whitespace() {
        assert_eq!(Key::new("abc"), Key::new(" abc "));
    }

    #[test]
    fn test_key_serde() {
        let key: Key = serde_json::from_str("\" id1 \"").unwrap();
        assert_eq!(key.as_str(), "id1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"id1\"");
        assert!(serde_json::from_str::<Key>("\"  \"").is_err());
    }

    #[test]
    fn test_request_display() {
        let key = Key::new("id1").unwrap();
        assert_eq!(Request::from(key.clone()).to_string(), "id1");
        assert_eq!(
            Request::new(key, Fields::new("id,name")).to_string(),
            "id1 (id,name)"
        );
    }
}
