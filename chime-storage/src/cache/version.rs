//! Version tokens and `If-None-Match` matching.
//!
//! A token is a time-ordered UUIDv7 rendered in simple form. A fresh token is
//! generated for every mutating cache operation and written in the same
//! atomic store operation as the data it describes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-member version token, surfaced to clients as the ETag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Generate a new token.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Wrap a token read back from the store.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strong ETag header value (quoted).
    pub fn to_etag(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed `If-None-Match` request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    /// `*`: matches whenever a current version exists.
    Any,
    /// One or more entity tags, with quotes and weak prefixes stripped.
    Tags(Vec<String>),
}

impl IfNoneMatch {
    /// Parse a header value. Returns `None` for an empty value.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        if header.is_empty() {
            return None;
        }
        if header == "*" {
            return Some(IfNoneMatch::Any);
        }

        let tags: Vec<String> = header
            .split(',')
            .map(|tag| {
                let tag = tag.trim();
                let tag = tag.strip_prefix("W/").unwrap_or(tag);
                tag.trim_matches('"').to_string()
            })
            .filter(|tag| !tag.is_empty())
            .collect();

        if tags.is_empty() {
            None
        } else {
            Some(IfNoneMatch::Tags(tags))
        }
    }

    /// Whether the client's copy is still current.
    pub fn matches(&self, current: Option<&VersionToken>) -> bool {
        match (self, current) {
            (_, None) => false,
            (IfNoneMatch::Any, Some(_)) => true,
            (IfNoneMatch::Tags(tags), Some(current)) => {
                tags.iter().any(|tag| tag == current.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_differ() {
        let a = VersionToken::generate();
        let b = VersionToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_etag_is_quoted() {
        let token = VersionToken::from_stored("abc");
        assert_eq!(token.to_etag(), "\"abc\"");
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(IfNoneMatch::parse(""), None);
        assert_eq!(IfNoneMatch::parse(" * "), Some(IfNoneMatch::Any));
        assert_eq!(
            IfNoneMatch::parse("\"abc\""),
            Some(IfNoneMatch::Tags(vec!["abc".to_string()]))
        );
        assert_eq!(
            IfNoneMatch::parse("W/\"abc\", def"),
            Some(IfNoneMatch::Tags(vec!["abc".to_string(), "def".to_string()]))
        );
        assert_eq!(IfNoneMatch::parse("\"\""), None);
    }

    #[test]
    fn test_matches() {
        let current = VersionToken::from_stored("v2");
        assert!(IfNoneMatch::parse("\"v1\", \"v2\"")
            .unwrap()
            .matches(Some(&current)));
        assert!(!IfNoneMatch::parse("\"v1\"").unwrap().matches(Some(&current)));
        assert!(IfNoneMatch::Any.matches(Some(&current)));
        assert!(!IfNoneMatch::Any.matches(None));
    }
}
