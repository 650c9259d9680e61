//! Access token claim types and validation helpers.
//!
//! Signature verification lives in [`crate::services::authenticator`];
//! this module only knows the shape of the claims the issuer puts in a
//! token and how to read them.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
/// Claims carried by a verified access token. Identity claims the
/// issuer namespaces (e.g. `https://example.app/name`) stay in `extra`
/// and are read through [`display_claim`].
pub struct Claims {
    /// Stable subject identifier; the session owner key.
    pub sub: String,
    /// Audience: the issuer may emit a single string or an array.
    #[serde(default)]
    pub aud: Option<Audience>,
    /// Expiration as epoch seconds.
    pub exp: i64,
    /// Issued-at as epoch seconds.
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

impl Claims {
    /// True when the token was minted for `expected`, whichever shape
    /// the `aud` claim takes. A missing claim never matches.
    pub fn has_audience(&self, expected: &str) -> bool {
        self.aud
            .as_ref()
            .map(|aud| aud.contains(expected))
            .unwrap_or(false)
    }

    /// Reads a display claim, preferring the namespaced form
    /// (`{namespace}{name}`) over the bare one.
    pub fn display_claim(&self, namespace: &str, name: &str) -> Option<String> {
        let namespaced = format!("{}{}", namespace, name);
        self.extra
            .get(&namespaced)
            .or_else(|| self.extra.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// Strips surrounding whitespace, quotes, and an optional
/// case-insensitive `Bearer ` prefix from a raw token value.
pub fn canonicalize_token(raw: &str) -> &str {
    let mut token = raw.trim();
    if (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
        || (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
    {
        token = token[1..token.len() - 1].trim();
    }
    if let Some((scheme, rest)) = token.split_once(' ') {
        if scheme.eq_ignore_ascii_case("bearer") {
            token = rest.trim_start();
        }
    }
    token
}

/// Cheap shape check before attempting a decode: three dot-separated
/// non-empty segments.
pub fn looks_like_jwt(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        if segment.is_empty() {
            return false;
        }
        segments += 1;
    }
    segments == 3
}
