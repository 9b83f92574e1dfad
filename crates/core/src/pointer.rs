//! JSON pointers (RFC 6901) into a lot's field tree.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointerError {
    #[error("invalid pointer '{0}': must be empty or start with '/'")]
    MissingSlash(String),
    #[error("invalid pointer '{0}': bad escape sequence")]
    BadEscape(String),
}

/// A parsed JSON pointer. The root pointer has no tokens and renders as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(s: &str) -> Result<Self, PointerError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| PointerError::MissingSlash(s.to_string()))?;
        let tokens = rest
            .split('/')
            .map(|raw| unescape(raw).ok_or_else(|| PointerError::BadEscape(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// The pointer one level up, or `None` for the root.
    pub fn parent(&self) -> Option<Pointer> {
        let (_, init) = self.tokens.split_last()?;
        Some(Self {
            tokens: init.to_vec(),
        })
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tokens {
            write!(f, "/{}", escape(t))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Parse an array index token. Leading zeros and signs are not indices.
pub(crate) fn array_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

pub(crate) fn step_mut<'a>(value: &'a mut Value, token: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => items.get_mut(array_index(token)?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_renders_escapes() {
        let p = Pointer::parse("/a~1b/m~0n/0").unwrap();
        assert_eq!(p.tokens(), ["a/b", "m~n", "0"]);
        assert_eq!(p.to_string(), "/a~1b/m~0n/0");
    }

    #[test]
    fn rejects_malformed_pointers() {
        assert!(matches!(
            Pointer::parse("items"),
            Err(PointerError::MissingSlash(_))
        ));
        assert!(matches!(
            Pointer::parse("/a~2"),
            Err(PointerError::BadEscape(_))
        ));
    }

    #[test]
    fn root_pointer_is_empty_string() {
        let p = Pointer::parse("").unwrap();
        assert!(p.tokens().is_empty());
        assert_eq!(p.to_string(), "");
        assert_eq!(p.parent(), None);
    }

    #[test]
    fn array_indices_reject_leading_zeros() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index(""), None);
    }

    #[test]
    fn step_mut_walks_objects_and_arrays() {
        let mut doc = json!({"items": [{"date": null}]});
        let items = step_mut(&mut doc, "items").unwrap();
        *step_mut(step_mut(items, "0").unwrap(), "date").unwrap() = json!("2024-03-05");
        assert_eq!(doc["items"][0]["date"], json!("2024-03-05"));
        assert!(step_mut(&mut doc, "missing").is_none());
    }

    #[test]
    fn parent_drops_the_last_token() {
        let p = Pointer::parse("/items/0/status").unwrap();
        assert_eq!(p.last(), Some("status"));
        assert_eq!(p.parent(), Some(Pointer::parse("/items/0").unwrap()));
    }
}
