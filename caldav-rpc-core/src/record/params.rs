//! Typed access to request parameter maps.
//!
//! Every reader distinguishes "absent" (keep / default) from "present but
//! `null`" (clear an optional field) and names the offending field when a
//! value has the wrong shape.

use std::ops::RangeInclusive;

use serde_json::Value;

use crate::error::{RpcError, RpcResult};
use crate::time::CalTime;

/// A JSON-RPC `params` object.
pub type Params = serde_json::Map<String, Value>;

/// Fields assigned by the store; never accepted from clients.
const SERVER_MANAGED: &[&str] = &["id", "uid", "created", "last_modified", "dtstamp"];

pub(crate) struct Fields<'a> {
    params: &'a Params,
}

impl<'a> Fields<'a> {
    /// Wrap `params`, rejecting server-managed and unknown fields.
    pub fn new(params: &'a Params, allowed: &[&str]) -> RpcResult<Self> {
        for key in params.keys() {
            if SERVER_MANAGED.contains(&key.as_str()) {
                return Err(RpcError::validation(key, "is assigned by the server"));
            }
            if !allowed.contains(&key.as_str()) {
                return Err(RpcError::validation(key, "unknown field"));
            }
        }
        Ok(Fields { params })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    fn value(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    /// String value with CRLF and lone CR normalised to `\n`.
    pub fn string(&self, name: &str) -> RpcResult<Option<String>> {
        match self.value(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.replace("\r\n", "\n").replace('\r', "\n"))),
            Some(_) => Err(RpcError::validation(name, "must be a string")),
        }
    }

    pub fn required_string(&self, name: &str) -> RpcResult<String> {
        match self.string(name)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(RpcError::validation(name, "must not be empty")),
            None => Err(RpcError::validation(name, "is required")),
        }
    }

    pub fn time(&self, name: &str) -> RpcResult<Option<CalTime>> {
        self.string(name)?
            .map(|s| CalTime::parse(&s).map_err(|e| RpcError::validation(name, e.to_string())))
            .transpose()
    }

    pub fn required_time(&self, name: &str) -> RpcResult<CalTime> {
        self.time(name)?
            .ok_or_else(|| RpcError::validation(name, "is required"))
    }

    pub fn string_list(&self, name: &str) -> RpcResult<Vec<String>> {
        match self.value(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(RpcError::validation(name, "must be a list of strings")),
                })
                .collect(),
            Some(_) => Err(RpcError::validation(name, "must be a list of strings")),
        }
    }

    pub fn int_in(&self, name: &str, range: RangeInclusive<u8>) -> RpcResult<Option<u8>> {
        let Some(value) = self.value(name) else {
            return Ok(None);
        };
        let n = value
            .as_i64()
            .ok_or_else(|| RpcError::validation(name, "must be an integer"))?;
        u8::try_from(n)
            .ok()
            .filter(|n| range.contains(n))
            .map(Some)
            .ok_or_else(|| {
                RpcError::validation(
                    name,
                    format!("must be between {} and {}", range.start(), range.end()),
                )
            })
    }

    pub fn priority(&self) -> RpcResult<Option<u8>> {
        self.int_in("priority", 1..=9)
    }

    /// A string that is written into iCalendar unescaped, so it may not
    /// contain control characters.
    pub fn single_line(&self, name: &str) -> RpcResult<Option<String>> {
        match self.string(name)? {
            Some(s) if s.chars().any(char::is_control) => {
                Err(RpcError::validation(name, "must not contain control characters"))
            }
            other => Ok(other),
        }
    }

    pub fn url(&self) -> RpcResult<Option<String>> {
        let Some(raw) = self.single_line("url")? else {
            return Ok(None);
        };
        url::Url::parse(&raw).map_err(|e| RpcError::validation("url", e.to_string()))?;
        Ok(Some(raw))
    }

    pub fn categories(&self) -> RpcResult<Vec<String>> {
        let categories = self.string_list("categories")?;
        if categories.iter().any(|c| c.trim().is_empty()) {
            return Err(RpcError::validation("categories", "must not contain empty values"));
        }
        Ok(categories)
    }

    /// Email-like strings; a `mailto:` prefix is dropped.
    pub fn emails(&self, name: &str) -> RpcResult<Vec<String>> {
        self.string_list(name)?
            .into_iter()
            .map(|raw| {
                let email = strip_mailto(raw.trim());
                if is_email_like(email) {
                    Ok(email.to_string())
                } else {
                    Err(RpcError::validation(name, format!("invalid email address: {raw}")))
                }
            })
            .collect()
    }
}

pub(crate) fn strip_mailto(value: &str) -> &str {
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &value[7..],
        _ => value,
    }
}

fn is_email_like(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rejects_id_and_unknown_fields() {
        let p = params(json!({"id": "x"}));
        let err = Fields::new(&p, &["title"]).err().unwrap();
        assert!(matches!(err, RpcError::Validation { ref field, .. } if field == "id"));

        let p = params(json!({"colour": "red"}));
        let err = Fields::new(&p, &["title"]).err().unwrap();
        assert!(matches!(err, RpcError::Validation { ref field, .. } if field == "colour"));
    }

    #[test]
    fn test_null_reads_as_absent() {
        let p = params(json!({"title": null}));
        let f = Fields::new(&p, &["title"]).unwrap();
        assert!(f.contains("title"));
        assert_eq!(f.string("title").unwrap(), None);
        assert!(f.required_string("title").is_err());
    }

    #[test]
    fn test_priority_range() {
        let p = params(json!({"priority": 10}));
        let f = Fields::new(&p, &["priority"]).unwrap();
        assert!(f.priority().is_err());

        let p = params(json!({"priority": 3}));
        let f = Fields::new(&p, &["priority"]).unwrap();
        assert_eq!(f.priority().unwrap(), Some(3));

        let p = params(json!({"priority": "high"}));
        let f = Fields::new(&p, &["priority"]).unwrap();
        assert!(f.priority().is_err());
    }

    #[test]
    fn test_emails_strip_mailto_and_reject_garbage() {
        let p = params(json!({"attendees": ["MAILTO:alice@example.com", "bob@example.com"]}));
        let f = Fields::new(&p, &["attendees"]).unwrap();
        assert_eq!(
            f.emails("attendees").unwrap(),
            vec!["alice@example.com", "bob@example.com"]
        );

        let p = params(json!({"attendees": ["not an email"]}));
        let f = Fields::new(&p, &["attendees"]).unwrap();
        assert!(f.emails("attendees").is_err());
    }

    #[test]
    fn test_line_breaks_are_normalised() {
        let p = params(json!({"description": "a\r\nb\rc\nd"}));
        let f = Fields::new(&p, &["description"]).unwrap();
        assert_eq!(f.string("description").unwrap().as_deref(), Some("a\nb\nc\nd"));
    }

    #[test]
    fn test_url_rejects_control_characters() {
        let p = params(json!({
            "url": "https://example.com/\r\nSTATUS:COMPLETED\r\nEND:VTODO\r\nBEGIN:VTODO\r\nUID:evil"
        }));
        let f = Fields::new(&p, &["url"]).unwrap();
        let err = f.url().unwrap_err();
        assert!(matches!(err, RpcError::Validation { ref field, .. } if field == "url"));

        let p = params(json!({"url": "https://example.com/\tpath"}));
        let f = Fields::new(&p, &["url"]).unwrap();
        assert!(f.url().is_err());
    }

    #[test]
    fn test_url_must_be_absolute() {
        let p = params(json!({"url": "/relative/path"}));
        let f = Fields::new(&p, &["url"]).unwrap();
        assert!(f.url().is_err());

        let p = params(json!({"url": "https://example.com/meet"}));
        let f = Fields::new(&p, &["url"]).unwrap();
        assert_eq!(f.url().unwrap().as_deref(), Some("https://example.com/meet"));
    }
}
