//! The stored form of a record: raw iCalendar text.

use std::fmt;

use icalendar::Property;
use icalendar::parser::{ParseString, unfold};

use crate::kind::ResourceKind;

/// iCalendar document text exactly as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRecord(String);

impl NativeRecord {
    pub fn new(text: impl Into<String>) -> Self {
        NativeRecord(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Kind of the first event, journal or todo component in the document.
    pub fn component(&self) -> Option<ResourceKind> {
        self.0.lines().find_map(|line| {
            let (name, value) = line.trim_end_matches('\r').split_once(':')?;
            if name.eq_ignore_ascii_case("BEGIN") {
                ResourceKind::from_component_name(value.trim())
            } else {
                None
            }
        })
    }

    /// UID of the first record component, if it has one.
    pub fn uid(&self) -> Option<String> {
        let mut depth = 0usize;
        let mut in_record = false;

        for line in unfold(&self.0).lines() {
            let Some((name, value)) = split_content_line(line) else {
                continue;
            };
            if name.eq_ignore_ascii_case("BEGIN") {
                depth += 1;
                in_record |= ResourceKind::from_component_name(value).is_some();
            } else if name.eq_ignore_ascii_case("END") {
                depth = depth.saturating_sub(1);
            } else if in_record && depth == 2 && name.eq_ignore_ascii_case("UID") {
                return Some(ParseString::from(value).unescape_text().to_string());
            }
        }
        None
    }

    /// Copy of this document with every record component's UID set to `uid`.
    ///
    /// Existing UID lines are replaced; components without one get it right
    /// after their BEGIN line. Nested components (alarms) are left alone.
    pub fn with_uid(&self, uid: &str) -> NativeRecord {
        // Writing into a String cannot fail
        let uid_line: String = Property::new("UID", uid).try_into().unwrap_or_default();
        let mut out = String::with_capacity(self.0.len() + uid_line.len() + 2);
        let mut depth = 0usize;
        let mut record_depth = None;
        let mut skipping = false;

        for line in self.0.lines() {
            let line = line.trim_end_matches('\r');

            // Continuation of a folded line
            if line.starts_with([' ', '\t']) {
                if !skipping {
                    out.push_str(line);
                    out.push_str("\r\n");
                }
                continue;
            }
            skipping = false;

            let (name, value) = split_content_line(line).unwrap_or((line, ""));
            if name.eq_ignore_ascii_case("BEGIN") {
                depth += 1;
                out.push_str(line);
                out.push_str("\r\n");
                if record_depth.is_none() && ResourceKind::from_component_name(value).is_some() {
                    record_depth = Some(depth);
                    out.push_str(&uid_line);
                }
                continue;
            }
            if name.eq_ignore_ascii_case("END") {
                if record_depth == Some(depth) {
                    record_depth = None;
                }
                depth = depth.saturating_sub(1);
            } else if record_depth == Some(depth) && name.eq_ignore_ascii_case("UID") {
                skipping = true;
                continue;
            }

            out.push_str(line);
            out.push_str("\r\n");
        }

        NativeRecord(out)
    }

    /// Values of `property` exactly as written (still TEXT-escaped) in the
    /// `index`-th top-level `component`.
    pub(crate) fn raw_values(&self, component: &str, index: usize, property: &str) -> Vec<String> {
        let mut values = Vec::new();
        let mut depth = 0usize;
        // Depth of top-level components: inside VCALENDAR, or the roots
        let mut top = None;
        let mut seen = 0usize;
        let mut inside = false;

        for line in unfold(&self.0).lines() {
            let Some((name, value)) = split_content_line(line) else {
                continue;
            };
            if name.eq_ignore_ascii_case("BEGIN") {
                depth += 1;
                let top = *top.get_or_insert(if value.eq_ignore_ascii_case("VCALENDAR") {
                    2
                } else {
                    1
                });
                if depth == top && value.eq_ignore_ascii_case(component) {
                    inside = seen == index;
                    seen += 1;
                }
            } else if name.eq_ignore_ascii_case("END") {
                if Some(depth) == top {
                    inside = false;
                }
                depth = depth.saturating_sub(1);
            } else if inside && Some(depth) == top && name.eq_ignore_ascii_case(property) {
                values.push(value.to_string());
            }
        }
        values
    }
}

impl fmt::Display for NativeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split `NAME;PARAMS:value` into the bare name and the value as written.
///
/// Colons inside quoted parameter values do not end the name part.
fn split_content_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches('\r');
    let mut quoted = false;
    let colon = line.char_indices().find_map(|(i, ch)| match ch {
        '"' => {
            quoted = !quoted;
            None
        }
        ':' if !quoted => Some(i),
        _ => None,
    })?;
    let head = &line[..colon];
    let name = head.split(';').next().unwrap_or(head);
    Some((name, line[colon + 1..].trim()))
}
