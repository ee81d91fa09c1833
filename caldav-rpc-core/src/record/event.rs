//! Calendar events (VEVENT).

use serde::Serialize;

use super::params::{Fields, Params};
use crate::error::{RpcError, RpcResult};
use crate::time::CalTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: CalTime,
    pub end_time: CalTime,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub categories: Vec<String>,
    pub status: EventStatus,
    pub priority: Option<u8>,
    pub url: Option<String>,
    /// Recurrence rule, carried verbatim (never expanded)
    pub rrule: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "confirmed" => Some(EventStatus::Confirmed),
            "tentative" => Some(EventStatus::Tentative),
            "cancelled" | "canceled" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_ics_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
            EventStatus::Tentative => "TENTATIVE",
            EventStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Event {
    pub const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "start_time",
        "end_time",
        "location",
        "attendees",
        "categories",
        "status",
        "priority",
        "url",
        "rrule",
    ];

    /// Build a new event from create params.
    pub fn from_params(params: &Params) -> RpcResult<Self> {
        let f = Fields::new(params, Self::FIELDS)?;

        let event = Event {
            id: None,
            title: f.required_string("title")?,
            description: f.string("description")?,
            start_time: f.required_time("start_time")?,
            end_time: f.required_time("end_time")?,
            location: f.string("location")?,
            attendees: f.emails("attendees")?,
            categories: f.categories()?,
            status: status(&f)?.unwrap_or_default(),
            priority: f.priority()?,
            url: f.url()?,
            rrule: rrule(&f)?,
        };
        event.check()?;
        Ok(event)
    }

    /// Overwrite the fields present in `delta`.
    pub fn apply_update(mut self, delta: &Params) -> RpcResult<Self> {
        let f = Fields::new(delta, Self::FIELDS)?;

        if f.contains("title") {
            self.title = f.required_string("title")?;
        }
        if f.contains("description") {
            self.description = f.string("description")?;
        }
        if f.contains("start_time") {
            self.start_time = f.required_time("start_time")?;
        }
        if f.contains("end_time") {
            self.end_time = f.required_time("end_time")?;
        }
        if f.contains("location") {
            self.location = f.string("location")?;
        }
        if f.contains("attendees") {
            self.attendees = f.emails("attendees")?;
        }
        if f.contains("categories") {
            self.categories = f.categories()?;
        }
        if f.contains("status") {
            self.status = status(&f)?.unwrap_or_default();
        }
        if f.contains("priority") {
            self.priority = f.priority()?;
        }
        if f.contains("url") {
            self.url = f.url()?;
        }
        if f.contains("rrule") {
            self.rrule = rrule(&f)?;
        }

        self.check()?;
        Ok(self)
    }

    fn check(&self) -> RpcResult<()> {
        if self.start_time.is_date() != self.end_time.is_date() {
            return Err(RpcError::validation(
                "end_time",
                "must be a date when start_time is a date, and a date-time otherwise",
            ));
        }
        if self.end_time.to_utc() < self.start_time.to_utc() {
            return Err(RpcError::validation("end_time", "must not be before start_time"));
        }
        Ok(())
    }
}

fn status(f: &Fields) -> RpcResult<Option<EventStatus>> {
    f.string("status")?
        .map(|s| {
            EventStatus::from_name(&s).ok_or_else(|| {
                RpcError::validation("status", "must be one of: confirmed, tentative, cancelled")
            })
        })
        .transpose()
}

fn rrule(f: &Fields) -> RpcResult<Option<String>> {
    let Some(rule) = f.single_line("rrule")? else {
        return Ok(None);
    };
    let rule = rule.strip_prefix("RRULE:").unwrap_or(&rule).to_string();
    if !rule.split(';').any(|part| part.starts_with("FREQ=")) {
        return Err(RpcError::validation("rrule", "must contain a FREQ= part"));
    }
    Ok(Some(rule))
}
