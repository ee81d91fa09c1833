//! iCalendar text generation.
//!
//! VEVENT and VTODO use the `icalendar` builders. The crate has no VJOURNAL
//! type, so journals are built on an `Other` component of that name. TEXT
//! escaping and line folding are left to the crate.

use chrono::Utc;
use icalendar::{Calendar, CalendarComponent, Component, Property, ValueType, parser};

use super::NativeRecord;
use crate::error::CodecError;
use crate::record::{Event, EventStatus, Journal, Record, Todo};
use crate::time::CalTime;

const PRODID: &str = "-//caldav-rpc//EN";

/// Render a record as a one-component iCalendar document.
///
/// A record without an id gets a placeholder UID from the builder; the store
/// replaces it with the id it assigns.
pub fn to_native(record: &Record) -> Result<NativeRecord, CodecError> {
    let mut cal = Calendar::empty();
    cal.append_property(("VERSION", "2.0"));
    cal.append_property(("PRODID", PRODID));

    match record {
        Record::Event(event) => {
            let mut vevent = icalendar::Event::new();
            write_event(&mut vevent, event);
            cal.push(vevent.done());
        }
        Record::Journal(journal) => {
            let mut vjournal = empty_component("VJOURNAL")?;
            write_journal(&mut vjournal, journal);
            cal.push(vjournal);
        }
        Record::Todo(todo) => {
            let mut vtodo = icalendar::Todo::new();
            write_todo(&mut vtodo, todo);
            cal.push(vtodo.done());
        }
    }

    Ok(NativeRecord::new(cal.done().to_string()))
}

/// A component with no properties, for kinds the builder does not cover.
fn empty_component(name: &str) -> Result<impl Component + Into<CalendarComponent>, CodecError> {
    let skeleton = format!("BEGIN:{name}\r\nEND:{name}\r\n");
    let component = parser::Component::try_from(skeleton.as_str()).map_err(CodecError::Malformed)?;
    Ok(other_from(CalendarComponent::Other, component))
}

/// `icalendar::Other` is not exported; the enum variant's constructor names it.
fn other_from<'a, T: From<parser::Component<'a>>>(
    _variant: fn(T) -> CalendarComponent,
    component: parser::Component<'a>,
) -> T {
    T::from(component)
}

fn write_identity<C: Component>(component: &mut C, id: Option<&str>, title: &str) {
    if let Some(id) = id {
        component.uid(id);
    }
    // DTSTAMP is required by RFC 5545 but carries no record data
    component.timestamp(Utc::now());
    component.summary(&text(title));
}

fn write_event(vevent: &mut icalendar::Event, event: &Event) {
    write_identity(vevent, event.id.as_deref(), &event.title);
    if let Some(ref desc) = event.description {
        vevent.description(&text(desc));
    }
    add_time(vevent, "DTSTART", &event.start_time);
    add_time(vevent, "DTEND", &event.end_time);
    if let Some(ref location) = event.location {
        vevent.add_property("LOCATION", text(location));
    }

    // CONFIRMED is the implied default
    if event.status != EventStatus::Confirmed {
        vevent.add_property("STATUS", event.status.as_ics_str());
    }

    for attendee in &event.attendees {
        vevent.append_multi_property(Property::new("ATTENDEE", format!("mailto:{attendee}")));
    }

    write_common(vevent, &event.categories, event.priority, event.url.as_deref());

    // Validated on input: starts with FREQ= and has no control characters
    if let Some(ref rrule) = event.rrule {
        vevent.add_property("RRULE", rrule);
    }
}

fn write_journal(vjournal: &mut impl Component, journal: &Journal) {
    write_identity(vjournal, journal.id.as_deref(), &journal.title);
    if let Some(ref content) = journal.content {
        vjournal.description(&text(content));
    }
    add_time(vjournal, "DTSTART", &journal.date);
    write_common(vjournal, &journal.categories, journal.priority, journal.url.as_deref());
}

fn write_todo(vtodo: &mut icalendar::Todo, todo: &Todo) {
    write_identity(vtodo, todo.id.as_deref(), &todo.title);
    if let Some(ref desc) = todo.description {
        vtodo.description(&text(desc));
    }
    if let Some(ref due) = todo.due_date {
        add_time(vtodo, "DUE", due);
    }
    if let Some(ref completed) = todo.completion_date {
        add_time(vtodo, "COMPLETED", completed);
    }
    vtodo.add_property("STATUS", todo.status.as_ics_str());
    if let Some(percent) = todo.percent_complete {
        vtodo.percent_complete(percent);
    }
    write_common(vtodo, &todo.categories, todo.priority, todo.url.as_deref());
}

fn write_common<C: Component>(
    component: &mut C,
    categories: &[String],
    priority: Option<u8>,
    url: Option<&str>,
) {
    // One property per category so commas inside a category stay escaped
    for category in categories {
        component.append_multi_property(Property::new("CATEGORIES", text(category)));
    }
    if let Some(priority) = priority {
        component.priority(u32::from(priority));
    }
    if let Some(url) = url {
        component.url(url);
    }
}

/// TEXT value with carriage returns turned into plain line breaks, which the
/// builder escapes as `\n`.
fn text(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n")
}

/// Add a datetime property in the form matching the CalTime variant
fn add_time<C: Component>(component: &mut C, name: &str, time: &CalTime) {
    match time {
        CalTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            component.append_property(prop);
        }
        CalTime::Utc(dt) => {
            component.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        CalTime::Floating(dt) => {
            component.add_property(name, dt.format("%Y%m%dT%H%M%S").to_string());
        }
        CalTime::Zoned { datetime, tzid } => {
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            component.append_property(prop);
        }
    }
}
