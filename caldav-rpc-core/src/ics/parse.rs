//! iCalendar parsing using the icalendar crate's parser.
//!
//! The parser unescapes TEXT values itself. CATEGORIES is the exception: it is
//! a comma-separated list, so it is split on the value as written and each item
//! unescaped afterwards.

use icalendar::{
    DatePerhapsTime,
    parser::{Component, ParseString, Property, read_calendar, unfold},
};

use super::NativeRecord;
use crate::error::CodecError;
use crate::kind::ResourceKind;
use crate::record::{Event, EventStatus, Journal, Record, Todo, TodoStatus, strip_mailto};
use crate::time::CalTime;

const NO_TITLE: &str = "(No title)";

/// Decode a stored document into a record of `kind`.
pub fn from_native(native: &NativeRecord, kind: ResourceKind) -> Result<Record, CodecError> {
    let unfolded = unfold(native.as_str());
    let calendar = read_calendar(&unfolded).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let expected = kind.component_name();
    let matching: Vec<&Component> = calendar
        .components
        .iter()
        .filter(|c| c.name.as_ref().eq_ignore_ascii_case(expected))
        .collect();

    // A recurring series may carry overrides; the master has no RECURRENCE-ID
    let index = matching
        .iter()
        .position(|c| c.find_prop("RECURRENCE-ID").is_none())
        .unwrap_or(0);
    let Some(component) = matching.get(index).copied() else {
        let found = calendar
            .components
            .iter()
            .map(|c| c.name.to_string())
            .find(|name| !name.eq_ignore_ascii_case("VTIMEZONE"))
            .unwrap_or_else(|| "no component".to_string());
        return Err(CodecError::ComponentMismatch { expected, found });
    };

    let uid = text(component, "UID").ok_or(CodecError::MissingProperty("UID"))?;
    let categories = native
        .raw_values(expected, index, "CATEGORIES")
        .iter()
        .flat_map(|value| split_list(value))
        .collect();

    let record = match kind {
        ResourceKind::Event => Record::Event(parse_event(component, uid, categories)?),
        ResourceKind::Journal => Record::Journal(parse_journal(component, uid, categories)?),
        ResourceKind::Todo => Record::Todo(parse_todo(component, uid, categories)?),
    };
    Ok(record)
}

fn parse_event(vevent: &Component, uid: String, categories: Vec<String>) -> Result<Event, CodecError> {
    let start_time = required_time(vevent, "DTSTART")?;
    let end_time = match time(vevent, "DTEND")? {
        Some(end) => end,
        None => {
            let prop = vevent
                .find_prop("DURATION")
                .ok_or(CodecError::MissingProperty("DTEND"))?;
            start_time
                .checked_add(parse_duration(prop)?)
                .ok_or_else(|| invalid("DURATION", prop))?
        }
    };

    let status = vevent
        .find_prop("STATUS")
        .map(|p| match p.val.as_ref().to_ascii_uppercase().as_str() {
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        })
        .unwrap_or_default();

    let attendees = vevent
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(|p| strip_mailto(p.val.as_ref()).to_string())
        .filter(|email| !email.is_empty())
        .collect();

    Ok(Event {
        id: Some(uid),
        title: title(vevent),
        description: text(vevent, "DESCRIPTION"),
        start_time,
        end_time,
        location: text(vevent, "LOCATION"),
        attendees,
        categories,
        status,
        priority: priority(vevent)?,
        url: raw(vevent, "URL"),
        rrule: raw(vevent, "RRULE"),
    })
}

fn parse_journal(
    vjournal: &Component,
    uid: String,
    categories: Vec<String>,
) -> Result<Journal, CodecError> {
    Ok(Journal {
        id: Some(uid),
        title: title(vjournal),
        content: text(vjournal, "DESCRIPTION"),
        date: required_time(vjournal, "DTSTART")?,
        categories,
        priority: priority(vjournal)?,
        url: raw(vjournal, "URL"),
    })
}

fn parse_todo(vtodo: &Component, uid: String, categories: Vec<String>) -> Result<Todo, CodecError> {
    let status = vtodo
        .find_prop("STATUS")
        .and_then(|p| TodoStatus::from_name(p.val.as_ref()))
        .unwrap_or_default();

    Ok(Todo {
        id: Some(uid),
        title: title(vtodo),
        description: text(vtodo, "DESCRIPTION"),
        due_date: time(vtodo, "DUE")?,
        completion_date: time(vtodo, "COMPLETED")?,
        status,
        priority: priority(vtodo)?,
        categories,
        url: raw(vtodo, "URL"),
        percent_complete: integer(vtodo, "PERCENT-COMPLETE")?,
    })
}

fn title(component: &Component) -> String {
    text(component, "SUMMARY").unwrap_or_else(|| NO_TITLE.to_string())
}

fn text(component: &Component, name: &str) -> Option<String> {
    component.find_prop(name).map(|p| p.val.to_string())
}

/// Value as written, for URI and RECUR properties.
fn raw(component: &Component, name: &str) -> Option<String> {
    component
        .find_prop(name)
        .map(|p| p.val.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn time(component: &Component, name: &str) -> Result<Option<CalTime>, CodecError> {
    component
        .find_prop(name)
        .map(|prop| {
            DatePerhapsTime::try_from(prop)
                .map(to_cal_time)
                .map_err(|_| invalid(name, prop))
        })
        .transpose()
}

fn required_time(component: &Component, name: &'static str) -> Result<CalTime, CodecError> {
    time(component, name)?.ok_or(CodecError::MissingProperty(name))
}

fn integer(component: &Component, name: &str) -> Result<Option<u8>, CodecError> {
    component
        .find_prop(name)
        .map(|prop| {
            prop.val
                .as_ref()
                .trim()
                .parse::<u8>()
                .map_err(|_| invalid(name, prop))
        })
        .transpose()
}

/// PRIORITY 0 means undefined.
fn priority(component: &Component) -> Result<Option<u8>, CodecError> {
    Ok(integer(component, "PRIORITY")?.filter(|p| *p != 0))
}

fn parse_duration(prop: &Property) -> Result<chrono::Duration, CodecError> {
    let value = prop.val.as_ref().trim();
    // Negative durations would put the end before the start
    let value = value.strip_prefix('+').unwrap_or(value);

    let duration = iso8601::duration(value).map_err(|_| invalid("DURATION", prop))?;
    let std_duration: std::time::Duration = duration.into();
    chrono::Duration::from_std(std_duration).map_err(|_| invalid("DURATION", prop))
}

/// Convert icalendar's DatePerhapsTime to CalTime, keeping the timezone
fn to_cal_time(dpt: DatePerhapsTime) -> CalTime {
    match dpt {
        DatePerhapsTime::Date(d) => CalTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => CalTime::Utc(dt),
            icalendar::CalendarDateTime::Floating(naive) => CalTime::Floating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => CalTime::Zoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

fn invalid(name: &str, prop: &Property) -> CodecError {
    CodecError::InvalidProperty {
        property: name.to_string(),
        value: prop.val.to_string(),
    }
}

/// Split an escaped comma-delimited TEXT list and unescape each item.
fn split_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == ',' {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| ParseString::from(item.trim()).unescape_text().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::to_native;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn doc(component: &str, body: &str) -> NativeRecord {
        NativeRecord::new(format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\nBEGIN:{component}\r\n{body}END:{component}\r\nEND:VCALENDAR\r\n"
        ))
    }

    #[test]
    fn test_event_roundtrip() {
        let event = Event {
            id: Some("event-123".to_string()),
            title: "Planning; Q4, budget".to_string(),
            description: Some("Line one\nLine two".to_string()),
            start_time: CalTime::Utc(Utc.with_ymd_and_hms(2023, 10, 15, 10, 0, 0).unwrap()),
            end_time: CalTime::Utc(Utc.with_ymd_and_hms(2023, 10, 15, 11, 0, 0).unwrap()),
            location: Some("Room 4".to_string()),
            attendees: vec!["alice@example.com".into(), "bob@example.com".into()],
            categories: vec!["work".into(), "planning".into()],
            status: EventStatus::Tentative,
            priority: Some(5),
            url: Some("https://example.com/meeting".into()),
            rrule: Some("FREQ=WEEKLY;COUNT=4".into()),
        };

        let native = to_native(&Record::Event(event.clone())).unwrap();
        let parsed = from_native(&native, ResourceKind::Event).unwrap();

        assert_eq!(parsed, Record::Event(event));
    }

    #[test]
    fn test_journal_roundtrip_with_date() {
        let journal = Journal {
            id: Some("journal-1".into()),
            title: "Standup notes".into(),
            content: Some("Shipped the parser".into()),
            date: CalTime::Date(NaiveDate::from_ymd_opt(2023, 10, 15).unwrap()),
            categories: vec![],
            priority: None,
            url: None,
        };

        let native = to_native(&Record::Journal(journal.clone())).unwrap();
        let parsed = from_native(&native, ResourceKind::Journal).unwrap();

        assert_eq!(parsed, Record::Journal(journal));
    }

    #[test]
    fn test_todo_roundtrip() {
        let todo = Todo {
            id: Some("todo-1".into()),
            title: "Write report".into(),
            description: None,
            due_date: Some(CalTime::parse("2023-10-20T17:00:00[Europe/Berlin]").unwrap()),
            completion_date: Some(CalTime::parse("2023-10-19T09:30:00Z").unwrap()),
            status: TodoStatus::Completed,
            priority: Some(1),
            categories: vec!["reports".into()],
            url: None,
            percent_complete: Some(100),
        };

        let native = to_native(&Record::Todo(todo.clone())).unwrap();
        let parsed = from_native(&native, ResourceKind::Todo).unwrap();

        assert_eq!(parsed, Record::Todo(todo));
    }

    #[test]
    fn test_wrong_component_is_mismatch() {
        let native = doc("VTODO", "UID:t1\r\nSUMMARY:x\r\n");
        let err = from_native(&native, ResourceKind::Event).unwrap_err();
        assert_eq!(
            err,
            CodecError::ComponentMismatch {
                expected: "VEVENT",
                found: "VTODO".to_string()
            }
        );
    }

    #[test]
    fn test_missing_uid() {
        let native = doc("VJOURNAL", "SUMMARY:x\r\nDTSTART;VALUE=DATE:20231015\r\n");
        let err = from_native(&native, ResourceKind::Journal).unwrap_err();
        assert_eq!(err, CodecError::MissingProperty("UID"));
    }

    #[test]
    fn test_event_duration_instead_of_dtend() {
        let native = doc(
            "VEVENT",
            "UID:e1\r\nSUMMARY:Call\r\nDTSTART:20231015T100000Z\r\nDURATION:PT90M\r\n",
        );
        let Record::Event(event) = from_native(&native, ResourceKind::Event).unwrap() else {
            panic!("expected an event");
        };
        assert_eq!(
            event.end_time,
            CalTime::Utc(Utc.with_ymd_and_hms(2023, 10, 15, 11, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_event_without_end_is_rejected() {
        let native = doc("VEVENT", "UID:e1\r\nSUMMARY:Call\r\nDTSTART:20231015T100000Z\r\n");
        let err = from_native(&native, ResourceKind::Event).unwrap_err();
        assert_eq!(err, CodecError::MissingProperty("DTEND"));
    }

    #[test]
    fn test_foreign_todo_defaults() {
        // Written by another client: no SUMMARY, PRIORITY 0, IN-PROCESS
        let native = doc(
            "VTODO",
            "UID:t1\r\nPRIORITY:0\r\nSTATUS:IN-PROCESS\r\nATTENDEE;CN=Bob:MAILTO:bob@example.com\r\n",
        );
        let Record::Todo(todo) = from_native(&native, ResourceKind::Todo).unwrap() else {
            panic!("expected a todo");
        };
        assert_eq!(todo.title, "(No title)");
        assert_eq!(todo.priority, None);
        assert_eq!(todo.status, TodoStatus::Pending);
    }

    #[test]
    fn test_invalid_priority() {
        let native = doc(
            "VJOURNAL",
            "UID:j1\r\nDTSTART;VALUE=DATE:20231015\r\nPRIORITY:high\r\n",
        );
        let err = from_native(&native, ResourceKind::Journal).unwrap_err();
        assert!(matches!(err, CodecError::InvalidProperty { ref property, .. } if property == "PRIORITY"));
    }

    #[test]
    fn test_split_list_honours_escapes() {
        assert_eq!(split_list("a,b\\,c, d,,"), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_text_with_backslashes_and_escaped_categories_roundtrip() {
        let todo = Todo {
            id: Some("todo-2".into()),
            title: "C:\\new folder".into(),
            description: Some("path\\n is not a newline\nbut this is; ok, done\\".into()),
            due_date: None,
            completion_date: None,
            status: TodoStatus::Pending,
            priority: None,
            categories: vec!["a,b".into(), "work".into(), "x\\y;z".into()],
            url: Some("https://example.com/a,b;c".into()),
            percent_complete: None,
        };

        let native = to_native(&Record::Todo(todo.clone())).unwrap();
        let parsed = from_native(&native, ResourceKind::Todo).unwrap();

        assert_eq!(parsed, Record::Todo(todo));
    }

    #[test]
    fn test_carriage_returns_do_not_break_lines() {
        let mut journal = Journal {
            id: Some("journal-2".into()),
            title: "Notes".into(),
            content: Some("first\r\nsecond".into()),
            date: CalTime::Date(NaiveDate::from_ymd_opt(2023, 10, 15).unwrap()),
            categories: vec![],
            priority: None,
            url: None,
        };

        let native = to_native(&Record::Journal(journal.clone())).unwrap();
        assert!(!native.as_str().contains("first\r"));
        let parsed = from_native(&native, ResourceKind::Journal).unwrap();

        // CRLF inside TEXT is stored as a plain line break
        journal.content = Some("first\nsecond".into());
        assert_eq!(parsed, Record::Journal(journal));
    }

    #[test]
    fn test_foreign_category_list_is_split() {
        let native = doc(
            "VTODO",
            "UID:t1\r\nCATEGORIES:home, errands\r\nCATEGORIES:a\\,b\r\n",
        );
        let Record::Todo(todo) = from_native(&native, ResourceKind::Todo).unwrap() else {
            panic!("expected a todo");
        };
        assert_eq!(todo.categories, vec!["home", "errands", "a,b"]);
    }

    #[test]
    fn test_overflowing_duration_is_invalid() {
        let native = doc(
            "VEVENT",
            "UID:e1\r\nDTSTART:20231015T100000Z\r\nDURATION:P999999999D\r\n",
        );
        let err = from_native(&native, ResourceKind::Event).unwrap_err();
        assert!(matches!(err, CodecError::InvalidProperty { ref property, .. } if property == "DURATION"));
    }
}
