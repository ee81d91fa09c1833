//! Resource records: the typed, in-memory form of events, journals and todos.
//!
//! Requests never reach the codec or the store as loose JSON. Parameters are
//! checked against a per-kind field schema here first.

mod event;
mod journal;
mod params;
mod todo;

pub use event::{Event, EventStatus};
pub use journal::Journal;
pub use params::Params;
pub(crate) use params::strip_mailto;
pub use todo::{Todo, TodoStatus};

use serde::Serialize;

use crate::error::RpcResult;
use crate::kind::ResourceKind;

/// One calendar item of a fixed kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Event(Event),
    Journal(Journal),
    Todo(Todo),
}

impl Record {
    /// Validate create params for `kind`.
    pub fn validate_create(kind: ResourceKind, params: &Params) -> RpcResult<Record> {
        match kind {
            ResourceKind::Event => Event::from_params(params).map(Record::Event),
            ResourceKind::Journal => Journal::from_params(params).map(Record::Journal),
            ResourceKind::Todo => Todo::from_params(params).map(Record::Todo),
        }
    }

    /// Merge an update delta into this record.
    pub fn apply_update(self, delta: &Params) -> RpcResult<Record> {
        match self {
            Record::Event(e) => e.apply_update(delta).map(Record::Event),
            Record::Journal(j) => j.apply_update(delta).map(Record::Journal),
            Record::Todo(t) => t.apply_update(delta).map(Record::Todo),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Record::Event(_) => ResourceKind::Event,
            Record::Journal(_) => ResourceKind::Journal,
            Record::Todo(_) => ResourceKind::Todo,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Record::Event(e) => e.id.as_deref(),
            Record::Journal(j) => j.id.as_deref(),
            Record::Todo(t) => t.id.as_deref(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Record {
        let id = Some(id.into());
        match &mut self {
            Record::Event(e) => e.id = id,
            Record::Journal(j) => j.id = id,
            Record::Todo(t) => t.id = id,
        }
        self
    }
}
