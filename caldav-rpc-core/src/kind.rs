//! Resource kinds and the operations that can be applied to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three calendar resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Event,
    Journal,
    Todo,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Event, ResourceKind::Journal, ResourceKind::Todo];

    /// Name used in method strings (`caldav.<name>.<op>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Event => "event",
            ResourceKind::Journal => "journal",
            ResourceKind::Todo => "todo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// iCalendar component type holding this kind.
    pub fn component_name(&self) -> &'static str {
        match self {
            ResourceKind::Event => "VEVENT",
            ResourceKind::Journal => "VJOURNAL",
            ResourceKind::Todo => "VTODO",
        }
    }

    pub fn from_component_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.component_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Event => write!(f, "Event"),
            ResourceKind::Journal => write!(f, "Journal"),
            ResourceKind::Todo => write!(f, "Todo"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Operation::Create),
            "read" => Some(Operation::Read),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "list" => Some(Operation::List),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
