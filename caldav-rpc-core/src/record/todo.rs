//! Todo items (VTODO).

use serde::Serialize;

use super::params::{Fields, Params};
use crate::error::{RpcError, RpcResult};
use crate::time::CalTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Todo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<CalTime>,
    /// Only set while `status` is `Completed`
    pub completion_date: Option<CalTime>,
    pub status: TodoStatus,
    pub priority: Option<u8>,
    pub categories: Vec<String>,
    pub url: Option<String>,
    pub percent_complete: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TodoStatus {
    /// Accepts our names and the iCalendar ones.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pending" | "needs-action" | "in-process" => Some(TodoStatus::Pending),
            "completed" => Some(TodoStatus::Completed),
            "cancelled" | "canceled" => Some(TodoStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_ics_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "NEEDS-ACTION",
            TodoStatus::Completed => "COMPLETED",
            TodoStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Todo {
    pub const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "due_date",
        "completion_date",
        "status",
        "priority",
        "categories",
        "url",
        "percent_complete",
    ];

    pub fn from_params(params: &Params) -> RpcResult<Self> {
        let f = Fields::new(params, Self::FIELDS)?;

        let todo = Todo {
            id: None,
            title: f.required_string("title")?,
            description: f.string("description")?,
            due_date: f.time("due_date")?,
            completion_date: f.time("completion_date")?,
            status: status(&f)?.unwrap_or_default(),
            priority: f.priority()?,
            categories: f.categories()?,
            url: f.url()?,
            percent_complete: f.int_in("percent_complete", 0..=100)?,
        };
        todo.check()?;
        Ok(todo)
    }

    pub fn apply_update(mut self, delta: &Params) -> RpcResult<Self> {
        let f = Fields::new(delta, Self::FIELDS)?;

        if f.contains("title") {
            self.title = f.required_string("title")?;
        }
        if f.contains("description") {
            self.description = f.string("description")?;
        }
        if f.contains("due_date") {
            self.due_date = f.time("due_date")?;
        }
        if f.contains("status") {
            self.status = status(&f)?.unwrap_or_default();
            // Reopening or cancelling drops a stale completion date
            if self.status != TodoStatus::Completed && !f.contains("completion_date") {
                self.completion_date = None;
            }
        }
        if f.contains("completion_date") {
            self.completion_date = f.time("completion_date")?;
        }
        if f.contains("priority") {
            self.priority = f.priority()?;
        }
        if f.contains("categories") {
            self.categories = f.categories()?;
        }
        if f.contains("url") {
            self.url = f.url()?;
        }
        if f.contains("percent_complete") {
            self.percent_complete = f.int_in("percent_complete", 0..=100)?;
        }

        self.check()?;
        Ok(self)
    }

    fn check(&self) -> RpcResult<()> {
        if self.completion_date.is_some() && self.status != TodoStatus::Completed {
            return Err(RpcError::validation(
                "completion_date",
                "may only be set when status is completed",
            ));
        }
        Ok(())
    }
}

fn status(f: &Fields) -> RpcResult<Option<TodoStatus>> {
    f.string("status")?
        .map(|s| {
            TodoStatus::from_name(&s).ok_or_else(|| {
                RpcError::validation("status", "must be one of: pending, completed, cancelled")
            })
        })
        .transpose()
}
