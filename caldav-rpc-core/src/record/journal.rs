//! Journal entries (VJOURNAL).

use serde::Serialize;

use super::params::{Fields, Params};
use crate::error::RpcResult;
use crate::time::CalTime;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Journal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub date: CalTime,
    pub categories: Vec<String>,
    pub priority: Option<u8>,
    pub url: Option<String>,
}

impl Journal {
    pub const FIELDS: &'static [&'static str] =
        &["title", "content", "date", "categories", "priority", "url"];

    pub fn from_params(params: &Params) -> RpcResult<Self> {
        let f = Fields::new(params, Self::FIELDS)?;

        Ok(Journal {
            id: None,
            title: f.required_string("title")?,
            content: f.string("content")?,
            date: f.required_time("date")?,
            categories: f.categories()?,
            priority: f.priority()?,
            url: f.url()?,
        })
    }

    pub fn apply_update(mut self, delta: &Params) -> RpcResult<Self> {
        let f = Fields::new(delta, Self::FIELDS)?;

        if f.contains("title") {
            self.title = f.required_string("title")?;
        }
        if f.contains("content") {
            self.content = f.string("content")?;
        }
        if f.contains("date") {
            self.date = f.required_time("date")?;
        }
        if f.contains("categories") {
            self.categories = f.categories()?;
        }
        if f.contains("priority") {
            self.priority = f.priority()?;
        }
        if f.contains("url") {
            self.url = f.url()?;
        }

        Ok(self)
    }
}
