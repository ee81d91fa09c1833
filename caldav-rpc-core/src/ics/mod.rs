//! iCalendar (RFC 5545) generation and parsing for records.
//!
//! This is the only place that knows how a [`Record`](crate::record::Record)
//! looks on the server.

mod generate;
mod native;
mod parse;

pub use generate::to_native;
pub use native::NativeRecord;
pub use parse::from_native;
