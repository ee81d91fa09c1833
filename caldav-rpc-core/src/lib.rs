//! Core of caldav-rpc: a JSON-RPC front end for events, journals and todos
//! kept on a CalDAV server.
//!
//! The binary crate owns the stdio loop and the HTTP store; everything that
//! can be tested without a network lives here.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ics;
pub mod kind;
pub mod protocol;
pub mod record;
pub mod store;
pub mod time;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{RpcError, RpcResult};
pub use kind::ResourceKind;
pub use store::{MemoryStore, Store};
