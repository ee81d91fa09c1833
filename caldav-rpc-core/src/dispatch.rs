//! Routes `caldav.<kind>.<operation>` methods to their handlers.

use serde_json::Value;
use tracing::debug;

use crate::error::{RpcError, RpcResult};
use crate::handlers;
use crate::kind::{Operation, ResourceKind};
use crate::record::Params;
use crate::store::Store;

const NAMESPACE: &str = "caldav";

/// A resolved method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    pub kind: ResourceKind,
    pub operation: Operation,
}

impl Method {
    pub fn parse(name: &str) -> RpcResult<Method> {
        let unsupported = || RpcError::UnsupportedOperation(name.to_string());

        let mut segments = name.split('.');
        let (Some(NAMESPACE), Some(resource), Some(operation), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(unsupported());
        };

        let kind = ResourceKind::from_name(resource).ok_or_else(|| RpcError::UnknownResource {
            method: name.to_string(),
            resource: resource.to_string(),
        })?;
        let operation = Operation::from_name(operation).ok_or_else(unsupported)?;

        Ok(Method { kind, operation })
    }
}

/// Owns the store and runs one request at a time against it.
pub struct Dispatcher<S> {
    store: S,
}

impl<S: Store> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn dispatch(&mut self, method: &str, params: &Params) -> RpcResult<Value> {
        let Method { kind, operation } = Method::parse(method)?;
        debug!(%kind, %operation, "Dispatching {}", method);

        let store = &mut self.store;
        match operation {
            Operation::Create => handlers::create(store, kind, params).await,
            Operation::Read => handlers::read(store, kind, params).await,
            Operation::Update => handlers::update(store, kind, params).await,
            Operation::Delete => handlers::delete(store, kind, params).await,
            Operation::List => handlers::list(store, kind, params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_parse_method() {
        assert_eq!(
            Method::parse("caldav.journal.update").unwrap(),
            Method {
                kind: ResourceKind::Journal,
                operation: Operation::Update
            }
        );
    }

    #[test]
    fn test_unknown_kind_and_operation() {
        let err = Method::parse("caldav.calendar.list").unwrap_err();
        assert_eq!(
            err,
            RpcError::UnknownResource {
                method: "caldav.calendar.list".into(),
                resource: "calendar".into()
            }
        );
        assert_eq!(err.code(), code::OPERATION_NOT_SUPPORTED);

        let err = Method::parse("caldav.event.purge").unwrap_err();
        assert_eq!(err, RpcError::UnsupportedOperation("caldav.event.purge".into()));
        assert_eq!(err.code(), code::OPERATION_NOT_SUPPORTED);
    }

    #[test]
    fn test_malformed_method_names() {
        for name in ["", "caldav", "caldav.event", "caldav.event.read.extra", "ical.event.read"] {
            let err = Method::parse(name).unwrap_err();
            assert_eq!(err.code(), code::OPERATION_NOT_SUPPORTED, "{name}");
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_kind() {
        let mut dispatcher = Dispatcher::new(MemoryStore::new());
        let params = json!({"title": "Buy milk"}).as_object().cloned().unwrap();

        let created = dispatcher.dispatch("caldav.todo.create", &params).await.unwrap();
        assert_eq!(created["status"], "pending");
        assert_eq!(dispatcher.store().len(ResourceKind::Todo), 1);
        assert_eq!(dispatcher.store().len(ResourceKind::Event), 0);

        let listed = dispatcher.dispatch("caldav.todo.list", &Params::new()).await.unwrap();
        assert_eq!(listed["items"][0]["title"], "Buy milk");
    }
}
