//! Create, read, update, delete and list, for any resource kind.
//!
//! Handlers validate params through the record models, translate through the
//! codec, and talk to the store. They hold no state of their own.

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{RpcError, RpcResult};
use crate::ics::{from_native, to_native};
use crate::kind::ResourceKind;
use crate::record::{Params, Record};
use crate::store::Store;

pub async fn create<S: Store>(store: &mut S, kind: ResourceKind, params: &Params) -> RpcResult<Value> {
    let record = Record::validate_create(kind, params)?;
    let id = store.put(kind, &to_native(&record)?, None).await?;
    info!("Created {} {}", kind, id);

    // Return what the server actually stored, when it lets us read it back
    let created = match refetch(store, kind, &id).await {
        Some(stored) => stored,
        None => record.with_id(id),
    };
    to_json(&created)
}

pub async fn read<S: Store>(store: &mut S, kind: ResourceKind, params: &Params) -> RpcResult<Value> {
    let id = required_id(params)?;
    let record = load(store, kind, &id).await?;
    to_json(&record)
}

pub async fn update<S: Store>(store: &mut S, kind: ResourceKind, params: &Params) -> RpcResult<Value> {
    let id = required_id(params)?;
    let delta = update_delta(params)?;

    let merged = load(store, kind, &id).await?.apply_update(&delta)?;
    store.put(kind, &to_native(&merged)?, Some(&id)).await?;
    info!("Updated {} {}", kind, id);

    to_json(&merged)
}

pub async fn delete<S: Store>(store: &mut S, kind: ResourceKind, params: &Params) -> RpcResult<Value> {
    let id = required_id(params)?;

    if store.get(kind, &id).await?.is_none() || !store.delete(kind, &id).await? {
        return Err(RpcError::NotFound { kind, id });
    }
    info!("Deleted {} {}", kind, id);

    Ok(json!({ "id": id, "status": "deleted" }))
}

pub async fn list<S: Store>(store: &mut S, kind: ResourceKind, _params: &Params) -> RpcResult<Value> {
    let natives = store.list_all(kind).await?;

    let mut items = Vec::with_capacity(natives.len());
    for native in &natives {
        match from_native(native, kind) {
            Ok(record) => items.push(to_json(&record)?),
            Err(e) => warn!("Skipping undecodable {} {:?}: {}", kind, native.uid(), e),
        }
    }

    Ok(json!({ "items": items }))
}

/// Fetch and decode; the record's id is always the key it is stored under.
async fn load<S: Store>(store: &S, kind: ResourceKind, id: &str) -> RpcResult<Record> {
    let native = store
        .get(kind, id)
        .await?
        .ok_or_else(|| RpcError::NotFound {
            kind,
            id: id.to_string(),
        })?;
    Ok(from_native(&native, kind)?.with_id(id))
}

async fn refetch<S: Store>(store: &S, kind: ResourceKind, id: &str) -> Option<Record> {
    match load(store, kind, id).await {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Could not read back {} {}: {}", kind, id, e);
            None
        }
    }
}

fn required_id(params: &Params) -> RpcResult<String> {
    match params.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::String(_)) => Err(RpcError::validation("id", "must not be empty")),
        Some(_) => Err(RpcError::validation("id", "must be a string")),
        None => Err(RpcError::validation("id", "is required")),
    }
}

/// Fields to change: `params.data`, or every other key beside `id`.
fn update_delta(params: &Params) -> RpcResult<Params> {
    match params.get("data") {
        Some(Value::Object(data)) => Ok(data.clone()),
        Some(_) => Err(RpcError::validation("data", "must be an object")),
        None => Ok(params
            .iter()
            .filter(|(key, _)| key.as_str() != "id")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
    }
}

fn to_json(record: &Record) -> RpcResult<Value> {
    serde_json::to_value(record).map_err(|e| {
        warn!("Failed to serialize {}: {}", record.kind(), e);
        RpcError::Internal
    })
}
