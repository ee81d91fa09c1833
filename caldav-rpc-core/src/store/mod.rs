//! The remote calendar store, as seen by the handlers.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::ics::NativeRecord;
use crate::kind::ResourceKind;

/// Keyed storage of iCalendar documents, one collection per resource kind.
///
/// Calls are awaited one at a time by the dispatcher, so implementations
/// need no internal locking.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Store `native` under `id`, or under a newly assigned id when `id` is
    /// `None`. Returns the id the record is stored under.
    async fn put(
        &mut self,
        kind: ResourceKind,
        native: &NativeRecord,
        id: Option<&str>,
    ) -> Result<String, StoreError>;

    /// `None` when nothing of this kind is stored under `id`.
    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<NativeRecord>, StoreError>;

    /// `false` when there was nothing to delete.
    async fn delete(&mut self, kind: ResourceKind, id: &str) -> Result<bool, StoreError>;

    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<NativeRecord>, StoreError>;
}
