use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::SyncError,
    model::{Customer, CustomerDraft, Entity, Item, ItemDraft},
};

/// One entity type keyed by id, behind its own lock.
///
/// A batch is applied under a single lock hold, so other callers see either
/// none or all of it.
pub struct Collection<E: Entity> {
    entries: Mutex<HashMap<Uuid, E>>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts every draft, assigning a fresh identifier where none was given.
    /// A draft carrying the id of an existing record replaces that record.
    ///
    /// Returns the stored records in draft order.
    pub async fn create(&self, drafts: Vec<E::Draft>) -> Vec<E> {
        let mut entries = self.entries.lock().await;
        drafts
            .into_iter()
            .map(|draft| {
                let id = E::draft_id(&draft).unwrap_or_else(Uuid::new_v4);
                let entity = E::from_draft(draft, id);
                entries.insert(id, entity.clone());
                entity
            })
            .collect()
    }

    pub async fn read(&self, id: Uuid) -> Result<E, SyncError> {
        let entries = self.entries.lock().await;
        entries
            .get(&id)
            .cloned()
            .ok_or(SyncError::NotFound { kind: E::KIND, id })
    }

    pub async fn read_all(&self) -> Vec<E> {
        let entries = self.entries.lock().await;
        entries.values().cloned().collect()
    }

    /// Replaces records by identifier. Records that did not exist are inserted.
    ///
    /// Returns how many of them were new.
    pub async fn update(&self, records: Vec<E>) -> usize {
        let mut entries = self.entries.lock().await;
        records
            .into_iter()
            .map(|record| entries.insert(record.id(), record))
            .filter(Option::is_none)
            .count()
    }

    /// Removes the given identifiers, skipping any that are absent.
    ///
    /// Returns how many records were removed.
    pub async fn delete(&self, ids: &[Uuid]) -> usize {
        let mut entries = self.entries.lock().await;
        ids.iter().filter(|id| entries.remove(*id).is_some()).count()
    }

    pub async fn delete_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Holds the collection lock until the guard is dropped.
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, HashMap<Uuid, E>> {
        self.entries.lock().await
    }
}

/// Combined state of both collections, as sent in every resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub customer: Vec<Customer>,
    pub item: Vec<Item>,
}

#[derive(Default)]
pub struct Store {
    pub customers: Collection<Customer>,
    pub items: Collection<Item>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads both collections one after the other; the two locks are never
    /// held together.
    pub async fn snapshot(&self) -> Snapshot {
        let customer = self.customers.read_all().await;
        let item = self.items.read_all().await;
        Snapshot { customer, item }
    }

    /// Returns `(customers, items)`.
    pub async fn counts(&self) -> (usize, usize) {
        (self.customers.len().await, self.items.len().await)
    }

    /// Loads a small fixed data set, handy when trying the service by hand.
    pub async fn seed_demo(&self) {
        self.customers
            .create(vec![
                CustomerDraft::new("John Doe", "john.doe@example.com"),
                CustomerDraft::new("Jane Doe", "jane.doe@example.com"),
                CustomerDraft::new("Bob Smith", "bob.smith@example.com"),
            ])
            .await;
        self.items
            .create(vec![
                ItemDraft::new("Apple", 23, 0.50),
                ItemDraft::new("Pencils", 54, 0.99),
                ItemDraft::new("Water Bottle", 12, 1.99),
            ])
            .await;
    }
}
