use std::collections::BTreeMap;
use std::sync::RwLock;

use stockroom_core::RecordId;
use stockroom_inventory::{AdjustmentOutcome, CompositeKey, NewProduct, ProductRecord};

use super::r#trait::{Mutation, ProductFilter, ProductStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<RecordId, ProductRecord>,
}

impl Inner {
    fn find_key(&self, key: CompositeKey) -> Option<RecordId> {
        self.records
            .values()
            .find(|r| r.key() == key)
            .map(|r| r.id())
    }
}

/// In-memory product store.
///
/// Intended for tests/dev. Every operation runs under one lock, which makes
/// uniqueness checks and `modify` atomic.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: RwLock<Inner>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create(&self, product: NewProduct) -> Result<ProductRecord, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        let key = product.key();
        if inner.find_key(key).is_some() {
            return Err(StoreError::Duplicate(key));
        }

        inner.next_id += 1;
        let id = RecordId::new(inner.next_id);
        let record = product.into_record(id);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn save(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        if !inner.records.contains_key(&record.id()) {
            return Err(StoreError::NotFound(format!("record {}", record.id())));
        }
        if let Some(other) = inner.find_key(record.key()) {
            if other != record.id() {
                return Err(StoreError::Duplicate(record.key()));
            }
        }
        inner.records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn delete(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner
            .records
            .remove(&record.id())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("record {}", record.id())))
    }

    async fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete_matching(&self, filter: &ProductFilter) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let before = inner.records.len();
        inner.records.retain(|_, r| !filter.matches(r));
        Ok((before - inner.records.len()) as u64)
    }

    async fn modify(
        &self,
        key: CompositeKey,
        mutation: Mutation,
    ) -> Result<(ProductRecord, AdjustmentOutcome), StoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;

        let id = inner
            .find_key(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let mut record = inner
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let outcome = mutation(&mut record)?;

        let new_key = record.key();
        if new_key != key && inner.find_key(new_key).is_some() {
            return Err(StoreError::Duplicate(new_key));
        }

        inner.records.insert(id, record.clone());
        Ok((record, outcome))
    }
}
