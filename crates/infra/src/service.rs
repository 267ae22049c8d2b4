//! Inventory operations over a `ProductStore`.
//!
//! The service owns the request-level rules (uniqueness on create, not-found
//! on lookups and deletes) and delegates every read-check-mutate sequence to
//! `ProductStore::modify`, so quantity changes and the reorder policy are
//! applied atomically per record.

use thiserror::Error;
use tracing::{info, instrument};

use stockroom_core::{DomainError, ProductId};
use stockroom_inventory::{
    AdjustmentOutcome, CompositeKey, Condition, NewProduct, ProductRecord, ProductUpdate,
    QuantityAdjustment,
};

use crate::store::{ProductFilter, ProductStore, StoreError};

/// Flattened error for inventory operations.
///
/// Domain rejections and store failures collapse into the kinds callers act
/// on; `Store` is reserved for backend failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::BadRequest(msg)
            }
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Forbidden(msg) => ServiceError::Forbidden(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(_) => ServiceError::Conflict(value.to_string()),
            StoreError::NotFound(_) => ServiceError::NotFound(value.to_string()),
            StoreError::Rejected(err) => err.into(),
            StoreError::Backend(_) => ServiceError::Store(value),
        }
    }
}

/// Inventory use cases, generic over the persistence backend.
#[derive(Debug, Clone)]
pub struct InventoryService<S> {
    store: S,
}

impl<S> InventoryService<S>
where
    S: ProductStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn find_all(&self) -> Result<Vec<ProductRecord>, ServiceError> {
        self.query(&ProductFilter::all()).await
    }

    /// Records matching every set field of `filter`, in insertion order.
    pub async fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, ServiceError> {
        Ok(self.store.query(filter).await?)
    }

    pub async fn find_by_id(&self, product_id: ProductId) -> Result<Vec<ProductRecord>, ServiceError> {
        self.query(&ProductFilter::all().with_product_id(product_id))
            .await
    }

    pub async fn find_by_id_and_condition(
        &self,
        key: CompositeKey,
    ) -> Result<Option<ProductRecord>, ServiceError> {
        Ok(self
            .query(&ProductFilter::key(key))
            .await?
            .into_iter()
            .next())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Vec<ProductRecord>, ServiceError> {
        self.query(&ProductFilter::all().with_name(name)).await
    }

    pub async fn find_by_condition(
        &self,
        condition: Condition,
    ) -> Result<Vec<ProductRecord>, ServiceError> {
        self.query(&ProductFilter::all().with_condition(condition))
            .await
    }

    pub async fn find_by_name_and_condition(
        &self,
        name: &str,
        condition: Condition,
    ) -> Result<Vec<ProductRecord>, ServiceError> {
        self.query(&ProductFilter::all().with_name(name).with_condition(condition))
            .await
    }

    /// Like `find_by_id_and_condition`, but a missing record is `NotFound`.
    pub async fn get(&self, key: CompositeKey) -> Result<ProductRecord, ServiceError> {
        self.find_by_id_and_condition(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{key} was not found")))
    }

    #[instrument(
        skip_all,
        fields(product_id = %product.product_id, condition = %product.condition),
        err
    )]
    pub async fn create(&self, product: NewProduct) -> Result<ProductRecord, ServiceError> {
        product.validate()?;

        let key = product.key();
        if self.find_by_id_and_condition(key).await?.is_some() {
            return Err(ServiceError::Conflict(format!("{key} already exists")));
        }

        // The store re-checks the key atomically; a racing create still gets `Duplicate`.
        let record = self.store.create(product).await?;
        info!(record_id = %record.id(), "product created");
        Ok(record)
    }

    /// Apply an increase, decrease or set to the record at `key`.
    #[instrument(
        skip_all,
        fields(product_id = %key.product_id, condition = %key.condition, kind = adjustment.kind().as_str()),
        err
    )]
    pub async fn adjust(
        &self,
        key: CompositeKey,
        adjustment: QuantityAdjustment,
    ) -> Result<ProductRecord, ServiceError> {
        let (record, outcome) = self
            .store
            .modify(key, Box::new(move |r| r.apply_adjustment(adjustment)))
            .await?;
        log_outcome(&record, &outcome);
        Ok(record)
    }

    /// Replace the mutable fields of the record at `key` from a full payload.
    #[instrument(
        skip_all,
        fields(product_id = %key.product_id, condition = %key.condition),
        err
    )]
    pub async fn update(
        &self,
        key: CompositeKey,
        update: ProductUpdate,
    ) -> Result<ProductRecord, ServiceError> {
        let (record, outcome) = self
            .store
            .modify(key, Box::new(move |r| r.apply_update(&update)))
            .await?;
        log_outcome(&record, &outcome);
        Ok(record)
    }

    /// Delete every record of `product_id`, returning how many went.
    #[instrument(skip_all, fields(product_id = %product_id), err)]
    pub async fn delete_all(&self, product_id: ProductId) -> Result<u64, ServiceError> {
        let removed = self
            .store
            .delete_matching(&ProductFilter::all().with_product_id(product_id))
            .await?;
        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {product_id} was not found"
            )));
        }
        info!(removed, "products deleted");
        Ok(removed)
    }

    #[instrument(
        skip_all,
        fields(product_id = %key.product_id, condition = %key.condition),
        err
    )]
    pub async fn delete(&self, key: CompositeKey) -> Result<(), ServiceError> {
        let record = self.get(key).await?;
        self.store.delete(&record).await?;
        info!(record_id = %record.id(), "product deleted");
        Ok(())
    }
}

fn log_outcome(record: &ProductRecord, outcome: &AdjustmentOutcome) {
    if outcome.reordered {
        info!(
            record_id = %record.id(),
            restock_level = record.restock_level(),
            reorder_amount = record.reorder_amount(),
            quantity = outcome.quantity,
            "reorder triggered"
        );
    }
    info!(
        record_id = %record.id(),
        previous = outcome.previous,
        quantity = outcome.quantity,
        "quantity updated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::InMemoryProductStore;

    fn service() -> InventoryService<Arc<InMemoryProductStore>> {
        InventoryService::new(Arc::new(InMemoryProductStore::new()))
    }

    fn product(condition: Condition, quantity: i64, restock: i64, reorder: i64) -> NewProduct {
        NewProduct {
            product_id: ProductId::new(10001),
            product_name: "Green Apple".to_string(),
            quantity,
            condition,
            restock_level: restock,
            reorder_amount: reorder,
        }
    }

    fn key(condition: Condition) -> CompositeKey {
        CompositeKey::new(ProductId::new(10001), condition)
    }

    #[tokio::test]
    async fn second_create_with_same_key_conflicts() {
        let svc = service();
        svc.create(product(Condition::OpenBox, 5, 2, 10)).await.unwrap();

        let err = svc
            .create(product(Condition::OpenBox, 5, 2, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(
            err.to_string(),
            "Product 10001 with condition OPEN_BOX already exists"
        );

        // Another condition of the same product is a distinct record.
        svc.create(product(Condition::Used, 1, 0, 0)).await.unwrap();
        assert_eq!(svc.find_by_id(ProductId::new(10001)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_does_not_reorder() {
        let svc = service();
        let rec = svc.create(product(Condition::New, 5, 10, 50)).await.unwrap();
        assert_eq!(rec.quantity(), 5);
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let svc = service();
        let mut p = product(Condition::New, -1, 0, 0);
        assert!(matches!(
            svc.create(p.clone()).await.unwrap_err(),
            ServiceError::BadRequest(_)
        ));
        p.quantity = 1;
        p.product_name = "  ".to_string();
        assert!(matches!(
            svc.create(p).await.unwrap_err(),
            ServiceError::BadRequest(_)
        ));
        assert!(svc.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decrease_by_zero_triggers_reorder() {
        let svc = service();
        svc.create(product(Condition::New, 5, 10, 50)).await.unwrap();

        let rec = svc
            .adjust(key(Condition::New), QuantityAdjustment::decrease(0).unwrap())
            .await
            .unwrap();
        assert_eq!(rec.quantity(), 55);
    }

    #[tokio::test]
    async fn over_decrease_is_forbidden_and_keeps_quantity() {
        let svc = service();
        svc.create(product(Condition::Used, 5, 0, 0)).await.unwrap();

        let err = svc
            .adjust(key(Condition::Used), QuantityAdjustment::decrease(6).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(svc.get(key(Condition::Used)).await.unwrap().quantity(), 5);
    }

    #[tokio::test]
    async fn adjust_missing_record_is_not_found() {
        let svc = service();
        let err = svc
            .adjust(key(Condition::New), QuantityAdjustment::increase(1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn increase_and_set_persist() {
        let svc = service();
        svc.create(product(Condition::OpenBox, 5, 0, 0)).await.unwrap();

        svc.adjust(key(Condition::OpenBox), QuantityAdjustment::increase(3).unwrap())
            .await
            .unwrap();
        assert_eq!(svc.get(key(Condition::OpenBox)).await.unwrap().quantity(), 8);

        svc.adjust(key(Condition::OpenBox), QuantityAdjustment::set(2).unwrap())
            .await
            .unwrap();
        assert_eq!(svc.get(key(Condition::OpenBox)).await.unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn update_moving_onto_taken_condition_conflicts() {
        let svc = service();
        svc.create(product(Condition::New, 5, 0, 0)).await.unwrap();
        svc.create(product(Condition::Used, 5, 0, 0)).await.unwrap();

        let err = svc
            .update(
                key(Condition::Used),
                ProductUpdate {
                    product_id: ProductId::new(10001),
                    product_name: "Green Apple".to_string(),
                    quantity: 1,
                    condition: Some(Condition::New),
                    restock_level: 0,
                    reorder_amount: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(svc.get(key(Condition::Used)).await.unwrap().quantity(), 5);
    }

    #[tokio::test]
    async fn update_rejects_renames() {
        let svc = service();
        svc.create(product(Condition::New, 5, 0, 0)).await.unwrap();

        let err = svc
            .update(
                key(Condition::New),
                ProductUpdate {
                    product_id: ProductId::new(10001),
                    product_name: "Red Apple".to_string(),
                    quantity: 1,
                    condition: None,
                    restock_level: 0,
                    reorder_amount: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn deletes_report_missing_records() {
        let svc = service();
        svc.create(product(Condition::New, 5, 0, 0)).await.unwrap();
        svc.create(product(Condition::Used, 5, 0, 0)).await.unwrap();

        svc.delete(key(Condition::Used)).await.unwrap();
        assert!(matches!(
            svc.delete(key(Condition::Used)).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));

        assert_eq!(svc.delete_all(ProductId::new(10001)).await.unwrap(), 1);
        assert!(matches!(
            svc.delete_all(ProductId::new(10001)).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn lookups_filter_by_name_and_condition() {
        let svc = service();
        svc.create(product(Condition::New, 5, 0, 0)).await.unwrap();
        svc.create(product(Condition::Used, 5, 0, 0)).await.unwrap();

        assert_eq!(svc.find_by_name("Green Apple").await.unwrap().len(), 2);
        assert!(svc.find_by_name("Pear").await.unwrap().is_empty());
        assert_eq!(svc.find_by_condition(Condition::Used).await.unwrap().len(), 1);
        assert_eq!(
            svc.find_by_name_and_condition("Green Apple", Condition::New)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(svc
            .find_by_id_and_condition(key(Condition::OpenBox))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rename_is_reported_before_invalid_fields() {
        let svc = service();
        svc.create(product(Condition::New, 5, 0, 0)).await.unwrap();

        let err = svc
            .update(
                key(Condition::New),
                ProductUpdate {
                    product_id: ProductId::new(10001),
                    product_name: "Red Apple".to_string(),
                    quantity: -1,
                    condition: None,
                    restock_level: 0,
                    reorder_amount: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref msg) if msg == "Product Name Conflict"));
        assert_eq!(svc.get(key(Condition::New)).await.unwrap().quantity(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decreases_lose_no_updates() {
        const TASKS: i64 = 50;
        let svc = service();
        svc.create(product(Condition::Used, 1000, 0, 0)).await.unwrap();

        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.adjust(key(Condition::Used), QuantityAdjustment::decrease(1).unwrap())
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            svc.get(key(Condition::Used)).await.unwrap().quantity(),
            1000 - TASKS
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_admit_exactly_one() {
        let svc = service();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.create(product(Condition::OpenBox, 5, 0, 0)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ServiceError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(svc.find_by_id(ProductId::new(10001)).await.unwrap().len(), 1);
    }
}
