use std::sync::Arc;

use thiserror::Error;

use stockroom_core::{DomainError, DomainResult, ProductId};
use stockroom_inventory::{AdjustmentOutcome, CompositeKey, Condition, NewProduct, ProductRecord};

/// Product store operation error.
///
/// These are **infrastructure errors** (storage, uniqueness enforcement) as
/// opposed to domain errors. A mutation rejected by domain rules surfaces as
/// `Rejected` and nothing is persisted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(CompositeKey),

    #[error("{0} was not found")]
    NotFound(String),

    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Predicate over product records. Unset fields match everything; set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub condition: Option<Condition>,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_product_id(mut self, product_id: ProductId) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn key(key: CompositeKey) -> Self {
        Self::all()
            .with_product_id(key.product_id)
            .with_condition(key.condition)
    }

    pub fn matches(&self, record: &ProductRecord) -> bool {
        self.product_id.is_none_or(|id| record.product_id() == id)
            && self
                .product_name
                .as_deref()
                .is_none_or(|name| record.product_name() == name)
            && self.condition.is_none_or(|c| record.condition() == c)
    }
}

/// In-place change to a stored record, run inside the store's atomic
/// read-modify-write. Returning an error aborts without persisting.
pub type Mutation = Box<dyn FnOnce(&mut ProductRecord) -> DomainResult<AdjustmentOutcome> + Send>;

/// Persistence boundary for product records.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - assign a fresh surrogate id on `create` and never reuse one
/// - enforce `(product_id, condition)` uniqueness atomically on `create` and `modify`
/// - run `modify` as a single read-modify-write so concurrent mutations of the
///   same record cannot lose updates
/// - return query results in id (insertion) order
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    /// Persist a new record, assigning its id.
    async fn create(&self, product: NewProduct) -> Result<ProductRecord, StoreError>;

    /// Overwrite a stored record (matched by id).
    async fn save(&self, record: &ProductRecord) -> Result<(), StoreError>;

    /// Remove a stored record (matched by id).
    async fn delete(&self, record: &ProductRecord) -> Result<(), StoreError>;

    async fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, StoreError>;

    /// Remove every record matching `filter`, returning how many were removed.
    async fn delete_matching(&self, filter: &ProductFilter) -> Result<u64, StoreError>;

    /// Atomically load the record at `key`, apply `mutation` and persist the result.
    async fn modify(
        &self,
        key: CompositeKey,
        mutation: Mutation,
    ) -> Result<(ProductRecord, AdjustmentOutcome), StoreError>;
}

#[async_trait::async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn create(&self, product: NewProduct) -> Result<ProductRecord, StoreError> {
        (**self).create(product).await
    }

    async fn save(&self, record: &ProductRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }

    async fn delete(&self, record: &ProductRecord) -> Result<(), StoreError> {
        (**self).delete(record).await
    }

    async fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>, StoreError> {
        (**self).query(filter).await
    }

    async fn delete_matching(&self, filter: &ProductFilter) -> Result<u64, StoreError> {
        (**self).delete_matching(filter).await
    }

    async fn modify(
        &self,
        key: CompositeKey,
        mutation: Mutation,
    ) -> Result<(ProductRecord, AdjustmentOutcome), StoreError> {
        (**self).modify(key, mutation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::RecordId;

    fn record(product_id: i64, name: &str, condition: Condition) -> ProductRecord {
        NewProduct {
            product_id: ProductId::new(product_id),
            product_name: name.to_string(),
            quantity: 1,
            condition,
            restock_level: 0,
            reorder_amount: 0,
        }
        .into_record(RecordId::new(1))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ProductFilter::all().matches(&record(1, "Pear", Condition::Used)));
    }

    #[test]
    fn filter_fields_are_anded() {
        let rec = record(1, "Pear", Condition::Used);
        let f = ProductFilter::all().with_name("Pear");
        assert!(f.matches(&rec));
        assert!(!f.clone().with_condition(Condition::New).matches(&rec));
        assert!(f.with_condition(Condition::Used).matches(&rec));
        assert!(!ProductFilter::all().with_product_id(ProductId::new(2)).matches(&rec));
    }

    #[test]
    fn name_match_is_exact() {
        let rec = record(1, "Pear", Condition::Used);
        assert!(!ProductFilter::all().with_name("pear").matches(&rec));
    }
}
