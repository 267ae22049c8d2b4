use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId, RecordId};

use crate::adjust::{QuantityAdjustment, settle_quantity};
use crate::condition::Condition;

/// The `(product_id, condition)` pair. Unique across live records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub product_id: ProductId,
    pub condition: Condition,
}

impl CompositeKey {
    pub fn new(product_id: ProductId, condition: Condition) -> Self {
        Self {
            product_id,
            condition,
        }
    }
}

impl core::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Product {} with condition {}",
            self.product_id, self.condition
        )
    }
}

/// A product record as held by the store.
///
/// Only stores build these (see `NewProduct::into_record`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ProductRecord {
    id: RecordId,
    product_id: ProductId,
    product_name: String,
    quantity: i64,
    condition: Condition,
    restock_level: i64,
    reorder_amount: i64,
}

impl ProductRecord {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn restock_level(&self) -> i64 {
        self.restock_level
    }

    pub fn reorder_amount(&self) -> i64 {
        self.reorder_amount
    }

    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.product_id, self.condition)
    }

    /// Apply a quantity adjustment followed by the reorder policy.
    ///
    /// On error the record is left untouched.
    pub fn apply_adjustment(
        &mut self,
        adjustment: QuantityAdjustment,
    ) -> DomainResult<AdjustmentOutcome> {
        let previous = self.quantity;
        let target = adjustment.target(previous)?;
        let settled = settle_quantity(
            target,
            self.condition,
            self.restock_level,
            self.reorder_amount,
        )?;

        self.quantity = settled.quantity;
        Ok(AdjustmentOutcome {
            previous,
            quantity: settled.quantity,
            reordered: settled.reordered,
        })
    }

    /// Replace the mutable fields from a full update payload, then run the
    /// reorder policy.
    ///
    /// The payload must name the same product (id and name) as the record.
    pub fn apply_update(&mut self, update: &ProductUpdate) -> DomainResult<AdjustmentOutcome> {
        if update.product_name != self.product_name {
            return Err(DomainError::conflict("Product Name Conflict"));
        }
        if update.product_id != self.product_id {
            return Err(DomainError::conflict("Product ID Conflict"));
        }
        update.validate()?;

        let condition = update.condition.unwrap_or(self.condition);
        let settled = settle_quantity(
            update.quantity,
            condition,
            update.restock_level,
            update.reorder_amount,
        )?;

        let previous = self.quantity;
        self.condition = condition;
        self.quantity = settled.quantity;
        self.restock_level = update.restock_level;
        self.reorder_amount = update.reorder_amount;

        Ok(AdjustmentOutcome {
            previous,
            quantity: settled.quantity,
            reordered: settled.reordered,
        })
    }
}

/// What a mutation did to a record's quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdjustmentOutcome {
    pub previous: i64,
    pub quantity: i64,
    pub reordered: bool,
}

/// A product that has not been stored yet (no surrogate id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub condition: Condition,
    pub restock_level: i64,
    pub reorder_amount: i64,
}

impl NewProduct {
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.product_id, self.condition)
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_fields(
            &self.product_name,
            self.quantity,
            self.restock_level,
            self.reorder_amount,
        )
    }

    /// Turn into a stored record. Only stores call this.
    pub fn into_record(self, id: RecordId) -> ProductRecord {
        ProductRecord {
            id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            condition: self.condition,
            restock_level: self.restock_level,
            reorder_amount: self.reorder_amount,
        }
    }
}

/// Full replacement payload for an existing record.
///
/// `condition: None` keeps the stored condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub condition: Option<Condition>,
    pub restock_level: i64,
    pub reorder_amount: i64,
}

impl ProductUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        validate_fields(
            &self.product_name,
            self.quantity,
            self.restock_level,
            self.reorder_amount,
        )
    }
}

/// Matches the `VARCHAR(128)` column of the relational store.
pub const MAX_NAME_LEN: usize = 128;

fn validate_fields(
    product_name: &str,
    quantity: i64,
    restock_level: i64,
    reorder_amount: i64,
) -> DomainResult<()> {
    if product_name.trim().is_empty() {
        return Err(DomainError::validation("product_name cannot be empty"));
    }
    if product_name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "product_name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    for (field, value) in [
        ("quantity", quantity),
        ("restock_level", restock_level),
        ("reorder_amount", reorder_amount),
    ] {
        if value < 0 {
            return Err(DomainError::validation(format!(
                "'{field}' should be non-negative"
            )));
        }
    }
    Ok(())
}
