//! Quantity adjustments and the reorder policy.

use stockroom_core::{DomainError, DomainResult};

use crate::condition::Condition;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AdjustmentKind {
    /// `quantity += value`
    Increase,
    /// `quantity -= value`, refused when it would go negative.
    Decrease,
    /// `quantity = value`
    Set,
}

impl AdjustmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentKind::Increase => "increase",
            AdjustmentKind::Decrease => "decrease",
            AdjustmentKind::Set => "set",
        }
    }
}

/// A validated quantity mutation. `value` is never negative.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuantityAdjustment {
    kind: AdjustmentKind,
    value: i64,
}

impl QuantityAdjustment {
    pub fn new(kind: AdjustmentKind, value: i64) -> DomainResult<Self> {
        if value < 0 {
            return Err(DomainError::validation("'value' should be non-negative"));
        }
        Ok(Self { kind, value })
    }

    pub fn increase(value: i64) -> DomainResult<Self> {
        Self::new(AdjustmentKind::Increase, value)
    }

    pub fn decrease(value: i64) -> DomainResult<Self> {
        Self::new(AdjustmentKind::Decrease, value)
    }

    pub fn set(value: i64) -> DomainResult<Self> {
        Self::new(AdjustmentKind::Set, value)
    }

    pub fn kind(&self) -> AdjustmentKind {
        self.kind
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Quantity after this adjustment, before the reorder policy.
    pub(crate) fn target(&self, current: i64) -> DomainResult<i64> {
        match self.kind {
            AdjustmentKind::Increase => current
                .checked_add(self.value)
                .ok_or_else(|| DomainError::validation("quantity overflow")),
            AdjustmentKind::Decrease => {
                if self.value > current {
                    return Err(DomainError::forbidden(
                        "Inventory decreased to negative prohibited.",
                    ));
                }
                Ok(current - self.value)
            }
            AdjustmentKind::Set => Ok(self.value),
        }
    }
}

/// Parse the raw `value` query parameter of an adjustment request.
pub fn parse_quantity_value(raw: &str) -> DomainResult<i64> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| DomainError::validation("'value' not an integer"))?;
    if value < 0 {
        return Err(DomainError::validation("'value' should be non-negative"));
    }
    Ok(value)
}

/// Outcome of the reorder policy for a candidate quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settled {
    pub quantity: i64,
    pub reordered: bool,
}

/// Reorder policy: a NEW record whose quantity is below its restock level is
/// topped up by `reorder_amount`, once. The result is not re-checked.
pub fn settle_quantity(
    quantity: i64,
    condition: Condition,
    restock_level: i64,
    reorder_amount: i64,
) -> DomainResult<Settled> {
    if condition == Condition::New && quantity < restock_level {
        let quantity = quantity
            .checked_add(reorder_amount)
            .ok_or_else(|| DomainError::validation("quantity overflow on reorder"))?;
        return Ok(Settled {
            quantity,
            reordered: true,
        });
    }
    Ok(Settled {
        quantity,
        reordered: false,
    })
}
