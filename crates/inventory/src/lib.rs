//! Inventory domain module.
//!
//! Business rules for product records: the condition tag, the composite key,
//! quantity adjustments and the reorder policy. Pure logic (no IO, no HTTP,
//! no storage).

pub mod adjust;
pub mod condition;
pub mod record;

pub use adjust::{AdjustmentKind, QuantityAdjustment, Settled, parse_quantity_value, settle_quantity};
pub use condition::Condition;
pub use record::{AdjustmentOutcome, CompositeKey, NewProduct, ProductRecord, ProductUpdate};
