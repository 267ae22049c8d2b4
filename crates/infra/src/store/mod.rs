//! Product persistence.
//!
//! `ProductStore` is the seam; `InMemoryProductStore` backs tests and local
//! runs, `PostgresProductStore` backs deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;
pub use r#trait::{Mutation, ProductFilter, ProductStore, StoreError};
