//! Infrastructure layer: product stores and the inventory service on top of them.

pub mod service;
pub mod store;

pub use service::{InventoryService, ServiceError};
pub use store::{
    InMemoryProductStore, Mutation, PostgresProductStore, ProductFilter, ProductStore, StoreError,
};
