use std::sync::Arc;

use tracing::info;

use stockroom_infra::{
    InMemoryProductStore, InventoryService, PostgresProductStore, ProductStore, StoreError,
};

use crate::config::AppConfig;

/// Store handle shared by every request.
pub type SharedStore = Arc<dyn ProductStore>;

/// Application services shared across handlers.
pub struct AppServices {
    pub inventory: InventoryService<SharedStore>,
    backend: &'static str,
}

impl AppServices {
    pub fn new(store: SharedStore, backend: &'static str) -> Self {
        Self {
            inventory: InventoryService::new(store),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryProductStore::new()), "in_memory")
    }

    /// Which store backs this process (`in_memory` or `postgres`).
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

/// Pick the store from config: PostgreSQL when a database URL is set, memory otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let Some(url) = config.database_url.as_deref() else {
        info!(backend = "in_memory", "product store ready");
        return Ok(AppServices::in_memory());
    };

    let store = PostgresProductStore::connect(url, config.database_max_connections).await?;
    store.migrate().await?;
    info!(
        backend = "postgres",
        max_connections = config.database_max_connections,
        "product store ready"
    );
    Ok(AppServices::new(Arc::new(store), "postgres"))
}
