use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn index(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Inventory REST API Service",
        "version": env!("CARGO_PKG_VERSION"),
        "paths": "/inventory",
        "store": services.backend(),
    }))
}
