use axum::{
    routing::{delete, get, put},
    Router,
};

pub mod inventory;
pub mod system;

/// Router for the `/inventory` resource.
pub fn router() -> Router {
    Router::new()
        .route(
            "/inventory",
            get(inventory::list_products).post(inventory::create_product),
        )
        .route(
            "/inventory/:product_id",
            get(inventory::get_product)
                .put(inventory::update_product)
                .delete(inventory::delete_product),
        )
        .route("/inventory/:product_id/inc", put(inventory::increase))
        .route("/inventory/:product_id/dec", put(inventory::decrease))
        .route("/inventory/:product_id/update", put(inventory::set_quantity))
        .route(
            "/inventory/:product_id/condition/:condition",
            delete(inventory::delete_condition),
        )
}
