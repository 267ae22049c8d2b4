use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use stockroom_inventory::{AdjustmentKind, CompositeKey, QuantityAdjustment};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

type HandlerResult = Result<Response, Response>;

fn respond(result: HandlerResult) -> Response {
    result.unwrap_or_else(|e| e)
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    query
        .map(|Query(q)| q)
        .map_err(|e| errors::bad_request(e.body_text()))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    q: Result<Query<dto::ListQuery>, QueryRejection>,
) -> Response {
    respond(list_products_inner(&services, q).await)
}

async fn list_products_inner(
    services: &AppServices,
    q: Result<Query<dto::ListQuery>, QueryRejection>,
) -> HandlerResult {
    let q = query(q)?;
    let name = dto::non_empty(q.product_name);
    let condition = dto::non_empty(q.condition)
        .map(|c| dto::parse_condition(&c))
        .transpose()?;

    let inventory = &services.inventory;
    let records = match (name, condition) {
        (None, None) => inventory.find_all().await,
        (Some(name), None) => inventory.find_by_name(&name).await,
        (None, Some(condition)) => inventory.find_by_condition(condition).await,
        (Some(name), Some(condition)) => {
            inventory.find_by_name_and_condition(&name, condition).await
        }
    }
    .map_err(errors::service_error_to_response)?;

    tracing::debug!(count = records.len(), "listing products");
    Ok((StatusCode::OK, Json(records)).into_response())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    q: Result<Query<dto::ConditionQuery>, QueryRejection>,
) -> Response {
    respond(get_product_inner(&services, &id, q).await)
}

async fn get_product_inner(
    services: &AppServices,
    id: &str,
    q: Result<Query<dto::ConditionQuery>, QueryRejection>,
) -> HandlerResult {
    let product_id = dto::parse_product_id(id)?;
    let not_found = || {
        errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Product with id '{product_id}' was not found."),
        )
    };

    match dto::non_empty(query(q)?.condition) {
        Some(raw) => {
            let condition = dto::parse_condition(&raw)?;
            let record = services
                .inventory
                .find_by_id_and_condition(CompositeKey::new(product_id, condition))
                .await
                .map_err(errors::service_error_to_response)?
                .ok_or_else(not_found)?;
            Ok((StatusCode::OK, Json(record)).into_response())
        }
        None => {
            let records = services
                .inventory
                .find_by_id(product_id)
                .await
                .map_err(errors::service_error_to_response)?;
            if records.is_empty() {
                return Err(not_found());
            }
            Ok((StatusCode::OK, Json(records)).into_response())
        }
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(create_product_inner(&services, &headers, &body).await)
}

async fn create_product_inner(
    services: &AppServices,
    headers: &HeaderMap,
    body: &Bytes,
) -> HandlerResult {
    let payload: dto::ProductPayload = dto::parse_json_body(headers, body)?;
    let product = payload
        .into_new_product()
        .map_err(errors::domain_error_to_response)?;

    let record = services
        .inventory
        .create(product)
        .await
        .map_err(errors::service_error_to_response)?;

    let location = format!(
        "/inventory/{}?condition={}",
        record.product_id(),
        record.condition()
    );
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record),
    )
        .into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    q: Result<Query<dto::ConditionQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(update_product_inner(&services, &id, q, &headers, &body).await)
}

async fn update_product_inner(
    services: &AppServices,
    id: &str,
    q: Result<Query<dto::ConditionQuery>, QueryRejection>,
    headers: &HeaderMap,
    body: &Bytes,
) -> HandlerResult {
    let product_id = dto::parse_product_id(id)?;
    // Content type and body shape are checked before the query.
    let payload: dto::ProductPayload = dto::parse_json_body(headers, body)?;

    let raw = dto::non_empty(query(q)?.condition)
        .ok_or_else(|| errors::bad_request("Value 'condition' should be provided"))?;
    let condition = dto::parse_condition(&raw)?;

    let update = payload
        .into_update()
        .map_err(errors::domain_error_to_response)?;

    let record = services
        .inventory
        .update(CompositeKey::new(product_id, condition), update)
        .await
        .map_err(errors::service_error_to_response)?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub async fn increase(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    q: Result<Query<dto::AdjustQuery>, QueryRejection>,
) -> Response {
    respond(adjust(&services, &id, q, AdjustmentKind::Increase).await)
}

pub async fn decrease(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    q: Result<Query<dto::AdjustQuery>, QueryRejection>,
) -> Response {
    respond(adjust(&services, &id, q, AdjustmentKind::Decrease).await)
}

pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    q: Result<Query<dto::AdjustQuery>, QueryRejection>,
) -> Response {
    respond(adjust(&services, &id, q, AdjustmentKind::Set).await)
}

async fn adjust(
    services: &AppServices,
    id: &str,
    q: Result<Query<dto::AdjustQuery>, QueryRejection>,
    kind: AdjustmentKind,
) -> HandlerResult {
    let product_id = dto::parse_product_id(id)?;
    let (condition, value) =
        dto::parse_adjust_query(query(q)?).map_err(errors::domain_error_to_response)?;
    let adjustment =
        QuantityAdjustment::new(kind, value).map_err(errors::domain_error_to_response)?;

    let record = services
        .inventory
        .adjust(CompositeKey::new(product_id, condition), adjustment)
        .await
        .map_err(errors::service_error_to_response)?;
    Ok((StatusCode::OK, Json(record)).into_response())
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    respond(delete_product_inner(&services, &id).await)
}

async fn delete_product_inner(services: &AppServices, id: &str) -> HandlerResult {
    let product_id = dto::parse_product_id(id)?;
    services
        .inventory
        .delete_all(product_id)
        .await
        .map_err(errors::service_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn delete_condition(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, condition)): Path<(String, String)>,
) -> Response {
    respond(delete_condition_inner(&services, &id, &condition).await)
}

async fn delete_condition_inner(
    services: &AppServices,
    id: &str,
    condition: &str,
) -> HandlerResult {
    let product_id = dto::parse_product_id(id)?;
    let condition = dto::parse_condition(condition)?;
    services
        .inventory
        .delete(CompositeKey::new(product_id, condition))
        .await
        .map_err(errors::service_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
