use core::fmt;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::Deserialize;

use stockroom_core::{DomainError, DomainResult, ProductId};
use stockroom_inventory::{Condition, NewProduct, ProductUpdate};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /inventory` and `PUT /inventory/{product_id}`.
///
/// Integer fields also accept strings holding an integer, as sent by form clients.
#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    #[serde(deserialize_with = "flexible_int")]
    pub product_id: i64,
    pub product_name: String,
    #[serde(deserialize_with = "flexible_int")]
    pub quantity: i64,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(deserialize_with = "flexible_int")]
    pub restock_level: i64,
    #[serde(deserialize_with = "flexible_int")]
    pub reorder_amount: i64,
}

impl ProductPayload {
    fn condition(&self) -> DomainResult<Option<Condition>> {
        self.condition
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse)
            .transpose()
    }

    pub fn into_new_product(self) -> DomainResult<NewProduct> {
        let condition = self.condition()?.unwrap_or_default();
        Ok(NewProduct {
            product_id: ProductId::new(self.product_id),
            product_name: self.product_name,
            quantity: self.quantity,
            condition,
            restock_level: self.restock_level,
            reorder_amount: self.reorder_amount,
        })
    }

    pub fn into_update(self) -> DomainResult<ProductUpdate> {
        let condition = self.condition()?;
        Ok(ProductUpdate {
            product_id: ProductId::new(self.product_id),
            product_name: self.product_name,
            quantity: self.quantity,
            condition,
            restock_level: self.restock_level,
            reorder_amount: self.reorder_amount,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub product_name: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConditionQuery {
    pub condition: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustQuery {
    pub condition: Option<String>,
    pub value: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Treat absent and empty query values alike.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_condition(raw: &str) -> Result<Condition, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

/// Require a JSON content type, then decode the body.
///
/// Wrong or missing content type is 415; a body that does not decode into `T`
/// is 400 with serde's message, which names the offending field.
pub fn parse_json_body<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<T, axum::response::Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if !essence.eq_ignore_ascii_case("application/json") {
        tracing::warn!(content_type, "rejected request body");
        return Err(errors::json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "Content-Type must be application/json",
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| errors::bad_request(format!("invalid request body: {e}")))
}

/// An adjustment request's `condition` and `value`, checked in request order.
pub fn parse_adjust_query(query: AdjustQuery) -> Result<(Condition, i64), DomainError> {
    let (Some(condition), Some(value)) = (non_empty(query.condition), non_empty(query.value))
    else {
        return Err(DomainError::validation(
            "Value 'condition' and 'value' should be provided",
        ));
    };
    let value = stockroom_inventory::parse_quantity_value(&value)?;
    let condition = condition.parse()?;
    Ok((condition, value))
}

fn flexible_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleInt;

    impl Visitor<'_> for FlexibleInt {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer or a string holding an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(FlexibleInt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> Result<ProductPayload, serde_json::Error> {
        serde_json::from_value(v)
    }

    #[test]
    fn integer_fields_accept_numeric_strings() {
        let p = payload(json!({
            "product_id": "10001",
            "product_name": "Green Apple",
            "quantity": 5,
            "condition": "NEW",
            "restock_level": " 10 ",
            "reorder_amount": 50
        }))
        .unwrap();
        assert_eq!(p.product_id, 10001);
        assert_eq!(p.restock_level, 10);

        let product = p.into_new_product().unwrap();
        assert_eq!(product.condition, Condition::New);
    }

    #[test]
    fn non_integer_fields_are_rejected_by_name() {
        let err = payload(json!({
            "product_id": 1,
            "product_name": "Green Apple",
            "quantity": "five",
            "restock_level": 0,
            "reorder_amount": 0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("five"));

        let err = payload(json!({
            "product_id": 1,
            "product_name": "Green Apple",
            "restock_level": 0,
            "reorder_amount": 0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("quantity"));

        assert!(payload(json!({
            "product_id": 1.5,
            "product_name": "Green Apple",
            "quantity": 1,
            "restock_level": 0,
            "reorder_amount": 0
        }))
        .is_err());
    }

    #[test]
    fn missing_condition_defaults_on_create_and_keeps_on_update() {
        let body = json!({
            "product_id": 1,
            "product_name": "Green Apple",
            "quantity": 1,
            "restock_level": 0,
            "reorder_amount": 0
        });
        let create = payload(body.clone()).unwrap().into_new_product().unwrap();
        assert_eq!(create.condition, Condition::Unknown);

        let update = payload(body).unwrap().into_update().unwrap();
        assert_eq!(update.condition, None);
    }

    #[test]
    fn unknown_condition_is_not_coerced() {
        let p = payload(json!({
            "product_id": 1,
            "product_name": "Green Apple",
            "quantity": 1,
            "condition": "new",
            "restock_level": 0,
            "reorder_amount": 0
        }))
        .unwrap();
        assert!(matches!(p.into_new_product(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn adjust_query_checks_in_order() {
        let q = |condition: Option<&str>, value: Option<&str>| AdjustQuery {
            condition: condition.map(str::to_string),
            value: value.map(str::to_string),
        };

        let err = parse_adjust_query(q(Some("NEW"), None)).unwrap_err();
        assert_eq!(err.message(), "Value 'condition' and 'value' should be provided");

        // A bad value is reported before a bad condition.
        let err = parse_adjust_query(q(Some("BOGUS"), Some("abc"))).unwrap_err();
        assert_eq!(err.message(), "'value' not an integer");
        let err = parse_adjust_query(q(Some("BOGUS"), Some("-1"))).unwrap_err();
        assert_eq!(err.message(), "'value' should be non-negative");
        assert!(parse_adjust_query(q(Some("BOGUS"), Some("1"))).is_err());

        assert_eq!(
            parse_adjust_query(q(Some("USED"), Some("3"))).unwrap(),
            (Condition::Used, 3)
        );
    }

    #[test]
    fn body_requires_json_content_type() {
        let body = Bytes::from_static(br#"{"product_id":1}"#);

        let err = parse_json_body::<serde_json::Value>(&HeaderMap::new(), &body).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let err = parse_json_body::<serde_json::Value>(&headers, &body).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(parse_json_body::<serde_json::Value>(&headers, &body).is_ok());

        let err = parse_json_body::<ProductPayload>(&headers, &body).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
