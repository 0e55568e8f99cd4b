use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    /// Display-name snapshot; looked up from the catalog when omitted.
    pub product_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub user_name: String,
    pub user_location: Option<String>,
    pub status: Option<String>,
    /// Explicit total override. When present, the stored total is this value
    /// rather than the computed item sum.
    #[schema(value_type = Option<String>)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: i64,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: i64,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub product_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddItemResponse {
    #[schema(value_type = String)]
    pub item_total: Decimal,
}

/// Sparse patch: only supplied fields are written. Setting `total_price`
/// here overrides the running-total invariant on purpose.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_location: Option<String>,
    pub order_status: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total_price: Option<Decimal>,
}

impl UpdateOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.user_name.is_none()
            && self.user_location.is_none()
            && self.order_status.is_none()
            && self.total_price.is_none()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TotalPriceQuery {
    /// Inclusive lower bound; epoch when omitted.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound; now when omitted.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TotalPriceResponse {
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_is_detected() {
        assert!(UpdateOrderRequest::default().is_empty());
        let patch = UpdateOrderRequest {
            order_status: Some("confirmed".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
