use crate::schema::{order_items, orders};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Canonical order lifecycle. CANCELLED is terminal; everything else is a
/// plain forward transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "PENDING" => Some(OrderStatus::Pending),
            "PROCESSING" => Some(OrderStatus::Processing),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// What a requested status change amounts to.
#[derive(Debug, PartialEq, Eq)]
pub enum Transition {
    /// Plain status field update, no inventory side effect.
    Plain,
    /// Move into CANCELLED: status update plus stock restoration.
    CancelRestore,
    /// CANCELLED -> CANCELLED: nothing to do, nothing to restore.
    Noop,
    /// Leaving CANCELLED is not allowed.
    Rejected,
}

pub fn classify_transition(from: OrderStatus, to: OrderStatus) -> Transition {
    match (from, to) {
        (OrderStatus::Cancelled, OrderStatus::Cancelled) => Transition::Noop,
        (OrderStatus::Cancelled, _) => Transition::Rejected,
        (_, OrderStatus::Cancelled) => Transition::CancelRestore,
        _ => Transition::Plain,
    }
}

/// Sum of price * quantity over the order lines, at current prices.
pub fn order_total<'a>(lines: impl IntoIterator<Item = (&'a BigDecimal, i32)>) -> BigDecimal {
    lines
        .into_iter()
        .map(|(price, quantity)| price * BigDecimal::from(quantity))
        .fold(BigDecimal::from(0), |acc, subtotal| acc + subtotal)
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total == 0 { 0 } else { (total + limit - 1) / limit }
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Serialize)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Order {
    pub id: i32,
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: BigDecimal,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Serialize)]
#[diesel(table_name = order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItem {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    /// Price at time of purchase, never recomputed from the product.
    pub price: BigDecimal,
}

#[derive(Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: BigDecimal,
}

// Serialize: the derived length check reports offending values through
// `ValidationError::add_param`, which needs the item type serializable.
#[derive(Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Deserialize, Validate)]
pub struct NewOrder {
    #[validate(length(min = 1), nested)]
    pub items: Vec<OrderItemInput>,
}

#[derive(Deserialize)]
pub struct UpdateOrderStatus {
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize, Debug)]
pub struct OrderFilters {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}
