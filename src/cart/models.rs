use crate::schema::{cart_products, carts};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Serialize)]
#[diesel(table_name = carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Cart {
    pub id: i32,
    pub user_id: Uuid,
    pub updated_at: NaiveDate,
}

#[derive(Insertable)]
#[diesel(table_name = carts)]
pub struct NewCart {
    pub user_id: Uuid,
    pub updated_at: NaiveDate,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = cart_products)]
pub struct CartProductRow {
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
}

// Serialize: required by the derived length check on the payload vec,
// which reports offending values through `ValidationError::add_param`.
#[derive(Serialize, Deserialize, Validate)]
pub struct CartItemInput {
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Deserialize, Validate)]
pub struct CartItemsPayload {
    #[validate(length(min = 1), nested)]
    pub items: Vec<CartItemInput>,
}

/// One product line of the aggregated cart view.
#[derive(Serialize, Deserialize, Debug)]
pub struct CartLine {
    pub id: i32,
    pub title: String,
    pub price: f64,
    pub quantity: i32,
    pub image: Option<String>,
}

#[derive(Serialize)]
pub struct CartWithProducts {
    #[serde(flatten)]
    pub cart: Cart,
    pub products: Vec<CartLine>,
}
