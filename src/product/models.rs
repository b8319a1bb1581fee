use crate::schema::products;
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Produce categories carried by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Fruit,
    Veggie,
    Wheat,
    SugarCane,
    Lentils,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fruit => "FRUIT",
            Category::Veggie => "VEGGIE",
            Category::Wheat => "WHEAT",
            Category::SugarCane => "SUGAR_CANE",
            Category::Lentils => "LENTILS",
        }
    }

    pub fn parse(value: &str) -> Option<Category> {
        match value {
            "FRUIT" => Some(Category::Fruit),
            "VEGGIE" => Some(Category::Veggie),
            "WHEAT" => Some(Category::Wheat),
            "SUGAR_CANE" => Some(Category::SugarCane),
            "LENTILS" => Some(Category::Lentils),
            _ => None,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Serialize)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Product {
    pub id: i32,
    pub store_id: i32,
    pub title: String,
    pub description: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub category: String,
    pub image: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = products)]
pub struct NewProductRow {
    pub store_id: i32,
    pub title: String,
    pub description: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub category: String,
    pub image: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub price: BigDecimal,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub category: Category,
    pub image: Option<String>,
}

/// Stock is deliberately absent here: quantity only moves through order
/// placement and cancellation.
#[derive(Deserialize, Validate)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub category: Option<Category>,
    pub image: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = products)]
pub struct UpdateProductRow {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub category: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub store_id: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}
