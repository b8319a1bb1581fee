use axum::{
    Router,
    routing::{delete, get, post},
};

use super::handlers;
use crate::utils::types::Pool;

pub fn get_routes() -> Router<Pool> {
    Router::new()
        .route(
            "/cart",
            get(handlers::get_cart)
                .post(handlers::add_products_to_cart)
                .delete(handlers::clear_cart),
        )
        .route("/cart/merge", post(handlers::merge_cart))
        .route(
            "/cart/{product_id}",
            delete(handlers::remove_product_from_cart),
        )
}
