use axum::{Router, routing::get};

use super::handlers;
use crate::utils::types::Pool;

pub fn get_routes() -> Router<Pool> {
    Router::new().route(
        "/stores/{id}/reviews",
        get(handlers::get_store_reviews).post(handlers::create_review),
    )
}
