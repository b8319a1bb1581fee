use axum::{Router, routing::get};

use super::handlers;
use crate::utils::types::Pool;

pub fn get_routes() -> Router<Pool> {
    Router::new()
        .route(
            "/stores",
            get(handlers::get_stores).post(handlers::create_store),
        )
        .route(
            "/stores/{id}",
            get(handlers::get_store_by_id)
                .patch(handlers::update_store)
                .delete(handlers::delete_store),
        )
}
