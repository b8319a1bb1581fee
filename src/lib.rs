pub mod auth;
pub mod cart;
pub mod order;
pub mod pool;
pub mod product;
pub mod review;
pub mod schema;
pub mod store;
pub mod utils;

use axum::Router;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use utils::types::Pool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

pub fn app(pool: Pool) -> Router {
    let routes = Router::new()
        .merge(auth::routes::get_routes())
        .merge(store::routes::get_routes())
        .merge(product::routes::get_routes())
        .merge(cart::routes::get_routes())
        .merge(order::routes::get_routes())
        .merge(review::routes::get_routes())
        .with_state(pool);

    Router::new()
        .nest("/api", routes)
        .fallback(utils::handler_404)
}

/// Blocking; call from `spawn_blocking` when inside the runtime.
pub fn run_migrations(db_url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel::Connection;
    use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;

    let mut conn =
        AsyncConnectionWrapper::<diesel_async::AsyncPgConnection>::establish(db_url)?;
    conn.run_pending_migrations(MIGRATIONS)?;

    Ok(())
}
