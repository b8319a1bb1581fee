use listenfd::ListenFd;
use std::env;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "farm_shop=debug,info".into()),
        )
        .init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tokio::task::spawn_blocking(move || farm_shop::run_migrations(&db_url))
        .await
        .expect("migration task failed")
        .expect("failed to run migrations");

    let pool = farm_shop::pool::get_pool().await.expect("db pool");

    let app = farm_shop::app(pool);

    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0).unwrap() {
        // if we are given a tcp listener on listen fd 0, we use that one
        Some(listener) => {
            listener.set_nonblocking(true).unwrap();
            TcpListener::from_std(listener).unwrap()
        }
        // otherwise fall back to local listening
        None => TcpListener::bind("127.0.0.1:3000").await.unwrap(),
    };

    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}
