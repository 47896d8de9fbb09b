use std::path::PathBuf;

use axum::{
    Router,
    routing::{get, post},
};

use crate::{analytics, health, settings, transactions, user};
use engine::Ledger;

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Ledger,
    /// Where receipt files live; used only for best-effort cleanup when a
    /// delete/edit orphans a file.
    pub upload_dir: PathBuf,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/users", get(user::list))
        .route("/users", post(user::create))
        .route(
            "/users/{id}",
            axum::routing::patch(user::update).get(user::detail),
        )
        .route("/users/{id}/toggle-active", post(user::toggle_active))
        .route("/transactions", get(transactions::month))
        .route("/transactions/deposit", post(transactions::deposit))
        .route("/transactions/withdrawal", post(transactions::withdrawal))
        .route("/transactions/expense", post(transactions::expense))
        .route("/transactions/search", get(transactions::search))
        .route(
            "/transactions/{id}",
            axum::routing::patch(transactions::update).delete(transactions::delete),
        )
        .route("/analytics/data", get(analytics::data))
        .route(
            "/settings",
            get(settings::list).put(settings::update),
        )
        .with_state(state)
}

pub async fn run(ledger: Ledger, upload_dir: PathBuf) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(ledger, upload_dir, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    ledger: Ledger,
    upload_dir: PathBuf,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { ledger, upload_dir };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    ledger: Ledger,
    upload_dir: PathBuf,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(ledger, upload_dir, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
