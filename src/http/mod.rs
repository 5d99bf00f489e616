//! HTTP surface: appservice ingress, federation publication, health, metrics.

mod appservice;
mod federation;

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/_matrix/federation/v1/publicRooms",
            get(federation::public_rooms),
        )
        // Trailing-slash alias so federated callers with sloppy path joining
        // still match.
        .route(
            "/_matrix/federation/v1/publicRooms/",
            get(federation::public_rooms),
        )
        .route(
            "/_matrix/app/v1/transactions/:txn_id",
            put(appservice::receive_transaction),
        )
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
}

/// Serve the router until `shutdown` resolves.
pub async fn run(
    router: Router,
    address: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((address, port)).await?;
    info!(address = %address, port = port, "Listening for requests");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Liveness probe. No core logic.
async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

/// Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Default route: Matrix-style 404.
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errcode": "M_NOT_FOUND", "error": "Not found"})),
    )
}

/// Pull a bearer token off a request.
///
/// Accepts the `Authorization: Bearer` header, falling back to the legacy
/// `access_token` query parameter some homeservers still send.
pub(crate) fn bearer_token<'a>(
    headers: &'a HeaderMap,
    query_token: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        if !value.starts_with("Bearer") {
            tracing::warn!("Invalid Authorization header: expected a Bearer token");
            return None;
        }
        return value.strip_prefix("Bearer ").filter(|t| !t.is_empty());
    }

    query_token.filter(|t| !t.is_empty())
}

/// Require the homeserver token on an inbound appservice request.
pub(crate) fn check_homeserver_auth(
    headers: &HeaderMap,
    query_token: Option<&str>,
    hs_token: &str,
) -> Result<(), ApiError> {
    match bearer_token(headers, query_token) {
        Some(token) if token == hs_token => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Handler-level fixture: a full [`AppState`] wired to in-memory fakes.

    use crate::db::Database;
    use crate::directory::Directory;
    use crate::directory::snapshot::{RefreshMode, SnapshotCache};
    use crate::directory::testing::FakeHomeserver;
    use crate::keyserver::testing::FakeAuthenticator;
    use crate::processor::Processor;
    use crate::state::AppState;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    pub const HS_TOKEN: &str = "hs_secret";

    pub async fn app_state(
        hs: Arc<FakeHomeserver>,
        authenticator: Arc<FakeAuthenticator>,
    ) -> Arc<AppState> {
        let db = Database::new(":memory:").await.expect("db setup");
        let snapshot = Arc::new(SnapshotCache::new(
            db.clone(),
            hs.clone(),
            "!space:example.org",
            RefreshMode::Store,
        ));
        let processor = Processor::new(
            hs.clone(),
            Arc::clone(&snapshot),
            "@admin:example.org",
            "@directory:example.org",
        );
        Arc::new(AppState {
            directory: Mutex::new(Directory::new(db, hs)),
            processor,
            snapshot,
            authenticator,
            hs_token: HS_TOKEN.to_string(),
        })
    }
}
