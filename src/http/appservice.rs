//! Appservice transaction ingress.

use crate::error::ApiError;
use crate::matrix::MatrixEvent;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// One batch of events pushed by the homeserver.
#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(default)]
    events: Vec<MatrixEvent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TransactionQuery {
    access_token: Option<String>,
}

/// `PUT /_matrix/app/v1/transactions/{txnId}`
///
/// Events are processed one at a time in batch order. A failing event is
/// logged and never blocks the rest of the batch, but any failure makes the
/// whole transaction report an error so the homeserver retries it.
pub(super) async fn receive_transaction(
    State(state): State<Arc<AppState>>,
    Path(txn_id): Path<String>,
    Query(query): Query<TransactionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::check_homeserver_auth(&headers, query.access_token.as_deref(), &state.hs_token)?;

    let txn: Transaction = serde_json::from_slice(&body).map_err(|e| {
        error!(txn_id = %txn_id, error = %e, "Transaction body is not JSON");
        ApiError::NotJson
    })?;

    crate::metrics::record_transaction();
    info!(txn_id = %txn_id, events = txn.events.len(), "Processing transaction");

    let mut failed = 0usize;
    {
        // One lock for the whole batch: events are serialized in order and
        // the known-rooms index stays coherent with this batch's mutations.
        let mut directory = state.directory.lock().await;
        for ev in &txn.events {
            let result = state.processor.process_event(&mut directory, ev).await;
            crate::metrics::record_event(result.is_err());
            if let Err(e) = result {
                error!(txn_id = %txn_id, event_id = %ev.event_id, error = %e, "Event processing failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(ApiError::Internal(format!(
            "{failed} event(s) failed to process"
        )));
    }

    Ok(Json(json!({})))
}
