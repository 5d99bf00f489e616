//! Federation publication endpoint.

use crate::directory::pagination::paginate;
use crate::error::ApiError;
use crate::keyserver::AuthCheckError;
use crate::matrix::PublicRoomEntry;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, Uri, header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Default, Deserialize)]
pub(super) struct PublicRoomsQuery {
    limit: Option<String>,
    since: Option<String>,
}

/// Response body for `GET /_matrix/federation/v1/publicRooms`.
#[derive(Debug, Serialize)]
pub(super) struct PublicRoomsResponse {
    chunk: Vec<PublicRoomEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_batch: Option<String>,
    total_room_count_estimate: usize,
}

/// Serve a paginated view of the current snapshot to a federated caller.
///
/// The signature check is delegated to the key server before any directory
/// data is touched.
pub(super) async fn public_rooms(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<PublicRoomsQuery>,
) -> Result<Json<PublicRoomsResponse>, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // Signing servers address us by the destination they signed for; the
    // X-Origin header overrides the Host header when a proxy rewrote it.
    let destination = headers
        .get("X-Origin")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let uri_with_query = format!("{}?{}", uri.path(), uri.query().unwrap_or_default());

    match state
        .authenticator
        .check_auth(auth_header, method.as_str(), &uri_with_query, destination)
        .await
    {
        Ok(()) => {}
        Err(AuthCheckError::Denied) => {
            error!(destination = %destination, "Federation request failed auth check");
            return Err(ApiError::Unauthorized);
        }
        Err(AuthCheckError::Transport(e)) => {
            error!(error = %e, "Key server unreachable");
            return Err(ApiError::Internal("key server unreachable".to_string()));
        }
    }

    let since = parse_param(query.since.as_deref(), "since")?;
    let limit = parse_param(query.limit.as_deref(), "limit")?;

    crate::metrics::record_public_rooms_request();

    let snapshot = state.snapshot.current();
    let page = paginate(&snapshot, since, limit);

    Ok(Json(PublicRoomsResponse {
        chunk: page.chunk.to_vec(),
        next_batch: page.next_batch,
        prev_batch: page.prev_batch,
        total_room_count_estimate: page.total,
    }))
}

/// Parse an optional integer query parameter; absent means zero, malformed
/// is the client's error rather than a silent default.
fn parse_param(raw: Option<&str>, name: &'static str) -> Result<usize, ApiError> {
    match raw {
        None | Some("") => Ok(0),
        Some(v) => v.parse().map_err(|_| ApiError::InvalidParam(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RoomRecord;
    use crate::directory::testing::FakeHomeserver;
    use crate::http::testing::app_state;
    use crate::keyserver::testing::FakeAuthenticator;
    use crate::state::AppState;
    use axum::http::HeaderValue;

    async fn get_public_rooms(
        state: Arc<AppState>,
        headers: HeaderMap,
        query: PublicRoomsQuery,
    ) -> Result<Json<PublicRoomsResponse>, ApiError> {
        public_rooms(
            State(state),
            Method::GET,
            Uri::from_static("/_matrix/federation/v1/publicRooms?limit=2"),
            headers,
            Query(query),
        )
        .await
    }

    async fn seed_rooms(state: &AppState, count: usize) {
        let directory = state.directory.lock().await;
        for i in 0..count {
            directory
                .database()
                .rooms()
                .upsert(&RoomRecord {
                    room_id: format!("!room{i}:example.org"),
                    canonical_alias: format!("#room{i}:example.org"),
                    name: format!("Room {i}"),
                    topic: String::new(),
                    avatar_url: String::new(),
                    joined_count: (count - i) as i64,
                    world_readable: false,
                    guests_can_join: false,
                })
                .await
                .expect("seed");
        }
    }

    #[tokio::test]
    async fn denied_signature_check_is_unauthorized() {
        let auth = Arc::new(FakeAuthenticator::default());
        *auth.deny.lock().unwrap() = true;
        let state = app_state(Arc::new(FakeHomeserver::default()), auth.clone()).await;

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.org"));

        let res = get_public_rooms(state, headers, PublicRoomsQuery::default()).await;
        assert!(matches!(res, Err(ApiError::Unauthorized)));

        // The delegate saw the request's method, path+query, and Host.
        let checks = auth.checks.lock().unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].0, "GET");
        assert_eq!(checks[0].1, "/_matrix/federation/v1/publicRooms?limit=2");
        assert_eq!(checks[0].2, "example.org");
    }

    #[tokio::test]
    async fn authenticated_request_gets_a_paginated_page() {
        let auth = Arc::new(FakeAuthenticator::default());
        let state = app_state(Arc::new(FakeHomeserver::default()), auth.clone()).await;
        seed_rooms(&state, 3).await;
        state.snapshot.refresh().await.expect("refresh");

        // X-Origin overrides the Host a proxy rewrote.
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("proxy.internal"));
        headers.insert("X-Origin", HeaderValue::from_static("example.org"));

        let query = PublicRoomsQuery {
            limit: Some("2".to_string()),
            since: None,
        };
        let res = get_public_rooms(state, headers, query).await.expect("page");

        assert_eq!(res.0.chunk.len(), 2);
        assert_eq!(res.0.next_batch.as_deref(), Some("3"));
        assert_eq!(res.0.prev_batch, None);
        assert_eq!(res.0.total_room_count_estimate, 3);

        let checks = auth.checks.lock().unwrap();
        assert_eq!(checks[0].2, "example.org");
    }

    #[tokio::test]
    async fn malformed_limit_is_a_client_error() {
        let state = app_state(
            Arc::new(FakeHomeserver::default()),
            Arc::new(FakeAuthenticator::default()),
        )
        .await;

        let query = PublicRoomsQuery {
            limit: Some("abc".to_string()),
            since: None,
        };
        let res = get_public_rooms(state, HeaderMap::new(), query).await;
        assert!(matches!(res, Err(ApiError::InvalidParam("limit"))));
    }

    #[test]
    fn absent_params_default_to_zero() {
        assert_eq!(parse_param(None, "since").unwrap(), 0);
        assert_eq!(parse_param(Some(""), "limit").unwrap(), 0);
    }

    #[test]
    fn integers_parse_and_garbage_is_a_client_error() {
        assert_eq!(parse_param(Some("25"), "limit").unwrap(), 25);
        assert!(matches!(
            parse_param(Some("abc"), "limit"),
            Err(ApiError::InvalidParam("limit"))
        ));
        assert!(matches!(
            parse_param(Some("-1"), "since"),
            Err(ApiError::InvalidParam("since"))
        ));
    }
}
