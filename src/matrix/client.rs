//! Reqwest-backed homeserver client.

use super::{Homeserver, MatrixError, MatrixEvent, PublicRoomEntry};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct HierarchyResponse {
    #[serde(default)]
    rooms: Vec<PublicRoomEntry>,
}

/// Homeserver client authenticated with the appservice access token.
#[derive(Clone)]
pub struct HttpHomeserver {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpHomeserver {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, MatrixError> {
        let res = req.bearer_auth(&self.access_token).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            if !body.is_empty() {
                tracing::error!(status = %status, body = %body, "Homeserver request failed");
            }
            return Err(MatrixError::Status { status, body });
        }
        Ok(res)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Homeserver for HttpHomeserver {
    async fn whoami(&self) -> Result<String, MatrixError> {
        let res = self
            .execute(self.http.get(self.url("/_matrix/client/r0/account/whoami")))
            .await?;
        let body: WhoamiResponse = res.json().await?;
        Ok(body.user_id)
    }

    async fn join_room(&self, room_id_or_alias: &str) -> Result<String, MatrixError> {
        let path = format!(
            "/_matrix/client/r0/join/{}",
            urlencoding::encode(room_id_or_alias)
        );
        let res = self.execute(self.http.post(self.url(&path))).await?;
        let body: RoomIdResponse = res.json().await?;
        Ok(body.room_id)
    }

    async fn resolve_room(&self, room_id_or_alias: &str) -> Result<String, MatrixError> {
        // Already a room id, nothing to resolve.
        if room_id_or_alias.starts_with('!') {
            return Ok(room_id_or_alias.to_string());
        }

        let path = format!(
            "/_matrix/client/r0/directory/room/{}",
            urlencoding::encode(room_id_or_alias)
        );
        let res = self.execute(self.http.get(self.url(&path))).await?;
        let body: RoomIdResponse = res.json().await?;
        Ok(body.room_id)
    }

    async fn room_state(&self, room_id: &str) -> Result<Vec<MatrixEvent>, MatrixError> {
        let path = format!(
            "/_matrix/client/r0/rooms/{}/state",
            urlencoding::encode(room_id)
        );
        let res = self.execute(self.http.get(self.url(&path))).await?;
        Ok(res.json().await?)
    }

    async fn hierarchy(&self, room_id: &str) -> Result<Vec<PublicRoomEntry>, MatrixError> {
        let path = format!(
            "/_matrix/client/v1/rooms/{}/hierarchy?limit=1000&max_depth=10",
            urlencoding::encode(room_id)
        );
        let res = self.execute(self.http.get(self.url(&path))).await?;
        let body: HierarchyResponse = res.json().await?;
        Ok(body.rooms)
    }

    async fn send_notice(&self, room_id: &str, body: &str) -> Result<(), MatrixError> {
        let path = format!(
            "/_matrix/client/r0/rooms/{}/send/m.room.message/{}",
            urlencoding::encode(room_id),
            uuid::Uuid::new_v4()
        );
        self.execute(
            self.http
                .put(self.url(&path))
                .json(&json!({"msgtype": "m.notice", "body": body})),
        )
        .await?;
        Ok(())
    }

    async fn send_reaction(
        &self,
        room_id: &str,
        event_id: &str,
        key: &str,
    ) -> Result<(), MatrixError> {
        let path = format!(
            "/_matrix/client/r0/rooms/{}/send/m.reaction/{}",
            urlencoding::encode(room_id),
            uuid::Uuid::new_v4()
        );
        self.execute(self.http.put(self.url(&path)).json(&json!({
            "m.relates_to": {
                "rel_type": "m.annotation",
                "event_id": event_id,
                "key": key,
            }
        })))
        .await?;
        Ok(())
    }
}
