//! Federation request-authentication delegate.
//!
//! Signed federation requests are not verified locally; the signature check
//! is delegated to an external key server keyed by method, path+query, and
//! destination host. The delegate sits behind [`RequestAuthenticator`] so the
//! publication endpoint can be exercised without a live key server.

use async_trait::async_trait;
use thiserror::Error;

/// Outcome of a delegated auth check that did not pass.
#[derive(Debug, Error)]
pub enum AuthCheckError {
    /// The key server rejected the request signature.
    #[error("federation request not authenticated")]
    Denied,
    /// The key server itself was unreachable or misbehaved.
    #[error("key server request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Verifies inbound federation requests before any directory data is read.
#[async_trait]
pub trait RequestAuthenticator: Send + Sync {
    async fn check_auth(
        &self,
        auth_header: &str,
        method: &str,
        uri_with_query: &str,
        destination: &str,
    ) -> Result<(), AuthCheckError>;
}

/// Client for the external key-verification service.
#[derive(Clone)]
pub struct KeyServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl KeyServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}


#[async_trait]
impl RequestAuthenticator for KeyServerClient {
    async fn check_auth(
        &self,
        auth_header: &str,
        method: &str,
        uri_with_query: &str,
        destination: &str,
    ) -> Result<(), AuthCheckError> {
        let url = format!("{}/_matrix/key/unstable/check_auth", self.base_url);
        let res = self
            .http
            .post(&url)
            .header("Authorization", auth_header)
            .header("X-Keys-Method", method)
            .header("X-Keys-URI", uri_with_query)
            .header("X-Keys-Destination", destination)
            .send()
            .await?;

        if res.status() != reqwest::StatusCode::OK {
            return Err(AuthCheckError::Denied);
        }

        Ok(())
    }
}
