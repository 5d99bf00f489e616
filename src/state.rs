//! Shared application state handed to every HTTP handler.

use crate::directory::Directory;
use crate::directory::snapshot::SnapshotCache;
use crate::keyserver::RequestAuthenticator;
use crate::processor::Processor;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the request path needs, behind one `Arc`.
pub struct AppState {
    /// Directory service; the mutex serializes transaction batches so the
    /// known-rooms index is never read stale within a batch.
    pub directory: Mutex<Directory>,
    /// Event router for inbound transactions.
    pub processor: Processor,
    /// The publishable-rooms snapshot (lock-free reads).
    pub snapshot: Arc<SnapshotCache>,
    /// Federation request-auth delegate.
    pub authenticator: Arc<dyn RequestAuthenticator>,
    /// Token the homeserver must present on transaction pushes.
    pub hs_token: String,
}
