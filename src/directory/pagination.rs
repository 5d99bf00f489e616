//! Token-based pagination over the current snapshot.
//!
//! Pure function of (snapshot, since, limit). Tokens are stringified offsets
//! into the live snapshot; they are not frozen across a background refresh,
//! so a page served right after a refresh may shift. That is the documented
//! trade-off, not a bug.

use crate::matrix::PublicRoomEntry;

/// One bounded page of the snapshot plus continuation tokens.
#[derive(Debug, PartialEq)]
pub struct Page<'a> {
    pub chunk: &'a [PublicRoomEntry],
    pub next_batch: Option<String>,
    pub prev_batch: Option<String>,
    /// Full snapshot length at the moment of the call.
    pub total: usize,
}

/// Compute the page starting at `since` with at most `limit` entries.
///
/// A zero/absent limit means "the rest of the list". `since` past the end of
/// the snapshot clamps to an empty final page rather than failing.
pub fn paginate(snapshot: &[PublicRoomEntry], since: usize, limit: usize) -> Page<'_> {
    let len = snapshot.len();
    let start = since.min(len);
    let mut end = len.min(start.saturating_add(limit));
    if end == start {
        end = len;
    }

    let next_batch = (end != len).then(|| (end + 1).to_string());
    let prev_batch = (start != 0).then(|| (start - 1).to_string());

    Page {
        chunk: &snapshot[start..end],
        next_batch,
        prev_batch,
        total: len,
    }
}
