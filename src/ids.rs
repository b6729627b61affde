//! Process-wide identity and request-id state.
//!
//! The teacher hard-codes `DEFAULT_SENDER_ID` as a constant
//! (`channel::DEFAULT_SENDER_ID`). The sender identity here is instead
//! generated once per process, as `<base>-<uuid>`, and the request-id
//! counter is a single atomic shared by every requestor in a session -- both
//! are owned by the `Session`, not hidden globals, so tests can stand up
//! multiple independent sessions in one process.

use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

/// Generates the sender identifier used as the `source_id` of every
/// outbound envelope: `<base>-<random UUID>`.
pub fn sender_id(base: &str) -> String {
    format!("{}-{}", base, Uuid::new_v4())
}

/// A monotonically increasing, wrapping, never-zero request-id counter.
///
/// `0` is reserved by the protocol as "unset" (spontaneous broadcasts never
/// carry a `requestId`), so the counter skips it on wraparound.
#[derive(Debug, Default)]
pub struct RequestIds(AtomicI64);

impl RequestIds {
    pub fn new() -> Self {
        RequestIds(AtomicI64::new(0))
    }

    /// Allocate the next request id. Strictly monotone within a process
    /// until it wraps; wraps to `1`, never `0` (spec.md §4.2).
    pub fn next(&self) -> i64 {
        let id = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        if id > 0 {
            return id;
        }
        // `AtomicI64` wraps `i64::MAX` to `i64::MIN` rather than back to
        // `0`, so any non-positive result means we overflowed. Reset the
        // counter so ids stay positive and wrap to `1`, not to a large
        // negative number.
        self.0.store(1, Ordering::SeqCst);
        1
    }
}
