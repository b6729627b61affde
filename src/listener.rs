//! Listener registry: dispatches inbound envelopes, demultiplexed by
//! namespace, to interested parties. spec.md §3 ("Listener registry") and
//! §4.3 ("Listener discipline").
//!
//! The teacher dispatches by trying a fixed chain of namespace handlers in
//! order (`channel::Responder` / `handler::Chain`) -- a closed set known at
//! compile time. spec.md §4.3 calls for an open, thread-safe
//! `addListener`/`removeListener` registry instead, since the requestor
//! spins up a short-lived listener per call. This keeps the teacher's
//! per-namespace dispatch *shape* (a handler sees only messages on its
//! namespace) but makes registration dynamic.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::proto::CastMessage;

/// A listener sees either a message on a namespace it registered for, or a
/// single `socket_error` notification if the channel dies. Implementations
/// must not block -- they run on the channel's reader task (spec.md §4.3).
pub trait Listener: Send + Sync {
    fn message_received(&self, message: &CastMessage);
    fn socket_error(&self);
}

pub type SharedListener = Arc<dyn Listener>;

fn identity(listener: &SharedListener) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

#[derive(Default)]
struct Inner {
    by_namespace: HashMap<String, Vec<SharedListener>>,
    notified_of_error: HashSet<usize>,
}

/// Namespace -> ordered set of listeners. Registration order is preserved;
/// duplicate registrations of the same listener for the same namespace are
/// collapsed so it is invoked once per message (spec.md §3).
#[derive(Default, Clone)]
pub struct Registry(Arc<Mutex<Inner>>);

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn add(&self, listener: SharedListener, namespace: &str) {
        let mut inner = self.0.lock().expect("listener registry lock poisoned");
        let bucket = inner
            .by_namespace
            .entry(namespace.to_owned())
            .or_insert_with(Vec::new);
        if !bucket.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            bucket.push(listener);
        }
    }

    pub fn remove(&self, listener: &SharedListener) {
        let mut inner = self.0.lock().expect("listener registry lock poisoned");
        for bucket in inner.by_namespace.values_mut() {
            bucket.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    /// Snapshot the listeners for `namespace` without holding the registry
    /// lock across delivery (spec.md §5: "snapshots for delivery avoid
    /// holding the lock across listener callbacks").
    pub fn snapshot(&self, namespace: &str) -> Vec<SharedListener> {
        let inner = self.0.lock().expect("listener registry lock poisoned");
        inner
            .by_namespace
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Every listener registered for any namespace, deduplicated, in the
    /// order first seen. Used to deliver `socket_error` to everyone exactly
    /// once.
    pub fn snapshot_all(&self) -> Vec<SharedListener> {
        let inner = self.0.lock().expect("listener registry lock poisoned");
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for bucket in inner.by_namespace.values() {
            for listener in bucket {
                if seen.insert(identity(listener)) {
                    all.push(listener.clone());
                }
            }
        }
        all
    }

    /// Deliver `socket_error` to every still-registered listener, exactly
    /// once per listener for the lifetime of this registry (spec.md §4.3,
    /// invariant 3 in spec.md §8).
    pub fn notify_socket_error(&self) {
        let all = self.snapshot_all();
        let listeners = {
            let mut inner = self.0.lock().expect("listener registry lock poisoned");
            all.into_iter()
                .filter(|l| inner.notified_of_error.insert(identity(l)))
                .collect::<Vec<_>>()
        };
        for listener in listeners {
            listener.socket_error();
        }
    }
}
