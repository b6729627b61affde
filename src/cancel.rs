//! Stream cancellation, folded in from the teacher's `stream-util` crate
//! (itself based on `stream-cancel@0.4.4` by Jon Gjengset, MIT licensed).
//! Only `Trigger`/`Valve`/`Cancelable` survive the fold: the heartbeat and
//! read-loop tasks need a way to be told to stop, but this core has no
//! `UnboundedReceiver<Command>` to `Drain` -- there is no command queue,
//! callers talk to the channel directly -- so `Drain`/`Drainable` were left
//! behind. See DESIGN.md.

use futures::future::Shared;
use futures::prelude::*;
use futures::sync::oneshot;

/// A remote trigger for canceling a [`Stream`] guarded by a [`Valve`].
/// Implements [`Drop`] and triggers when it goes out of scope.
#[derive(Debug)]
pub struct Trigger(Option<oneshot::Sender<()>>);

impl Trigger {
    /// Consume the `Trigger` and terminate the linked [`Valve`].
    pub fn terminate(self) {
        drop(self);
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if let Some(trigger) = self.0.take() {
            let _ = trigger.send(());
        }
    }
}

/// Cancels a [`Stream`] when triggered by a [`Trigger`]. Cloneable: one
/// `Valve` can guard several streams (e.g. heartbeat ping interval and
/// status poll interval share one shutdown signal).
#[derive(Clone, Debug)]
pub struct Valve(Shared<oneshot::Receiver<()>>);

impl Future for Valve {
    type Item = ();
    type Error = ();

    fn poll(&mut self) -> Result<Async<Self::Item>, Self::Error> {
        match self.0.poll() {
            Ok(Async::Ready(_)) => Ok(Async::Ready(())),
            Ok(Async::NotReady) => Ok(Async::NotReady),
            Err(_) => Err(()),
        }
    }
}

/// Create a matching [`Trigger`] and [`Valve`] pair.
pub fn valve() -> (Trigger, Valve) {
    let (trigger, valve) = oneshot::channel();
    (Trigger(Some(trigger)), Valve(valve.shared()))
}

/// A `Cancel` is a wrapper around a [`Stream`] that can be short-circuited.
#[derive(Debug)]
pub struct Cancel<S, F> {
    stream: S,
    until: F,
}

impl<S, F> Stream for Cancel<S, F>
where
    S: Stream,
    F: Future<Item = (), Error = ()>,
{
    type Item = S::Item;
    type Error = S::Error;

    fn poll(&mut self) -> Poll<Option<Self::Item>, Self::Error> {
        if let Ok(Async::Ready(_)) = self.until.poll() {
            return Ok(Async::Ready(None));
        }
        self.stream.poll()
    }
}

/// Extension trait exposing [`cancel`](Cancelable::cancel) on any [`Stream`].
pub trait Cancelable: Stream {
    /// Yield items from the underlying stream until `trigger` resolves, then
    /// short-circuit by returning `Async::Ready(None)`.
    fn cancel<F>(self, trigger: F) -> Cancel<Self, F::Future>
    where
        F: IntoFuture<Item = (), Error = ()>,
        Self: Sized,
    {
        Cancel {
            stream: self,
            until: trigger.into_future(),
        }
    }
}

impl<S> Cancelable for S where S: Stream {}
