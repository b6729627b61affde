//! The framed channel: owns the socket, runs the background reader, and
//! exposes a mutex-guarded send path. spec.md §4.3.
//!
//! Grounded on the teacher's `Framed::new(socket, codec::CastMessage::default())`
//! split into `task::send`/`task::respond` (`lib.rs`, `task.rs`), generalized
//! from a fixed `Command`/`Status` pipe into the open `Listener` registry
//! spec.md §3/§4.3 call for, and genericized over the transport so tests can
//! drive it with a plain `TcpStream` instead of requiring a real TLS
//! handshake (the teacher always used `TlsStream<TcpStream>` directly).

use std::io;
use std::sync::{Arc, Mutex};

use futures::prelude::*;
use futures::future;
use futures_locks::Mutex as TaskMutex;
use tokio_codec::Framed;
use tokio_io::{AsyncRead, AsyncWrite};

use crate::cancel::{self, Cancelable, Trigger};
use crate::codec::FrameCodec;
use crate::error::Error;
use crate::listener::{Listener, Registry, SharedListener};
use crate::proto::CastMessage;

/// `Opening -> Open -> Closing -> Closed`. spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Opening,
    Open,
    Closing,
    Closed,
}

type BoxSink = Box<dyn Sink<SinkItem = CastMessage, SinkError = io::Error> + Send>;

/// Owns one end of a Cast v2 connection. Cheap to clone: every clone shares
/// the same socket, listener registry, and state.
#[derive(Clone)]
pub struct FramedChannel {
    state: Arc<Mutex<State>>,
    listeners: Registry,
    sink: TaskMutex<Option<BoxSink>>,
    // Stops `read_loop` from dispatching any further messages once `close`
    // trips it. `None` after the first `close()` call.
    read_loop_trigger: Arc<Mutex<Option<Trigger>>>,
}

impl FramedChannel {
    /// Take ownership of an already-connected transport (the session façade
    /// has already performed the TLS handshake, per spec.md §4.7) and start
    /// the background reader.
    pub fn open<T>(transport: T, max_frame_size: usize) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let framed = Framed::new(transport, FrameCodec::new(max_frame_size));
        let (sink, stream) = framed.split();

        let state = Arc::new(Mutex::new(State::Open));
        let listeners = Registry::new();
        let (trigger, valve) = cancel::valve();
        let channel = FramedChannel {
            state: state.clone(),
            listeners: listeners.clone(),
            sink: TaskMutex::new(Some(Box::new(sink))),
            read_loop_trigger: Arc::new(Mutex::new(Some(trigger))),
        };

        tokio_executor::spawn(read_loop(stream.cancel(valve), state, listeners));
        channel
    }

    pub fn state(&self) -> State {
        *self.state.lock().expect("channel state lock poisoned")
    }

    pub fn add_listener(&self, listener: SharedListener, namespace: &str) {
        self.listeners.add(listener, namespace);
    }

    pub fn remove_listener(&self, listener: &SharedListener) {
        self.listeners.remove(listener);
    }

    /// Serialize `message` and write the frame under the send mutex so
    /// concurrent senders never interleave bytes (spec.md §4.3, §5).
    pub fn send(&self, message: CastMessage) -> impl Future<Item = (), Error = Error> {
        if self.state() != State::Open {
            return future::Either::A(future::err(Error::NotConnected));
        }
        let state = self.state.clone();
        future::Either::B(
            self.sink
                .lock()
                .map_err(|_| Error::Io(io::Error::new(io::ErrorKind::Other, "sink lock poisoned")))
                .and_then(move |mut guard| {
                    let sink = guard
                        .take()
                        .expect("sink missing; a prior send failed to restore it");
                    sink.send(message).then(move |result| match result {
                        Ok(sink) => {
                            *guard = Some(sink);
                            Ok(())
                        }
                        Err(err) => {
                            *state.lock().expect("channel state lock poisoned") = State::Closed;
                            Err(Error::from(err))
                        }
                    })
                }),
        )
    }

    /// Move to `Closing`, attempt a graceful shutdown of the sink, then
    /// `Closed`. Fires `socket_error` to every still-registered listener
    /// exactly once, and stops `read_loop` from dispatching any further
    /// messages (spec.md §8, invariant 3).
    pub fn close(&self) -> impl Future<Item = (), Error = ()> {
        *self.state.lock().expect("channel state lock poisoned") = State::Closing;
        if let Some(trigger) = self
            .read_loop_trigger
            .lock()
            .expect("read loop trigger lock poisoned")
            .take()
        {
            trigger.terminate();
        }
        let state = self.state.clone();
        let listeners = self.listeners.clone();
        self.sink.lock().then(move |guard| {
            if let Ok(mut guard) = guard {
                if let Some(sink) = guard.take() {
                    tokio_executor::spawn(sink.close().then(|_: Result<_, io::Error>| Ok(())));
                }
            }
            *state.lock().expect("channel state lock poisoned") = State::Closed;
            listeners.notify_socket_error();
            Ok(())
        })
    }
}

fn read_loop(
    stream: impl Stream<Item = CastMessage, Error = io::Error> + Send + 'static,
    state: Arc<Mutex<State>>,
    listeners: Registry,
) -> impl Future<Item = (), Error = ()> {
    stream
        .for_each(move |message| {
            trace!("dispatching message on namespace {}", message.get_namespace());
            for listener in listeners.snapshot(message.get_namespace()) {
                listener.message_received(&message);
            }
            Ok(())
        })
        .then(move |result| {
            if let Err(ref err) = result {
                warn!("framed channel read loop ended with error: {:?}", err);
            }
            *state.lock().expect("channel state lock poisoned") = State::Closed;
            listeners.notify_socket_error();
            Ok(())
        })
}
