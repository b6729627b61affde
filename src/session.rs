//! The session façade: the caller-facing surface over the rest of the
//! stack. spec.md §4.7.
//!
//! Grounded on the teacher's `lib.rs` (`tls_connect`, `connect`), which does
//! the same TCP+TLS dance with the same `danger_accept_invalid_*` trust
//! posture (trust/cipher configuration is out of scope per spec.md §1; this
//! keeps the teacher's fixed posture rather than exposing a knob). Unlike
//! the teacher, `connect` does not return until the first receiver status
//! arrives, and failure during any step tears down what was already
//! started, per spec.md §4.7.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future;
use futures::prelude::*;
use native_tls::TlsConnector;
use tokio_tcp::TcpStream;
use tokio_tls::{TlsConnector as AsyncTlsConnector, TlsStream};

use crate::channel::FramedChannel;
use crate::config::Config;
use crate::error::Error;
use crate::heartbeat::Heartbeat;
use crate::ids;
use crate::payload::{self, connection, CONNECTION_NAMESPACE};
use crate::receiver::{ReceiverController, Status};

/// One open Cast v2 connection: the framed channel, the running heartbeat,
/// and the receiver controller, plus enough bookkeeping to close every
/// virtual session this process opened.
pub struct Session {
    channel: FramedChannel,
    sender_id: String,
    receiver: ReceiverController,
    // Destinations CONNECTed so far: the default receiver id, plus the
    // transport id of every app launched through `Session::launch`
    // (spec.md §4.4). Shared (not just owned) so a `launch` future can
    // record its transport id without borrowing `&Session` for its whole
    // lifetime.
    opened: Arc<Mutex<Vec<String>>>,
    // Kept alive for its `Drop` impl, which stops the PING interval and
    // deregisters the watchdog listener.
    _heartbeat: Heartbeat,
}

impl Session {
    /// Connect to `addr`, perform the TLS handshake, send `CONNECT`, start
    /// the heartbeat, and wait for the first receiver status before
    /// resolving. Any failure along the way drops everything already
    /// started; nothing survives a failed `connect`.
    pub fn connect(
        addr: SocketAddr,
        config: Config,
        timeout: Duration,
    ) -> impl Future<Item = Session, Error = Error> {
        let sender_id = ids::sender_id(&config.sender_name_base);
        let destination = config.default_receiver_id.clone();

        tls_connect(addr).map_err(Error::from).and_then(move |socket| {
            let channel = FramedChannel::open(socket, config.max_frame_size);
            let rollback_channel = channel.clone();
            let connect_message = payload::MessageBuilder::default()
                .namespace(CONNECTION_NAMESPACE)
                .source(&sender_id)
                .destination(&destination)
                .payload(&connection::Request::connect())
                .into_message();

            let ping_interval = config.ping_interval;
            let pong_timeout = config.pong_timeout;

            channel
                .send(connect_message)
                .and_then(move |_| {
                    let heartbeat = Heartbeat::start(
                        channel.clone(),
                        sender_id.clone(),
                        destination.clone(),
                        ping_interval,
                        pong_timeout,
                    );
                    let receiver = ReceiverController::new(
                        channel.clone(),
                        sender_id.clone(),
                        destination.clone(),
                    );

                    receiver.get_status(timeout).map(move |_status| Session {
                        channel,
                        sender_id,
                        receiver,
                        opened: Arc::new(Mutex::new(vec![destination])),
                        _heartbeat: heartbeat,
                    })
                })
                // Any failure from here on (CONNECT send, or the first
                // get_status never arriving) must undo everything already
                // started: nothing survives a failed connect (spec.md §4.7).
                .or_else(move |err| {
                    tokio_executor::spawn(rollback_channel.close());
                    Err(err)
                })
        })
    }

    /// The receiver controller bound to this session's channel.
    pub fn receiver(&self) -> &ReceiverController {
        &self.receiver
    }

    /// Launch `app_id`, then `CONNECT` to the transport id the device
    /// assigned it and remember that destination so `disconnect` sends it a
    /// `CLOSE` too. spec.md §4.4: "plus any app-specific transport
    /// identifier acquired via LAUNCH". Delegates the protocol exchange to
    /// `ReceiverController::launch`; this wrapper only adds the virtual
    /// session bookkeeping around it.
    pub fn launch(&self, app_id: &str, timeout: Duration) -> impl Future<Item = Status, Error = Error> {
        let channel = self.channel.clone();
        let sender_id = self.sender_id.clone();
        let opened = self.opened.clone();
        let app_id = app_id.to_owned();

        self.receiver.launch(&app_id, timeout).map(move |status| {
            if let Some(app) = status.applications.iter().find(|app| app.app_id == app_id) {
                let transport_id = app.transport_id.clone();
                let already_open = opened
                    .lock()
                    .expect("session opened-destinations lock poisoned")
                    .iter()
                    .any(|d| *d == transport_id);
                if !already_open {
                    let connect_message = payload::MessageBuilder::default()
                        .namespace(CONNECTION_NAMESPACE)
                        .source(&sender_id)
                        .destination(&transport_id)
                        .payload(&connection::Request::connect())
                        .into_message();
                    tokio_executor::spawn(
                        channel
                            .send(connect_message)
                            .map_err(|err| warn!("failed to CONNECT to launched app: {:?}", err)),
                    );
                    opened
                        .lock()
                        .expect("session opened-destinations lock poisoned")
                        .push(transport_id);
                }
            }
            status
        })
    }

    /// Send `CLOSE` to every virtual session this process opened, then
    /// close the framed channel (spec.md §4.4).
    pub fn disconnect(&self) -> impl Future<Item = (), Error = ()> {
        let channel = self.channel.clone();
        let channel_for_close = channel.clone();
        let sender_id = self.sender_id.clone();
        let destinations = self
            .opened
            .lock()
            .expect("session opened-destinations lock poisoned")
            .clone();

        let closes: Vec<_> = destinations
            .into_iter()
            .map(move |destination| {
                let message = payload::MessageBuilder::default()
                    .namespace(CONNECTION_NAMESPACE)
                    .source(&sender_id)
                    .destination(&destination)
                    .payload(&connection::Request::Close)
                    .into_message();
                channel.send(message).then(|_| Ok(()))
            })
            .collect();

        future::join_all(closes).and_then(move |_| channel_for_close.close())
    }
}

/// Asynchronously establish a TLS connection, accepting the device's
/// self-signed certificate without chain or hostname validation (spec.md
/// §1: this core does not implement authentication beyond that).
fn tls_connect(addr: SocketAddr) -> impl Future<Item = TlsStream<TcpStream>, Error = io::Error> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true)
        .build()
        .map(AsyncTlsConnector::from)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let connector = match connector {
        Ok(connector) => connector,
        Err(err) => return future::Either::A(future::err(err)),
    };
    let connect = TcpStream::connect(&addr).and_then(move |socket| {
        info!("establishing TLS connection to {:?}", addr);
        connector
            .connect(&addr.ip().to_string(), socket)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    });
    future::Either::B(connect)
}
