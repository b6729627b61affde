//! End-to-end scenarios against an in-process fake device, per spec.md §8.
//!
//! The fake device speaks the wire protocol directly over a plain
//! `TcpStream` -- no TLS, no `Session` -- using the same `FramedChannel`
//! genericization the teacher's channel never needed (see DESIGN.md). Each
//! scenario builds a `ReceiverController` (and, for the watchdog scenario,
//! a `Heartbeat`) on the client side and a hand-rolled responder on the
//! device side.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cast_client::channel::{FramedChannel, State};
use cast_client::codec::FrameCodec;
use cast_client::error::Error;
use cast_client::payload::{self, AnyPayload, RECEIVER_NAMESPACE};
use cast_client::{Availability, Heartbeat, ReceiverController};
use futures::prelude::*;
use tokio_codec::Framed;
use tokio_tcp::{TcpListener, TcpStream};
use tokio_timer::Delay;

const MAX_FRAME_SIZE: usize = 64 << 10;

fn local_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind(&"127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Accept exactly one connection and answer `count` receiver-namespace
/// requests with `reply(kind, requestId, sourceId) -> JSON body`, in
/// arrival order.
fn fake_device<F>(listener: TcpListener, count: u64, reply: F) -> impl Future<Item = (), Error = ()>
where
    F: Fn(&str, i64, &str) -> String + Send + 'static,
{
    listener
        .incoming()
        .into_future()
        .map_err(|(err, _)| panic!("fake device accept failed: {:?}", err))
        .and_then(move |(socket, _)| {
            let socket = socket.expect("fake device listener closed with no connection");
            let framed = Framed::new(socket, FrameCodec::new(MAX_FRAME_SIZE));
            let (sink, stream) = framed.split();
            stream
                .take(count)
                .map(move |message| {
                    let any = AnyPayload::parse(message.get_payload_utf8())
                        .expect("fake device received unparseable payload");
                    let request_id = any.request_id.unwrap_or(0);
                    let body = reply(&any.kind, request_id, message.get_source_id());
                    payload::MessageBuilder::default()
                        .namespace(RECEIVER_NAMESPACE)
                        .source("receiver-0")
                        .destination(message.get_source_id())
                        .payload_raw(body)
                        .into_message()
                })
                .forward(sink.sink_map_err(|err| panic!("fake device write failed: {:?}", err)))
                .map(|_| ())
                .map_err(|err: std::io::Error| panic!("fake device stream failed: {:?}", err))
        })
}

fn client_channel(addr: SocketAddr) -> impl Future<Item = FramedChannel, Error = Error> {
    TcpStream::connect(&addr)
        .map_err(Error::from)
        .map(|socket| FramedChannel::open(socket, MAX_FRAME_SIZE))
}

#[test]
fn happy_launch() {
    let (listener, addr) = local_listener();
    let device = fake_device(listener, 3, |kind, id, _source| match kind {
        "GET_APP_AVAILABILITY" => format!(
            r#"{{"type":"GET_APP_AVAILABILITY","requestId":{},"availability":{{"CC1AD845":"APP_AVAILABLE"}}}}"#,
            id
        ),
        "LAUNCH" => format!(
            r#"{{"type":"RECEIVER_STATUS","requestId":{},"status":{{"applications":[{{"appId":"CC1AD845","displayName":"Default Media Receiver","sessionId":"session-1","statusText":"","transportId":"session-1","isIdleScreen":false,"launchedFromCloud":false,"namespaces":[]}}],"volume":{{}}}}}}"#,
            id
        ),
        "STOP" => format!(
            r#"{{"type":"RECEIVER_STATUS","requestId":{},"status":{{"applications":[],"volume":{{}}}}}}"#,
            id
        ),
        other => panic!("unexpected request kind in happy_launch: {}", other),
    });

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .and_then(|channel| {
            let receiver = Arc::new(ReceiverController::new(
                channel,
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
            ));
            let first = receiver.clone();
            let second = receiver.clone();
            receiver
                .app_availability(vec!["CC1AD845".to_owned()], Duration::from_secs(2))
                .map_err(|err| panic!("app_availability failed: {:?}", err))
                .and_then(move |availability| {
                    assert_eq!(
                        availability.get("CC1AD845"),
                        Some(&Availability::Available)
                    );
                    first
                        .launch("CC1AD845", Duration::from_secs(5))
                        .map_err(|err| panic!("launch failed: {:?}", err))
                })
                .and_then(move |status| {
                    assert_eq!(status.applications.len(), 1);
                    assert_eq!(status.applications[0].app_id, "CC1AD845");
                    assert!(!status.applications[0].session_id.is_empty());
                    let session_id = status.applications[0].session_id.clone();
                    second
                        .stop(&session_id, Duration::from_secs(5))
                        .map_err(|err| panic!("stop failed: {:?}", err))
                })
                .map(|status| {
                    assert!(status.applications.is_empty());
                })
        });

    tokio::run(device.join(client.map_err(|_| ())).map(|_| ()));
}

#[test]
fn volume_round_trip() {
    let (listener, addr) = local_listener();
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let device = fake_device(listener, 2, move |kind, id, _source| match kind {
        "SET_VOLUME" => {
            let first = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0;
            let muted = if first { "false" } else { "true" };
            format!(
                r#"{{"type":"RECEIVER_STATUS","requestId":{},"status":{{"applications":[],"volume":{{"level":0.35,"muted":{},"stepInterval":0.05}}}}}}"#,
                id, muted
            )
        }
        other => panic!("unexpected request kind in volume_round_trip: {}", other),
    });

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .and_then(|channel| {
            let receiver = Arc::new(ReceiverController::new(
                channel,
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
            ));
            let second = receiver.clone();
            receiver
                .set_volume(0.37, Duration::from_secs(2))
                .map_err(|err| panic!("set_volume failed: {:?}", err))
                .and_then(move |status| {
                    let level = status.volume.level.expect("volume level present");
                    assert!((level - 0.35).abs() < 1e-9 || (level - 0.40).abs() < 1e-9);
                    second
                        .set_muted(true, Duration::from_secs(2))
                        .map_err(|err| panic!("set_muted failed: {:?}", err))
                })
                .map(|status| {
                    assert_eq!(status.volume.muted, Some(true));
                })
        });

    tokio::run(device.join(client.map_err(|_| ())).map(|_| ()));
}

#[test]
fn timeout_fails_fast() {
    // The fake device accepts the connection and reads the request, but
    // never writes a reply -- enough to exercise the timeout path.
    let (listener, addr) = local_listener();
    let device = listener
        .incoming()
        .into_future()
        .map_err(|(err, _)| panic!("fake device accept failed: {:?}", err))
        .and_then(|(socket, _)| {
            let socket = socket.expect("fake device listener closed with no connection");
            Framed::new(socket, FrameCodec::new(MAX_FRAME_SIZE))
                .into_future()
                .map(|_| ())
                .map_err(|(err, _)| panic!("fake device read failed: {:?}", err))
        });

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .and_then(|channel| {
            let receiver = ReceiverController::new(
                channel,
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
            );
            receiver
                .get_status(Duration::from_millis(100))
                .then(|result| match result {
                    Err(Error::Timeout) => Ok(()),
                    other => panic!("expected Timeout, got {:?}", other),
                })
        });

    tokio::run(device.join(client.map_err(|_| ())).map(|_| ()));
}

#[test]
fn unsolicited_status_reaches_every_subscriber_in_order() {
    let (listener, addr) = local_listener();
    let device = listener
        .incoming()
        .into_future()
        .map_err(|(err, _)| panic!("fake device accept failed: {:?}", err))
        .and_then(|(socket, _)| {
            let socket = socket.expect("fake device listener closed with no connection");
            let framed = Framed::new(socket, FrameCodec::new(MAX_FRAME_SIZE));
            let message = payload::MessageBuilder::default()
                .namespace(RECEIVER_NAMESPACE)
                .source("receiver-0")
                .destination("sender-0-test")
                .payload_raw(
                    r#"{"type":"RECEIVER_STATUS","status":{"applications":[],"volume":{}}}"#,
                )
                .into_message();
            framed
                .send(message)
                .map(|_| ())
                .map_err(|err| panic!("fake device write failed: {:?}", err))
        });

    let (tx_a, rx_a) = futures::sync::oneshot::channel();
    let (tx_b, rx_b) = futures::sync::oneshot::channel();

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .map(move |channel| {
            let receiver = ReceiverController::new(
                channel,
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
            );
            let tx_a = std::sync::Mutex::new(Some(tx_a));
            let tx_b = std::sync::Mutex::new(Some(tx_b));
            receiver.subscribe(move |_status| {
                if let Some(tx) = tx_a.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            });
            receiver.subscribe(move |_status| {
                if let Some(tx) = tx_b.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            });
            // Keep the controller (and its channel) alive until both
            // subscribers have fired.
            std::mem::forget(receiver);
        });

    let received = rx_a
        .join(rx_b)
        .map(|_| ())
        .map_err(|err| panic!("subscriber channel dropped: {:?}", err));

    tokio::run(
        device
            .join3(client.map_err(|_| ()), received.map_err(|_| ()))
            .map(|_| ()),
    );
}

#[test]
fn protocol_error_surfaces_the_device_tag() {
    let (listener, addr) = local_listener();
    let device = fake_device(listener, 1, |kind, id, _source| match kind {
        "LAUNCH" => format!(r#"{{"type":"LAUNCH_ERROR","requestId":{}}}"#, id),
        other => panic!("unexpected request kind in protocol_error: {}", other),
    });

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .and_then(|channel| {
            let receiver = ReceiverController::new(
                channel,
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
            );
            receiver
                .launch("CC1AD845", Duration::from_secs(5))
                .then(|result| match result {
                    Err(Error::Protocol(ref tag)) if tag == "LAUNCH_ERROR" => Ok(()),
                    other => panic!("expected LAUNCH_ERROR, got {:?}", other),
                })
        });

    tokio::run(device.join(client.map_err(|_| ())).map(|_| ()));
}

#[test]
fn heartbeat_watchdog_closes_a_silent_connection() {
    // The fake device accepts the connection and never answers any PING,
    // so the watchdog must close the channel within pong_timeout +
    // ping_interval (spec.md §8, scenario 5).
    let (listener, addr) = local_listener();
    let device = listener
        .incoming()
        .into_future()
        .map_err(|(err, _)| panic!("fake device accept failed: {:?}", err))
        .and_then(|(socket, _)| {
            let socket = socket.expect("fake device listener closed with no connection");
            // Hold the connection open (reading and discarding frames)
            // without ever writing a PONG back.
            Framed::new(socket, FrameCodec::new(MAX_FRAME_SIZE))
                .for_each(|_message| Ok(()))
                .map_err(|err| warn_and_ignore(err))
        });

    let ping_interval = Duration::from_millis(30);
    let pong_timeout = Duration::from_millis(60);

    let client = client_channel(addr)
        .map_err(|err| panic!("connect failed: {:?}", err))
        .and_then(move |channel| {
            let heartbeat = Heartbeat::start(
                channel.clone(),
                "sender-0-test".to_owned(),
                "receiver-0".to_owned(),
                ping_interval,
                pong_timeout,
            );
            Delay::new(std::time::Instant::now() + pong_timeout + ping_interval + Duration::from_millis(50))
                .map_err(|err| panic!("test delay failed: {:?}", err))
                .map(move |_| {
                    assert_eq!(channel.state(), State::Closed);
                    // Keep the heartbeat alive until the assertion runs.
                    drop(heartbeat);
                })
        });

    tokio::run(device.join(client.map_err(|_| ())).map(|_| ()));
}

fn warn_and_ignore(_err: std::io::Error) {}
