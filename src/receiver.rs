//! The receiver controller: typed operations on
//! `urn:x-cast:com.google.cast.receiver`, plus unsolicited status fan-out.
//! spec.md §4.6.
//!
//! Grounded on the teacher's `channel::receiver` (`get_status`/`launch`) and
//! `provider::Status`, generalized to cover the full operation table spec.md
//! §4.6 lists (`stop`, `setVolume`, `setMuted`, `appAvailability`) and to
//! dispatch unsolicited status the way spec.md §9 describes: "a pair of
//! function-valued fields... whichever the target language renders most
//! clearly" -- here, a `Fn(Status)` subscriber list.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use futures::prelude::*;

use crate::channel::FramedChannel;
use crate::error::Error;
use crate::ids::RequestIds;
use crate::listener::{Listener, SharedListener};
use crate::payload::{self, receiver, AnyPayload, RECEIVER_NAMESPACE};
use crate::proto::CastMessage;
use crate::requestor::{self, Correlator};

pub use crate::payload::receiver::{Application, Availability, ControlType, Namespace, Status, Volume};

type StatusSubscriber = Box<dyn Fn(Status) + Send + Sync>;

/// Typed operations on the receiver namespace for one connection, plus
/// subscription to unsolicited status broadcasts.
pub struct ReceiverController {
    channel: FramedChannel,
    sender_id: String,
    destination_id: String,
    ids: RequestIds,
    broadcast: Arc<Broadcast>,
}

impl ReceiverController {
    /// Register for receiver-namespace traffic on `channel`. `sender_id` is
    /// used as the `source_id` of every outbound request; `destination_id`
    /// is the receiver identifier requests are addressed to (spec.md §3:
    /// the default receiver identifier, until this core acquires a
    /// transport identifier for a specific launched application).
    pub fn new(channel: FramedChannel, sender_id: String, destination_id: String) -> Self {
        let broadcast = Arc::new(Broadcast::default());
        let listener: SharedListener = broadcast.clone();
        channel.add_listener(listener, RECEIVER_NAMESPACE);
        ReceiverController {
            channel,
            sender_id,
            destination_id,
            ids: RequestIds::new(),
            broadcast,
        }
    }

    /// Register `subscriber` to be called, in arrival order, with every
    /// unsolicited (no `requestId`) receiver status (spec.md §4.6).
    pub fn subscribe(&self, subscriber: impl Fn(Status) + Send + Sync + 'static) {
        self.broadcast.add(Box::new(subscriber));
    }

    pub fn get_status(&self, timeout: Duration) -> impl Future<Item = Status, Error = Error> {
        let id = self.ids.next();
        self.issue(receiver::Request::GetStatus { request_id: id }, timeout)
            .and_then(|message| parse_status(&message))
    }

    pub fn launch(
        &self,
        app_id: &str,
        timeout: Duration,
    ) -> impl Future<Item = Status, Error = Error> {
        let id = self.ids.next();
        let request = receiver::Request::Launch {
            request_id: id,
            app_id: app_id.to_owned(),
        };
        self.issue(request, timeout)
            .and_then(|message| parse_status(&message))
    }

    pub fn stop(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> impl Future<Item = Status, Error = Error> {
        let id = self.ids.next();
        let request = receiver::Request::Stop {
            request_id: id,
            session_id: session_id.to_owned(),
        };
        self.issue(request, timeout)
            .and_then(|message| parse_status(&message))
    }

    /// `level` must be in `[0.0, 1.0]`; out-of-range values are rejected
    /// before transmission (spec.md §8, boundary behaviors), the device is
    /// never consulted.
    pub fn set_volume(
        &self,
        level: f64,
        timeout: Duration,
    ) -> impl Future<Item = Status, Error = Error> {
        if !(0.0..=1.0).contains(&level) {
            return future::Either::A(future::err(Error::protocol("invalid_level")));
        }
        let id = self.ids.next();
        let request = receiver::Request::SetVolume {
            request_id: id,
            volume: receiver::Volume {
                level: Some(level),
                ..receiver::Volume::default()
            },
        };
        future::Either::B(
            self.issue(request, timeout)
                .and_then(|message| parse_status(&message)),
        )
    }

    pub fn set_muted(
        &self,
        muted: bool,
        timeout: Duration,
    ) -> impl Future<Item = Status, Error = Error> {
        let id = self.ids.next();
        let request = receiver::Request::SetVolume {
            request_id: id,
            volume: receiver::Volume {
                muted: Some(muted),
                ..receiver::Volume::default()
            },
        };
        self.issue(request, timeout)
            .and_then(|message| parse_status(&message))
    }

    pub fn app_availability(
        &self,
        app_ids: Vec<String>,
        timeout: Duration,
    ) -> impl Future<Item = HashMap<String, Availability>, Error = Error> {
        let id = self.ids.next();
        let request = receiver::Request::GetAppAvailability {
            request_id: id,
            app_id: app_ids,
        };
        self.issue(request, timeout)
            .and_then(|message| parse_availability(&message))
    }

    fn issue(
        &self,
        request: receiver::Request,
        timeout: Duration,
    ) -> impl Future<Item = CastMessage, Error = Error> {
        let id = request_id_of(&request);
        let message = payload::MessageBuilder::default()
            .namespace(RECEIVER_NAMESPACE)
            .source(&self.sender_id)
            .destination(&self.destination_id)
            .payload(&request)
            .into_message();
        requestor::request(
            &self.channel,
            RECEIVER_NAMESPACE,
            message,
            Correlator::RequestId(id),
            timeout,
        )
    }
}

impl Drop for ReceiverController {
    fn drop(&mut self) {
        let listener: SharedListener = self.broadcast.clone();
        self.channel.remove_listener(&listener);
    }
}

fn request_id_of(request: &receiver::Request) -> i64 {
    match *request {
        receiver::Request::Launch { request_id, .. }
        | receiver::Request::GetStatus { request_id }
        | receiver::Request::Stop { request_id, .. }
        | receiver::Request::SetVolume { request_id, .. }
        | receiver::Request::GetAppAvailability { request_id, .. } => request_id,
    }
}

/// Check the effective type against the device-signalled error set before
/// parsing into a specific shape (spec.md §4.6).
fn check_for_device_error(raw: &str) -> Result<AnyPayload, Error> {
    let any = AnyPayload::parse(raw)?;
    if receiver::ERROR_TYPES.contains(&any.effective_type()) {
        return Err(Error::protocol(any.effective_type().to_owned()));
    }
    Ok(any)
}

fn parse_status(message: &CastMessage) -> Result<Status, Error> {
    let raw = message.get_payload_utf8();
    check_for_device_error(raw)?;
    match payload::parse::<receiver::Response>(raw)? {
        receiver::Response::ReceiverStatus { status, .. } => Ok(status),
        _ => Err(Error::protocol("unexpected_type")),
    }
}

fn parse_availability(message: &CastMessage) -> Result<HashMap<String, Availability>, Error> {
    let raw = message.get_payload_utf8();
    check_for_device_error(raw)?;
    match payload::parse::<receiver::Response>(raw)? {
        receiver::Response::GetAppAvailability { availability, .. } => Ok(availability),
        _ => Err(Error::protocol("unexpected_type")),
    }
}

/// Listens for unsolicited (no `requestId`) receiver status and fans it out
/// to subscribers, in arrival order. Correlated replies are left alone --
/// they are matched by a per-call `requestor::Waiting` listener instead.
#[derive(Default)]
struct Broadcast {
    subscribers: Mutex<Vec<StatusSubscriber>>,
}

impl Broadcast {
    fn add(&self, subscriber: StatusSubscriber) {
        self.subscribers
            .lock()
            .expect("receiver broadcast lock poisoned")
            .push(subscriber);
    }
}

impl Listener for Broadcast {
    fn message_received(&self, message: &CastMessage) {
        let raw = message.get_payload_utf8();
        if raw.is_empty() {
            return;
        }
        let any = match AnyPayload::parse(raw) {
            Ok(any) => any,
            Err(_) => return,
        };
        if any.request_id.is_some() || any.effective_type() != "RECEIVER_STATUS" {
            return;
        }
        let status = match payload::parse::<receiver::Response>(raw) {
            Ok(receiver::Response::ReceiverStatus { status, .. }) => status,
            _ => return,
        };
        for subscriber in self
            .subscribers
            .lock()
            .expect("receiver broadcast lock poisoned")
            .iter()
        {
            subscriber(status.clone());
        }
    }

    fn socket_error(&self) {}
}
