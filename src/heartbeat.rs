//! The heartbeat/keep-alive subsystem. spec.md §4.4.
//!
//! Grounded on the teacher's `task::keepalive`
//! (`Interval::new_interval(...).cancel(valve)...`), generalized from a
//! fire-and-forget `Command::Ping` push onto the command channel into a
//! `Listener` that both drives the PING cadence and answers inbound PINGs.
//! The watchdog has no teacher counterpart -- the teacher never notices a
//! missing PONG -- and is built from `tokio_timer::Delay` raced against a
//! `Valve`, the same cancellation primitive the teacher uses for its
//! intervals.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::prelude::*;
use tokio_timer::{Delay, Interval};

use crate::cancel::{self, Cancelable, Trigger};
use crate::channel::FramedChannel;
use crate::listener::{Listener, SharedListener};
use crate::payload::{self, heartbeat, HEARTBEAT_NAMESPACE};
use crate::proto::CastMessage;

/// Owns the PING interval task and the PONG watchdog for one connection.
/// Dropping this stops sending PING, deregisters the watchdog listener, and
/// lets any outstanding watchdog timer lapse without effect. It does not by
/// itself close the channel.
pub struct Heartbeat {
    channel: FramedChannel,
    listener: SharedListener,
    _ping_trigger: Trigger,
}

impl Heartbeat {
    /// Start sending PING on `ping_interval` and arm a `pong_timeout`
    /// watchdog on every PING and PONG (spec.md §4.4). `channel` must
    /// already be `Open`. Inbound PINGs are answered immediately,
    /// independent of this side's own cadence.
    pub fn start(
        channel: FramedChannel,
        sender_id: String,
        destination_id: String,
        ping_interval: Duration,
        pong_timeout: Duration,
    ) -> Self {
        let watchdog = Arc::new(Watchdog::new(channel.clone(), sender_id.clone(), pong_timeout));
        let listener: SharedListener = watchdog.clone();
        channel.add_listener(listener.clone(), HEARTBEAT_NAMESPACE);

        let (ping_trigger, ping_valve) = cancel::valve();
        let ping_channel = channel.clone();
        let ping_watchdog = watchdog;
        let ping_task = Interval::new_interval(ping_interval)
            .cancel(ping_valve)
            .map_err(|err| warn!("heartbeat interval error: {:?}", err))
            .for_each(move |_| {
                ping_watchdog.arm();
                let message = ping_message(&sender_id, &destination_id);
                tokio_executor::spawn(
                    ping_channel
                        .send(message)
                        .map_err(|err| warn!("failed to send PING: {:?}", err)),
                );
                Ok(())
            });
        tokio_executor::spawn(ping_task);

        Heartbeat {
            channel,
            listener,
            _ping_trigger: ping_trigger,
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.channel.remove_listener(&self.listener);
    }
}

/// Watches for PONGs (and PINGs, which it answers) on the heartbeat
/// namespace, and kills the channel if a watchdog deadline lapses with no
/// PONG to reset it.
struct Watchdog {
    channel: FramedChannel,
    sender_id: String,
    timeout: Duration,
    generation: Mutex<Option<Trigger>>,
}

impl Watchdog {
    fn new(channel: FramedChannel, sender_id: String, timeout: Duration) -> Self {
        Watchdog {
            channel,
            sender_id,
            timeout,
            generation: Mutex::new(None),
        }
    }

    /// (Re-)arm the watchdog. Replacing the stored `Trigger` drops the
    /// previous one, which cancels the previous deadline's task.
    fn arm(&self) {
        let (trigger, valve) = cancel::valve();
        *self
            .generation
            .lock()
            .expect("watchdog generation lock poisoned") = Some(trigger);

        let channel = self.channel.clone();
        let expired = Delay::new(Instant::now() + self.timeout).then(|_| Ok::<bool, ()>(true));
        let reset = valve.then(|_| Ok::<bool, ()>(false));
        let task = expired.select(reset).then(move |result| {
            let expired = match result {
                Ok((expired, _next)) => expired,
                Err(_) => true,
            };
            if expired {
                warn!("heartbeat watchdog expired with no PONG; closing channel");
                tokio_executor::spawn(channel.close());
            }
            Ok(())
        });
        tokio_executor::spawn(task);
    }
}

impl Listener for Watchdog {
    fn message_received(&self, message: &CastMessage) {
        let payload = message.get_payload_utf8();
        if payload.is_empty() {
            return;
        }
        match payload::parse::<heartbeat::Response>(payload) {
            Ok(heartbeat::Response::Pong) => self.arm(),
            Ok(heartbeat::Response::Ping) => {
                let reply = pong_message(&self.sender_id, message.get_source_id());
                tokio_executor::spawn(
                    self.channel
                        .send(reply)
                        .map_err(|err| warn!("failed to send PONG: {:?}", err)),
                );
            }
            Err(err) => warn!("unparseable heartbeat payload: {:?}", err),
        }
    }

    fn socket_error(&self) {
        // The channel is already gone; let any armed deadline lapse
        // harmlessly, there is nothing left to close.
    }
}

fn ping_message(sender: &str, destination: &str) -> CastMessage {
    payload::MessageBuilder::default()
        .namespace(HEARTBEAT_NAMESPACE)
        .source(sender)
        .destination(destination)
        .payload(&heartbeat::Request::Ping)
        .into_message()
}

fn pong_message(sender: &str, destination: &str) -> CastMessage {
    payload::MessageBuilder::default()
        .namespace(HEARTBEAT_NAMESPACE)
        .source(sender)
        .destination(destination)
        .payload(&heartbeat::Request::Pong)
        .into_message()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{CastMessage_PayloadType, CastMessage_ProtocolVersion};

    fn message(payload: &str) -> CastMessage {
        let mut message = CastMessage::new();
        message.set_protocol_version(CastMessage_ProtocolVersion::CASTV2_1_0);
        message.set_source_id("receiver-0".to_owned());
        message.set_destination_id("sender-0-test".to_owned());
        message.set_namespace(HEARTBEAT_NAMESPACE.to_owned());
        message.set_payload_type(CastMessage_PayloadType::STRING);
        message.set_payload_utf8(payload.to_owned());
        message
    }

    #[test]
    fn ping_message_has_expected_shape() {
        let built = ping_message("sender-0-test", "receiver-0");
        assert_eq!(built.get_namespace(), HEARTBEAT_NAMESPACE);
        assert!(built.get_payload_utf8().contains("PING"));
    }

    #[test]
    fn inbound_ping_and_pong_parse_as_expected() {
        let ping = message(r#"{"type":"PING"}"#);
        let pong = message(r#"{"type":"PONG"}"#);
        assert!(matches!(
            payload::parse::<heartbeat::Response>(ping.get_payload_utf8()).unwrap(),
            heartbeat::Response::Ping
        ));
        assert!(matches!(
            payload::parse::<heartbeat::Response>(pong.get_payload_utf8()).unwrap(),
            heartbeat::Response::Pong
        ));
    }
}
