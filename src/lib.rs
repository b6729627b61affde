//! Client library for the Google Cast v2 protocol: a framed TLS channel, a
//! request/response correlator, a receiver-namespace controller, and the
//! heartbeat/keep-alive subsystem that keeps a connection alive.
//!
//! Device discovery, TLS trust/cipher configuration, per-application media
//! controllers, persisted configuration, and CLI entry points are
//! collaborators outside this core; see `Session::connect` for the external
//! interface this core expects to be driven through.

#[macro_use]
extern crate log;

pub mod cancel;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod heartbeat;
mod ids;
pub mod listener;
pub mod payload;
#[allow(clippy::all, clippy::pedantic)]
mod proto;
pub mod receiver;
pub mod requestor;
mod session;

pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::heartbeat::Heartbeat;
pub use crate::ids::sender_id;
pub use crate::receiver::{Application, Availability, ControlType, Namespace, ReceiverController, Status, Volume};
pub use crate::session::Session;
