//! `urn:x-cast:com.google.cast.tp.heartbeat` payload shapes.
//!
//! Grounded on the teacher's `channel::heartbeat` module.

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    Pong,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ping,
    Pong,
}
