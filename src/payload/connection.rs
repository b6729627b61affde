//! `urn:x-cast:com.google.cast.tp.connection` payload shapes.
//!
//! Grounded on the teacher's `channel::connection` module.

use serde_derive::{Deserialize, Serialize};

const USER_AGENT: &str = "cast-client";

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Connect { user_agent: String },
    Close,
}

impl Request {
    pub fn connect() -> Self {
        Request::Connect {
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Close,
}
