//! `urn:x-cast:com.google.cast.receiver` payload shapes.
//!
//! Grounded on the teacher's `channel::receiver` module; `Stop`,
//! `GetAppAvailability`, `SetVolume`, and the `ReceiverStatus` data model
//! (the `Volume`/`Application` fields spec.md §3 names) are filled in here
//! since the teacher only implemented `Launch`/`GetStatus`.

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Launch { request_id: i64, app_id: String },
    #[serde(rename_all = "camelCase")]
    GetStatus { request_id: i64 },
    #[serde(rename_all = "camelCase")]
    Stop { request_id: i64, session_id: String },
    #[serde(rename_all = "camelCase")]
    SetVolume { request_id: i64, volume: Volume },
    #[serde(rename_all = "camelCase")]
    GetAppAvailability {
        request_id: i64,
        app_id: Vec<String>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    ReceiverStatus { request_id: i64, status: Status },
    #[serde(rename_all = "camelCase")]
    GetAppAvailability {
        request_id: i64,
        availability: HashMap<String, Availability>,
    },
}

/// Type tags that indicate the device rejected an operation rather than
/// answering it. spec.md §4.6.
pub const ERROR_TYPES: &[&str] = &["LAUNCH_ERROR", "INVALID_REQUEST"];

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub applications: Vec<Application>,
    pub volume: Volume,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub display_name: String,
    pub session_id: String,
    pub status_text: String,
    pub transport_id: String,
    #[serde(default)]
    pub is_idle_screen: bool,
    #[serde(default)]
    pub launched_from_cloud: bool,
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Namespace {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Volume {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "controlType")]
    pub control_type: Option<ControlType>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "stepInterval")]
    pub step_interval: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Fixed,
    Attenuation,
    Master,
}

#[derive(Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[serde(rename = "APP_AVAILABLE")]
    Available,
    #[serde(rename = "APP_UNAVAILABLE")]
    Unavailable,
    #[serde(other)]
    Unknown,
}
