use std::time::Duration;

/// Configuration inputs enumerated in the protocol core's external
/// interface: sender identity prefix, default receiver destination, and the
/// timing knobs for requests and the heartbeat subsystem.
///
/// Defaults match the protocol core's documented defaults, the same way
/// `ConnectState` and `DecodeState` in the teacher's codec lean on `Default`
/// rather than requiring callers to spell out every field.
#[derive(Clone, Debug)]
pub struct Config {
    /// Prefix before the random UUID in the generated sender id.
    pub sender_name_base: String,
    /// Destination id for receiver-namespace requests until a specific
    /// application's transport id is known.
    pub default_receiver_id: String,
    /// Default per-call timeout for operations that don't override it.
    pub request_timeout: Duration,
    /// Heartbeat PING cadence.
    pub ping_interval: Duration,
    /// Watchdog bound; no PONG within this window kills the connection.
    pub pong_timeout: Duration,
    /// Upper bound on the size of any single frame.
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sender_name_base: "sender-0".to_owned(),
            default_receiver_id: "receiver-0".to_owned(),
            request_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(10),
            max_frame_size: 64 << 10,
        }
    }
}
