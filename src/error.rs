use std::error;
use std::fmt;
use std::io;

/// Errors produced by the framed channel, the requestor, and the receiver
/// controller.
///
/// This mirrors the error taxonomy of the protocol core: a connection-level
/// failure (`Io`), a protocol-level failure (`Protocol`), a per-call
/// deadline (`Timeout`), an operation attempted on a channel that is not
/// `Open` (`NotConnected`), and a waiter that was woken by something other
/// than a reply or a timeout (`Interrupted`).
#[derive(Debug)]
pub enum Error {
    /// TCP/TLS failure, unexpected EOF, a write failure, or the channel
    /// closing while a call was outstanding.
    Io(io::Error),
    /// Framing overflow, a malformed payload, an unexpected response type,
    /// or a device-signalled error type such as `LAUNCH_ERROR`. The string
    /// is the effective type tag that triggered the failure.
    Protocol(String),
    /// The call's deadline elapsed with no correlated response.
    Timeout,
    /// The operation was attempted on a channel that is not `Open`.
    NotConnected,
    /// The caller's wait was interrupted before a reply or a timeout.
    Interrupted,
}

impl Error {
    pub(crate) fn protocol(tag: impl Into<String>) -> Self {
        Error::Protocol(tag.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "cast channel io error: {}", err),
            Error::Protocol(ref tag) => write!(f, "cast protocol error: {}", tag),
            Error::Timeout => write!(f, "cast request timed out"),
            Error::NotConnected => write!(f, "cast channel is not connected"),
            Error::Interrupted => write!(f, "cast request was interrupted"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        Error::protocol("parse_error")
    }
}

impl From<protobuf::ProtobufError> for Error {
    fn from(_: protobuf::ProtobufError) -> Self {
        Error::protocol("parse_error")
    }
}
