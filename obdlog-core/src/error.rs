//! Error taxonomy for the transport engine.

/// Errors surfaced by the connection manager and command session.
///
/// Everything here is recovered below the polling loop: `NotConnected`
/// triggers a reconnect, `Transport` a disconnect-and-cooldown. An empty
/// reply after a fully elapsed timeout is *not* an error; it is reported as
/// [`crate::session::Reply::NoData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObdError {
    /// Malformed address, empty command or zero reply capacity.
    InvalidArgument(String),
    /// A connect attempt is already in flight.
    AlreadyConnecting,
    /// Operation attempted without a live link.
    NotConnected,
    /// Underlying send failed or the inbound queue is unavailable.
    Transport(String),
}

impl std::fmt::Display for ObdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::AlreadyConnecting => write!(f, "connect already in progress"),
            Self::NotConnected => write!(f, "not connected to adapter"),
            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl std::error::Error for ObdError {}
