use std::fmt;

/// State of the single physical connection.
///
/// Owned by the connection manager; consumers observe it, never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and no pending attempt.
    #[default]
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The transport is open and subscriptions have been replayed.
    Connected,
    /// Waiting out the reconnect delay before the next attempt.
    Reconnecting,
    /// The attempt cap was reached; only an explicit connect resumes.
    FailedPermanently,
}

impl ConnectionState {
    /// Whether the transport is usable.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the manager is idle waiting for an explicit `connect()`.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::FailedPermanently)
    }

    /// Lowercase name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::FailedPermanently => "failed_permanently",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
