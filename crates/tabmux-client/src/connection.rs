//! Socket seam of the multiplexer.
//!
//! The multiplexer never owns a socket directly. It asks a [`Connector`] to
//! open, write to and close sockets by [`ConnectionId`], and the connector
//! reports back with [`SocketEvent`] messages that the host feeds into
//! `Multiplexer::handle_socket_event`.

use std::fmt;

use tabmux_core::MuxResult;

use crate::timer::TimerHandle;

/// Process-unique identifier of one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Lifecycle state of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never asked to connect.
    Idle,
    /// Debounce timer running.
    PendingConnect,
    /// Socket constructed, handshake in flight.
    Connecting,
    /// Established; keystrokes and resizes are forwarded.
    Open,
    /// The last connection ended. A new request re-enters `PendingConnect`.
    Closed,
}

/// Why the multiplexer closed a socket itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The idle reclaimer timed the session out.
    Inactivity,
    /// A newer connection attempt superseded this one.
    Replaced,
    /// The session was removed or the multiplexer torn down.
    Removed,
}

impl CloseReason {
    /// Reason string carried in the close frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactivity => "inactivity",
            Self::Replaced => "replaced",
            Self::Removed => "closed",
        }
    }
}

/// Something that happened on a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened {
        conn: ConnectionId,
    },
    Message {
        conn: ConnectionId,
        text: String,
    },
    Error {
        conn: ConnectionId,
        message: String,
    },
    Closed {
        conn: ConnectionId,
        reason: Option<String>,
    },
}

impl SocketEvent {
    pub fn conn(&self) -> ConnectionId {
        match self {
            Self::Opened { conn }
            | Self::Message { conn, .. }
            | Self::Error { conn, .. }
            | Self::Closed { conn, .. } => *conn,
        }
    }
}

/// Opens and drives message sockets on behalf of the multiplexer.
///
/// Implementations must report every outcome of `connect` asynchronously:
/// `Opened` on success, and `Closed` (optionally preceded by `Error`) when a
/// socket ends for any reason other than a `close` call.
pub trait Connector {
    /// Start connecting `conn` to `url`. An `Err` means the socket could not
    /// even be constructed.
    fn connect(&mut self, conn: ConnectionId, url: &str) -> MuxResult<()>;

    /// Queue one text frame on an open socket.
    fn send(&mut self, conn: ConnectionId, frame: String) -> MuxResult<()>;

    /// Close a socket. Events arriving for `conn` afterwards are ignored.
    fn close(&mut self, conn: ConnectionId, reason: CloseReason);

    /// Forget a socket that closed on its own.
    fn release(&mut self, _conn: ConnectionId) {}
}

/// Phase of a live connection owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Connecting,
    Open,
}

/// The session's handle on its current socket.
#[derive(Debug)]
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub phase: Phase,
    /// Set once the first stdout frame arrived on this socket.
    pub output_seen: bool,
    /// Pending follow-up resize after the first output frame.
    pub settle_timer: Option<TimerHandle>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: Phase::Connecting,
            output_seen: false,
            settle_timer: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }
}
