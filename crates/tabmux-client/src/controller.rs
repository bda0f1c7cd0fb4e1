//! Connection controller: drives one session's socket through
//! Idle → PendingConnect → Connecting → Open → Closed.
//!
//! The controller borrows the multiplexer's shared pieces (timers, connector,
//! configuration) for the duration of one operation on one session. All
//! rendering goes through the session's surface.

use std::collections::HashMap;

use tabmux_core::codec::{encode_keystrokes, encode_resize};
use tabmux_core::{LogControl, LogFrame, SessionKind, ShellFrame};
use tracing::{debug, info, warn};

use crate::config::{Endpoint, MuxConfig};
use crate::connection::{CloseReason, Connection, ConnectionId, Connector, Phase};
use crate::mux::TimerEvent;
use crate::reclaimer;
use crate::session::{Session, SessionKey};
use crate::surface::Banner;
use crate::timer::{TimerHandle, TimerWheel};

pub(crate) struct Controller<'a> {
    pub timers: &'a mut TimerWheel<TimerEvent>,
    pub connector: &'a mut dyn Connector,
    pub config: &'a MuxConfig,
    pub endpoint: &'a Endpoint,
    pub next_conn: &'a mut u64,
    /// Which session owns each live socket.
    pub routes: &'a mut HashMap<ConnectionId, SessionKey>,
}

impl Controller<'_> {
    /// Enter PendingConnect, cancelling any pending attempt and closing any
    /// live socket first.
    pub fn request_connect(&mut self, session: &mut Session) {
        if let Some(handle) = session.pending_connect.take() {
            self.timers.cancel(handle);
        }
        reclaimer::disarm(session, self.timers);
        self.close_connection(session, CloseReason::Replaced);

        let handle = self.timers.schedule(
            self.config.connect_debounce(),
            TimerEvent::Connect(session.key.clone()),
        );
        session.pending_connect = Some(handle);
        debug!(key = %session.key, "connect scheduled");
    }

    /// The debounce timer fired: construct the socket.
    pub fn connect_due(&mut self, session: &mut Session, handle: TimerHandle) {
        if session.pending_connect != Some(handle) {
            return;
        }
        session.pending_connect = None;
        session.attempted = true;

        let url = match self.endpoint.url(&session.target) {
            Ok(url) => url,
            Err(e) => {
                warn!(key = %session.key, "cannot build socket URL: {e}");
                write_banner(session, Banner::ConnectFailed(e.to_string()));
                return;
            }
        };

        *self.next_conn += 1;
        let id = ConnectionId(*self.next_conn);
        match self.connector.connect(id, &url) {
            Ok(()) => {
                info!(key = %session.key, conn = %id, url = %url, "connecting");
                session.connection = Some(Connection::new(id));
                self.routes.insert(id, session.key.clone());
            }
            Err(e) => {
                warn!(key = %session.key, "failed to create connection: {e}");
                write_banner(session, Banner::ConnectFailed(e.to_string()));
            }
        }
    }

    /// The handshake finished. A session that is not the active tab of a
    /// visible panel starts its grace period right away.
    pub fn opened(&mut self, session: &mut Session, conn: ConnectionId, foreground: bool) {
        let Some(connection) = session.connection.as_mut().filter(|c| c.id == conn) else {
            debug!(key = %session.key, conn = %conn, "ignoring open of superseded socket");
            return;
        };
        if connection.is_open() {
            return;
        }
        connection.phase = Phase::Open;
        session.has_connected = true;
        info!(key = %session.key, conn = %conn, "connected");

        if let Some(logs) = &session.logs {
            match LogControl::new(logs.tail_lines).encode() {
                Ok(frame) => self.send(conn, frame),
                Err(e) => warn!(key = %session.key, "failed to encode tail request: {e}"),
            }
        }
        write_banner(session, Banner::Connected);
        self.send_dimensions(session);
        if !foreground {
            reclaimer::arm(session, self.timers, self.config.idle_grace());
        }
    }

    pub fn message(&mut self, session: &mut Session, conn: ConnectionId, text: &str) {
        if !is_current(session, conn) {
            return;
        }
        match session.target.kind {
            SessionKind::Shell => self.shell_output(session, text),
            SessionKind::Logs => log_output(session, text),
        }
    }

    fn shell_output(&mut self, session: &mut Session, text: &str) {
        match ShellFrame::decode(text) {
            ShellFrame::Stdout(bytes) => {
                write_bytes(session, &bytes);
                self.note_first_output(session);
            }
            ShellFrame::Stderr(bytes) => write_bytes(session, &bytes),
            ShellFrame::Notice(message) => write_banner(session, Banner::Notice(message)),
            ShellFrame::Raw(text) => write_bytes(session, text.as_bytes()),
        }
    }

    /// Some backends reset the terminal size on their first write, so the
    /// size is announced again shortly after the first stdout frame.
    fn note_first_output(&mut self, session: &mut Session) {
        let key = session.key.clone();
        let Some(connection) = session.connection.as_mut() else {
            return;
        };
        if connection.output_seen {
            return;
        }
        connection.output_seen = true;
        connection.settle_timer = Some(
            self.timers
                .schedule(self.config.settle_delay(), TimerEvent::Settle(key)),
        );
    }

    pub fn settle_due(&mut self, session: &mut Session, handle: TimerHandle) {
        let Some(connection) = session.connection.as_mut() else {
            return;
        };
        if connection.settle_timer != Some(handle) {
            return;
        }
        connection.settle_timer = None;
        self.send_dimensions(session);
    }

    pub fn error(&mut self, session: &mut Session, conn: ConnectionId, message: &str) {
        if !is_current(session, conn) {
            return;
        }
        warn!(key = %session.key, conn = %conn, "socket error: {message}");
        write_banner(session, Banner::ConnectionError);
    }

    pub fn closed(&mut self, session: &mut Session, conn: ConnectionId, reason: Option<String>) {
        self.routes.remove(&conn);
        self.connector.release(conn);
        if !is_current(session, conn) {
            debug!(key = %session.key, conn = %conn, "ignoring close of superseded socket");
            return;
        }
        if let Some(connection) = session.connection.take() {
            if let Some(handle) = connection.settle_timer {
                self.timers.cancel(handle);
            }
        }
        reclaimer::disarm(session, self.timers);

        let reason = reason.filter(|r| !r.is_empty());
        info!(key = %session.key, conn = %conn, reason = ?reason, "connection closed");
        if reason.as_deref() == Some(CloseReason::Inactivity.as_str()) {
            write_banner(session, Banner::ClosedForInactivity);
        } else {
            write_banner(session, Banner::Closed(reason));
        }
    }

    /// Close an idle connection, keeping the session and its buffers.
    pub fn reclaim(&mut self, session: &mut Session) {
        if !session.is_open() {
            return;
        }
        info!(key = %session.key, "closing idle connection");
        write_banner(session, Banner::ClosedForInactivity);
        self.close_connection(session, CloseReason::Inactivity);
    }

    /// Drop the session's socket, if any. Later events for it are ignored.
    pub fn close_connection(&mut self, session: &mut Session, reason: CloseReason) {
        let Some(connection) = session.connection.take() else {
            return;
        };
        if let Some(handle) = connection.settle_timer {
            self.timers.cancel(handle);
        }
        self.routes.remove(&connection.id);
        self.connector.close(connection.id, reason);
        debug!(key = %session.key, conn = %connection.id, reason = reason.as_str(), "socket closed");
    }

    /// Forced transition to Closed: timers, socket and surface all go.
    pub fn teardown(&mut self, session: &mut Session) {
        if let Some(handle) = session.pending_connect.take() {
            self.timers.cancel(handle);
        }
        reclaimer::disarm(session, self.timers);
        self.close_connection(session, CloseReason::Removed);
        if let Some(mut surface) = session.surface.take() {
            surface.dispose();
        }
    }

    /// Forward keystrokes. Returns false when the session cannot take input.
    pub fn input(&mut self, session: &mut Session, data: &[u8]) -> bool {
        if session.kind() != SessionKind::Shell {
            return false;
        }
        let Some(conn) = open_connection(session) else {
            return false;
        };
        self.send(conn, encode_keystrokes(data));
        true
    }

    /// Re-measure the surface and announce the size if it changed.
    pub fn refit(&mut self, session: &mut Session) {
        let proposed = session.surface.as_mut().and_then(|s| s.fit());
        let Some(dims) = session.dims.propose(proposed) else {
            return;
        };
        debug!(key = %session.key, dims = %dims, "surface resized");
        if session.kind() != SessionKind::Shell {
            return;
        }
        if let Some(conn) = open_connection(session) {
            self.send(conn, encode_resize(dims));
        }
    }

    /// Announce the last known size, measuring the surface if nothing is
    /// stored yet.
    pub fn send_dimensions(&mut self, session: &mut Session) {
        if session.kind() != SessionKind::Shell {
            return;
        }
        let Some(conn) = open_connection(session) else {
            return;
        };
        let dims = match session.dims.current() {
            Some(dims) => dims,
            None => {
                let proposed = session.surface.as_mut().and_then(|s| s.fit());
                match session.dims.propose(proposed) {
                    Some(dims) => dims,
                    None => return,
                }
            }
        };
        self.send(conn, encode_resize(dims));
    }

    pub fn send(&mut self, conn: ConnectionId, frame: String) {
        if let Err(e) = self.connector.send(conn, frame) {
            warn!(conn = %conn, "send failed: {e}");
        }
    }
}

fn is_current(session: &Session, conn: ConnectionId) -> bool {
    session.connection.as_ref().is_some_and(|c| c.id == conn)
}

pub(crate) fn open_connection(session: &Session) -> Option<ConnectionId> {
    session
        .connection
        .as_ref()
        .filter(|c| c.is_open())
        .map(|c| c.id)
}

fn log_output(session: &mut Session, text: &str) {
    let Session {
        key, logs, surface, ..
    } = session;
    let Some(logs) = logs.as_mut() else {
        return;
    };
    match LogFrame::decode(text) {
        LogFrame::Line(line) => logs.push_line(&line, surface.as_mut()),
        LogFrame::Error(message) => {
            warn!(key = %key, "log backend error: {message}");
            if let Some(surface) = surface.as_mut() {
                surface.write_line(&Banner::LogError(message).render());
            }
        }
        LogFrame::Unknown => debug!(key = %key, "ignoring unrecognised log record"),
        LogFrame::Raw(text) => logs.push_raw(&text, surface.as_mut()),
    }
}

fn write_bytes(session: &mut Session, data: &[u8]) {
    if let Some(surface) = session.surface.as_mut() {
        surface.write(data);
    }
}

pub(crate) fn write_banner(session: &mut Session, banner: Banner) {
    if let Some(surface) = session.surface.as_mut() {
        surface.write_line(&banner.render());
    }
}
