//! One multiplexed session: a shell or log tail bound to a container.
//!
//! A `Session` outlives its connections. It keeps its surface, log buffer
//! and preferences while sockets come and go underneath it.

use std::fmt;

use tabmux_core::{Dimensions, SessionKind};

use crate::connection::{Connection, ConnectionState, Phase};
use crate::logview::LogView;
use crate::negotiator::Negotiator;
use crate::surface::Surface;
use crate::timer::TimerHandle;

/// Stable registry key: kind, instance and sub-component compared as a
/// tuple. The dashed form from `Display` is for logs and labels only and
/// is not unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(Target);

impl SessionKey {
    pub fn new(kind: SessionKind, instance: &str, component: &str) -> Self {
        Self(Target::new(kind, instance, component))
    }

    pub fn for_target(target: &Target) -> Self {
        Self(target.clone())
    }

    pub fn target(&self) -> &Target {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Target {
            kind,
            instance,
            component,
        } = &self.0;
        write!(f, "{}-{instance}-{component}", kind.key_prefix())
    }
}

/// What a session is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: SessionKind,
    /// Container instance reference.
    pub instance: String,
    /// Sub-component (container) reference within the instance.
    pub component: String,
}

impl Target {
    pub fn new(kind: SessionKind, instance: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            kind,
            instance: instance.into(),
            component: component.into(),
        }
    }
}

/// Read-only snapshot of a session for hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub key: SessionKey,
    pub name: String,
    pub target: Target,
    pub state: ConnectionState,
    pub dimensions: Option<Dimensions>,
    pub active: bool,
}

pub struct Session {
    pub(crate) key: SessionKey,
    pub(crate) name: String,
    pub(crate) target: Target,
    /// At most one live connection.
    pub(crate) connection: Option<Connection>,
    pub(crate) surface: Option<Box<dyn Surface>>,
    pub(crate) dims: Negotiator,
    /// Present for log sessions only.
    pub(crate) logs: Option<LogView>,
    pub(crate) pending_connect: Option<TimerHandle>,
    pub(crate) reclaim_timer: Option<TimerHandle>,
    /// Picks "Reconnecting..." over "Connecting..." once true.
    pub(crate) has_connected: bool,
    /// Set when the first socket was constructed; distinguishes Closed from Idle.
    pub(crate) attempted: bool,
}

impl Session {
    pub(crate) fn new(name: String, target: Target, tail_lines: u32) -> Self {
        let logs = match target.kind {
            SessionKind::Logs => Some(LogView::new(tail_lines)),
            SessionKind::Shell => None,
        };
        Self {
            key: SessionKey::for_target(&target),
            name,
            target,
            connection: None,
            surface: None,
            dims: Negotiator::new(),
            logs,
            pending_connect: None,
            reclaim_timer: None,
            has_connected: false,
            attempted: false,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SessionKind {
        self.target.kind
    }

    pub fn state(&self) -> ConnectionState {
        match &self.connection {
            Some(conn) if conn.phase == Phase::Open => ConnectionState::Open,
            Some(_) => ConnectionState::Connecting,
            None if self.pending_connect.is_some() => ConnectionState::PendingConnect,
            None if self.attempted => ConnectionState::Closed,
            None => ConnectionState::Idle,
        }
    }

    pub fn is_open(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_open)
    }

    pub(crate) fn info(&self, active: bool) -> SessionInfo {
        SessionInfo {
            key: self.key.clone(),
            name: self.name.clone(),
            target: self.target.clone(),
            state: self.state(),
            dimensions: self.dims.current(),
            active,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("dims", &self.dims.current())
            .field("has_surface", &self.surface.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;

    #[test]
    fn keys_distinguish_kinds() {
        let shell = SessionKey::new(SessionKind::Shell, "i1", "main");
        let logs = SessionKey::new(SessionKind::Logs, "i1", "main");
        assert_eq!(shell.to_string(), "tab-i1-main");
        assert_eq!(logs.to_string(), "log-tab-i1-main");
        assert_ne!(shell, logs);
    }

    #[test]
    fn dashes_in_refs_do_not_merge_keys() {
        let a = SessionKey::new(SessionKind::Shell, "web-0", "app");
        let b = SessionKey::new(SessionKind::Shell, "web", "0-app");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
        assert_eq!(a.target().instance, "web-0");
    }

    #[test]
    fn state_follows_connection() {
        let mut s = Session::new("web".into(), Target::new(SessionKind::Shell, "i1", "main"), 100);
        assert_eq!(s.state(), ConnectionState::Idle);
        assert!(s.logs.is_none());

        s.attempted = true;
        s.connection = Some(Connection::new(ConnectionId(1)));
        assert_eq!(s.state(), ConnectionState::Connecting);

        s.connection.as_mut().unwrap().phase = Phase::Open;
        assert!(s.is_open());

        s.connection = None;
        assert_eq!(s.state(), ConnectionState::Closed);
    }

    #[test]
    fn log_sessions_get_a_log_view() {
        let s = Session::new("web".into(), Target::new(SessionKind::Logs, "i1", "main"), 200);
        assert_eq!(s.logs.as_ref().map(|l| l.tail_lines), Some(200));
    }
}
