//! The session multiplexer.
//!
//! `Multiplexer` owns the registry of sessions and everything shared between
//! them: the timer wheel, the socket connector, the surface factory and the
//! configuration. It is single-threaded and never blocks. Hosts feed it
//! socket events ([`Multiplexer::handle_socket_event`]), the passage of time
//! ([`Multiplexer::advance_to`]) and user actions, and read back
//! [`MuxEvent`]s describing tab and panel changes.
//!
//! Tab operations live in `tabs.rs`, panel visibility in `panel.rs`.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tabmux_core::{Dimensions, LogControl, MuxError, MuxResult, SessionKind};
use tracing::debug;

use crate::config::{Endpoint, MuxConfig};
use crate::connection::{ConnectionId, ConnectionState, Connector, SocketEvent};
use crate::controller::{open_connection, write_banner, Controller};
use crate::logview::{export_file_name, LogExport, LogView};
use crate::reclaimer;
use crate::registry::Registry;
use crate::session::{Session, SessionInfo, SessionKey};
use crate::surface::{Banner, SurfaceFactory};
use crate::timer::{TimerHandle, TimerWheel};

/// Payload of every timer the multiplexer schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// Debounced connect of a session.
    Connect(SessionKey),
    /// Idle grace period of a background session ran out.
    Reclaim(SessionKey),
    /// Follow-up resize after the first stdout frame.
    Settle(SessionKey),
    /// Window resize storm went quiet.
    WindowResize,
}

/// Tab and panel changes for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    TabOpened {
        key: SessionKey,
        name: String,
        kind: SessionKind,
    },
    TabActivated {
        key: SessionKey,
    },
    TabClosed {
        key: SessionKey,
    },
    ShowPanel,
    HidePanel,
}

pub struct Multiplexer {
    pub(crate) registry: Registry,
    pub(crate) timers: TimerWheel<TimerEvent>,
    pub(crate) connector: Box<dyn Connector>,
    pub(crate) surfaces: Box<dyn SurfaceFactory>,
    pub(crate) config: MuxConfig,
    pub(crate) endpoint: Endpoint,
    pub(crate) next_conn: u64,
    pub(crate) routes: HashMap<ConnectionId, SessionKey>,
    pub(crate) visible: bool,
    pub(crate) resize_timer: Option<TimerHandle>,
    pub(crate) events: VecDeque<MuxEvent>,
}

impl Multiplexer {
    /// Create an empty multiplexer with a hidden panel.
    pub fn create(
        config: MuxConfig,
        endpoint: Endpoint,
        connector: Box<dyn Connector>,
        surfaces: Box<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            registry: Registry::new(),
            timers: TimerWheel::new(),
            connector,
            surfaces,
            config,
            endpoint,
            next_conn: 0,
            routes: HashMap::new(),
            visible: false,
            resize_timer: None,
            events: VecDeque::new(),
        }
    }

    /// Close every session and release the multiplexer.
    pub fn teardown(mut self) {
        self.close_all();
    }

    /// Split into the registry and a controller over the shared pieces.
    pub(crate) fn parts(&mut self) -> (&mut Registry, Controller<'_>) {
        let Self {
            registry,
            timers,
            connector,
            config,
            endpoint,
            next_conn,
            routes,
            ..
        } = self;
        (
            registry,
            Controller {
                timers,
                connector: connector.as_mut(),
                config,
                endpoint,
                next_conn,
                routes,
            },
        )
    }

    pub(crate) fn session_mut(&mut self, key: &SessionKey) -> MuxResult<&mut Session> {
        self.registry
            .get_mut(key)
            .ok_or_else(|| MuxError::SessionNotFound(key.to_string()))
    }

    // ── time ────────────────────────────────────────────────────────────

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// When the next timer is due, on the same clock as [`Self::advance_to`].
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Move the clock to `now` and fire every timer that came due, in
    /// deadline order.
    pub fn advance_to(&mut self, now: Duration) {
        self.timers.set_now(now);
        while let Some((handle, event)) = self.timers.pop_due() {
            self.fire(handle, event);
        }
    }

    pub fn advance_by(&mut self, delta: Duration) {
        let now = self.timers.now() + delta;
        self.advance_to(now);
    }

    fn fire(&mut self, handle: TimerHandle, event: TimerEvent) {
        match event {
            TimerEvent::Connect(key) => {
                let (registry, mut ctl) = self.parts();
                if let Some(session) = registry.get_mut(&key) {
                    ctl.connect_due(session, handle);
                }
            }
            TimerEvent::Settle(key) => {
                let (registry, mut ctl) = self.parts();
                if let Some(session) = registry.get_mut(&key) {
                    ctl.settle_due(session, handle);
                }
            }
            TimerEvent::Reclaim(key) => {
                let foreground = self.visible && self.registry.is_active(&key);
                let (registry, mut ctl) = self.parts();
                let Some(session) = registry.get_mut(&key) else {
                    return;
                };
                if session.reclaim_timer != Some(handle) {
                    return;
                }
                session.reclaim_timer = None;
                if reclaimer::should_reclaim(session, foreground) {
                    ctl.reclaim(session);
                }
            }
            TimerEvent::WindowResize => {
                if self.resize_timer == Some(handle) {
                    self.resize_timer = None;
                    self.refit_all();
                }
            }
        }
    }

    // ── sockets ─────────────────────────────────────────────────────────

    /// Apply one event reported by the connector.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        let conn = event.conn();
        let Some(key) = self.routes.get(&conn).cloned() else {
            debug!(conn = %conn, "event for closed socket ignored");
            return;
        };
        let foreground = self.visible && self.registry.is_active(&key);
        let (registry, mut ctl) = self.parts();
        let Some(session) = registry.get_mut(&key) else {
            ctl.routes.remove(&conn);
            return;
        };
        match event {
            SocketEvent::Opened { .. } => ctl.opened(session, conn, foreground),
            SocketEvent::Message { text, .. } => ctl.message(session, conn, &text),
            SocketEvent::Error { message, .. } => ctl.error(session, conn, &message),
            SocketEvent::Closed { reason, .. } => ctl.closed(session, conn, reason),
        }
    }

    // ── input and sizing ────────────────────────────────────────────────

    /// Forward keystrokes typed into a session's surface. Returns whether
    /// they were sent; input to a session without an Open shell is dropped.
    pub fn input(&mut self, key: &SessionKey, data: &[u8]) -> MuxResult<bool> {
        let (registry, mut ctl) = self.parts();
        let session = registry
            .get_mut(key)
            .ok_or_else(|| MuxError::SessionNotFound(key.to_string()))?;
        Ok(ctl.input(session, data))
    }

    /// Re-measure one session's surface.
    pub fn refit(&mut self, key: &SessionKey) -> MuxResult<()> {
        let (registry, mut ctl) = self.parts();
        let session = registry
            .get_mut(key)
            .ok_or_else(|| MuxError::SessionNotFound(key.to_string()))?;
        ctl.refit(session);
        Ok(())
    }

    /// The hosting window changed size. Every session refits once the
    /// resize storm has been quiet for the debounce period.
    pub fn window_resized(&mut self) {
        if let Some(handle) = self.resize_timer.take() {
            self.timers.cancel(handle);
        }
        let delay = self.config.resize_debounce();
        self.resize_timer = Some(self.timers.schedule(delay, TimerEvent::WindowResize));
    }

    fn refit_all(&mut self) {
        let (registry, mut ctl) = self.parts();
        for session in registry.iter_mut() {
            ctl.refit(session);
        }
    }

    // ── log sessions ────────────────────────────────────────────────────

    fn log_session(&mut self, key: &SessionKey) -> MuxResult<&mut Session> {
        let session = self.session_mut(key)?;
        if session.logs.is_none() {
            return Err(MuxError::Other(format!("{key} is not a log session")));
        }
        Ok(session)
    }

    /// Change the history depth. An Open session re-requests its logs from
    /// scratch, dropping what was shown and buffered so far.
    pub fn set_tail_lines(&mut self, key: &SessionKey, tail_lines: u32) -> MuxResult<()> {
        if tail_lines == 0 {
            return Err(MuxError::Other("tail_lines must be at least 1".into()));
        }
        let frame = LogControl::new(tail_lines).encode()?;
        self.log_session(key)?;

        let (registry, mut ctl) = self.parts();
        let Some(session) = registry.get_mut(key) else {
            return Err(MuxError::SessionNotFound(key.to_string()));
        };
        if let Some(logs) = session.logs.as_mut() {
            logs.tail_lines = tail_lines;
        }
        let Some(conn) = open_connection(session) else {
            return Ok(());
        };
        ctl.send(conn, frame);
        if let Some(logs) = session.logs.as_mut() {
            logs.clear();
        }
        if let Some(surface) = session.surface.as_mut() {
            surface.clear();
        }
        write_banner(session, Banner::RequestingLogs);
        Ok(())
    }

    pub fn set_auto_scroll(&mut self, key: &SessionKey, enabled: bool) -> MuxResult<()> {
        let Session { logs, surface, .. } = self.log_session(key)?;
        if let Some(logs) = logs.as_mut() {
            logs.auto_scroll = enabled;
        }
        if enabled {
            if let Some(surface) = surface.as_mut() {
                surface.scroll_to_bottom();
            }
        }
        Ok(())
    }

    /// Toggle timestamp display and redraw the buffer accordingly.
    pub fn set_show_timestamps(&mut self, key: &SessionKey, enabled: bool) -> MuxResult<()> {
        let Session { logs, surface, .. } = self.log_session(key)?;
        let Some(logs) = logs.as_mut() else {
            return Ok(());
        };
        logs.show_timestamps = enabled;
        if let Some(surface) = surface.as_mut() {
            logs.redraw(surface.as_mut());
        }
        Ok(())
    }

    /// Erase a session's surface, and its log buffer for log sessions.
    pub fn clear_output(&mut self, key: &SessionKey) -> MuxResult<()> {
        let session = self.session_mut(key)?;
        if let Some(surface) = session.surface.as_mut() {
            surface.clear();
        }
        if let Some(logs) = session.logs.as_mut() {
            logs.clear();
        }
        Ok(())
    }

    /// Package a log session's buffer for download.
    pub fn export_logs(&self, key: &SessionKey, at: DateTime<Utc>) -> MuxResult<LogExport> {
        let session = self
            .registry
            .get(key)
            .ok_or_else(|| MuxError::SessionNotFound(key.to_string()))?;
        let logs = session
            .logs
            .as_ref()
            .ok_or_else(|| MuxError::Other(format!("{key} is not a log session")))?;
        Ok(LogExport {
            file_name: export_file_name(&session.name, at),
            contents: logs.content().to_string(),
        })
    }

    pub fn log_content(&self, key: &SessionKey) -> Option<&str> {
        self.log_view(key).map(LogView::content)
    }

    /// Buffer and display preferences of a log session.
    pub fn log_view(&self, key: &SessionKey) -> Option<&LogView> {
        self.registry.get(key)?.logs.as_ref()
    }

    // ── introspection ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.registry.contains(key)
    }

    pub fn active_key(&self) -> Option<&SessionKey> {
        self.registry.active()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn state(&self, key: &SessionKey) -> Option<ConnectionState> {
        self.registry.get(key).map(Session::state)
    }

    pub fn dimensions(&self, key: &SessionKey) -> Option<Dimensions> {
        self.registry.get(key)?.dims.current()
    }

    pub fn session_info(&self, key: &SessionKey) -> Option<SessionInfo> {
        let session = self.registry.get(key)?;
        Some(session.info(self.registry.is_active(key)))
    }

    /// Snapshot of every session in tab order.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry
            .iter()
            .map(|s| s.info(self.registry.is_active(&s.key)))
            .collect()
    }

    /// Timers of any kind still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Sockets currently owned by a session.
    pub fn live_connections(&self) -> usize {
        self.registry
            .iter()
            .filter(|s| s.connection.is_some())
            .count()
    }

    /// Take the tab and panel events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<MuxEvent> {
        self.events.drain(..).collect()
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.close_all();
        }
    }
}
