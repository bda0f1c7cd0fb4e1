//! Recording doubles for the connector and surface seams, plus a harness
//! that wires them into a multiplexer driven by virtual time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tabmux_core::{Dimensions, MuxError, MuxResult, SessionKind};

use crate::config::{Endpoint, MuxConfig};
use crate::connection::{CloseReason, ConnectionId, Connector, SocketEvent};
use crate::mux::Multiplexer;
use crate::session::SessionKey;
use crate::surface::{Surface, SurfaceFactory};

#[derive(Debug, Default)]
pub struct SocketRecord {
    pub connects: Vec<(ConnectionId, String)>,
    pub sent: Vec<(ConnectionId, String)>,
    pub closed: Vec<(ConnectionId, CloseReason)>,
    pub released: Vec<ConnectionId>,
    pub fail_connect: bool,
}

#[derive(Clone, Default)]
pub struct SocketLog(Arc<Mutex<SocketRecord>>);

impl SocketLog {
    pub fn with<R>(&self, f: impl FnOnce(&mut SocketRecord) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    /// Frames sent on `conn`, in order.
    pub fn sent_on(&self, conn: ConnectionId) -> Vec<String> {
        self.with(|r| {
            r.sent
                .iter()
                .filter(|(c, _)| *c == conn)
                .map(|(_, f)| f.clone())
                .collect()
        })
    }

    pub fn connect_count(&self) -> usize {
        self.with(|r| r.connects.len())
    }

    pub fn close_count(&self) -> usize {
        self.with(|r| r.closed.len())
    }
}

pub struct MockConnector {
    log: SocketLog,
}

impl MockConnector {
    pub fn new() -> (Self, SocketLog) {
        let log = SocketLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Connector for MockConnector {
    fn connect(&mut self, conn: ConnectionId, url: &str) -> MuxResult<()> {
        self.log.with(|r| {
            if r.fail_connect {
                return Err(MuxError::Transport("refused".into()));
            }
            r.connects.push((conn, url.to_string()));
            Ok(())
        })
    }

    fn send(&mut self, conn: ConnectionId, frame: String) -> MuxResult<()> {
        self.log.with(|r| r.sent.push((conn, frame)));
        Ok(())
    }

    fn close(&mut self, conn: ConnectionId, reason: CloseReason) {
        self.log.with(|r| r.closed.push((conn, reason)));
    }

    fn release(&mut self, conn: ConnectionId) {
        self.log.with(|r| r.released.push(conn));
    }
}

#[derive(Debug, Default, Clone)]
pub struct SurfaceRecord {
    pub text: String,
    pub clears: usize,
    pub scrolls: usize,
    pub disposed: bool,
    pub fit: Option<Dimensions>,
}

#[derive(Clone, Default)]
pub struct SurfaceLog {
    records: Arc<Mutex<HashMap<SessionKey, SurfaceRecord>>>,
    default_fit: Arc<Mutex<Option<Dimensions>>>,
    fail: Arc<Mutex<bool>>,
}

impl SurfaceLog {
    pub fn get(&self, key: &SessionKey) -> SurfaceRecord {
        self.records
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn text(&self, key: &SessionKey) -> String {
        self.get(key).text
    }

    pub fn exists(&self, key: &SessionKey) -> bool {
        self.records.lock().unwrap().contains_key(key)
    }

    /// What the surface of `key` will measure from now on.
    pub fn set_fit(&self, key: &SessionKey, dims: Option<Dimensions>) {
        self.records
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .fit = dims;
    }

    /// What newly created surfaces measure.
    pub fn set_default_fit(&self, dims: Option<Dimensions>) {
        *self.default_fit.lock().unwrap() = dims;
    }

    pub fn fail_creation(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn update(&self, key: &SessionKey, f: impl FnOnce(&mut SurfaceRecord)) {
        f(self.records.lock().unwrap().entry(key.clone()).or_default());
    }
}

pub struct MockSurface {
    key: SessionKey,
    log: SurfaceLog,
}

impl Surface for MockSurface {
    fn write(&mut self, data: &[u8]) {
        self.log
            .update(&self.key, |r| r.text.push_str(&String::from_utf8_lossy(data)));
    }

    fn clear(&mut self) {
        self.log.update(&self.key, |r| {
            r.text.clear();
            r.clears += 1;
        });
    }

    fn scroll_to_bottom(&mut self) {
        self.log.update(&self.key, |r| r.scrolls += 1);
    }

    fn fit(&mut self) -> Option<Dimensions> {
        self.log.get(&self.key).fit
    }

    fn dispose(&mut self) {
        self.log.update(&self.key, |r| r.disposed = true);
    }
}

pub struct MockSurfaces {
    log: SurfaceLog,
}

impl MockSurfaces {
    pub fn new() -> (Self, SurfaceLog) {
        let log = SurfaceLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl SurfaceFactory for MockSurfaces {
    fn create(&mut self, key: &SessionKey, _kind: SessionKind) -> MuxResult<Box<dyn Surface>> {
        if *self.log.fail.lock().unwrap() {
            return Err(MuxError::Surface("no room for another terminal".into()));
        }
        let fit = *self.log.default_fit.lock().unwrap();
        self.log.records.lock().unwrap().insert(
            key.clone(),
            SurfaceRecord {
                fit,
                ..SurfaceRecord::default()
            },
        );
        Ok(Box::new(MockSurface {
            key: key.clone(),
            log: self.log.clone(),
        }))
    }
}

/// A multiplexer over mock seams, with helpers to play the remote side.
pub struct Harness {
    pub mux: Multiplexer,
    pub sockets: SocketLog,
    pub surfaces: SurfaceLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MuxConfig::default())
    }

    pub fn with_config(config: MuxConfig) -> Self {
        let (connector, sockets) = MockConnector::new();
        let (factory, surfaces) = MockSurfaces::new();
        let endpoint = Endpoint::new("wss://console.example.com", "prod", "web");
        let mux = Multiplexer::create(config, endpoint, Box::new(connector), Box::new(factory));
        Self {
            mux,
            sockets,
            surfaces,
        }
    }

    pub fn advance(&mut self, delta: Duration) {
        self.mux.advance_by(delta);
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// The session's current socket, if any.
    pub fn conn(&self, key: &SessionKey) -> Option<ConnectionId> {
        self.mux
            .registry
            .get(key)?
            .connection
            .as_ref()
            .map(|c| c.id)
    }

    /// Let the connect debounce run out and complete the handshake.
    pub fn connect(&mut self, key: &SessionKey) -> ConnectionId {
        let debounce = self.mux.config.connect_debounce();
        self.advance(debounce);
        let conn = self.conn(key).expect("no socket after debounce");
        self.mux.handle_socket_event(SocketEvent::Opened { conn });
        conn
    }

    pub fn open_shell(&mut self, instance: &str) -> (SessionKey, ConnectionId) {
        let key = self.mux.open_shell(instance, instance, "main");
        let conn = self.connect(&key);
        (key, conn)
    }

    pub fn open_logs(&mut self, instance: &str) -> (SessionKey, ConnectionId) {
        let key = self.mux.open_logs(instance, instance, "main");
        let conn = self.connect(&key);
        (key, conn)
    }

    pub fn deliver(&mut self, conn: ConnectionId, text: &str) {
        self.mux.handle_socket_event(SocketEvent::Message {
            conn,
            text: text.to_string(),
        });
    }

    pub fn remote_close(&mut self, conn: ConnectionId, reason: Option<&str>) {
        self.mux.handle_socket_event(SocketEvent::Closed {
            conn,
            reason: reason.map(str::to_string),
        });
    }

    /// Structural invariants that must hold after any operation.
    pub fn check_invariants(&self) {
        for session in self.mux.registry.iter() {
            if let Some(handle) = session.pending_connect {
                assert!(self.mux.timers.is_pending(handle), "{} stale pending", session.key);
                assert!(session.connection.is_none(), "{} pending while connected", session.key);
            }
        }
        let live = self.mux.live_connections();
        assert_eq!(self.mux.routes.len(), live, "route per live socket");
        if let Some(active) = self.mux.active_key() {
            assert!(self.mux.contains(active));
        }
    }
}
