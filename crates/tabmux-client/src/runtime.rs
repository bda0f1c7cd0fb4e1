//! Async driver for a [`Multiplexer`].
//!
//! The multiplexer runs on virtual time. `Runtime` pins that clock to a
//! `tokio::time::Instant` taken at construction and wakes up for whichever
//! comes first: a socket event or the next timer deadline.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::config::{Endpoint, MuxConfig};
use crate::connection::SocketEvent;
use crate::mux::Multiplexer;
use crate::surface::SurfaceFactory;
use crate::transport::WsConnector;

pub struct Runtime {
    mux: Multiplexer,
    events: mpsc::UnboundedReceiver<SocketEvent>,
    epoch: Instant,
}

impl Runtime {
    /// Multiplexer over real WebSocket connections.
    pub fn new(config: MuxConfig, endpoint: Endpoint, surfaces: Box<dyn SurfaceFactory>) -> Self {
        let (connector, events) = WsConnector::new();
        let mux = Multiplexer::create(config, endpoint, Box::new(connector), surfaces);
        Self::with_parts(mux, events)
    }

    /// Drive an already assembled multiplexer whose connector reports on
    /// `events`.
    pub fn with_parts(mux: Multiplexer, events: mpsc::UnboundedReceiver<SocketEvent>) -> Self {
        Self {
            mux,
            events,
            epoch: Instant::now(),
        }
    }

    /// The multiplexer, with its clock brought up to date first.
    pub fn mux(&mut self) -> &mut Multiplexer {
        self.sync();
        &mut self.mux
    }

    fn sync(&mut self) {
        let now = self.epoch.elapsed();
        self.mux.advance_to(now);
    }

    /// Wait for one socket event or timer deadline and apply it. Returns
    /// `false` when there is nothing left to wait for.
    pub async fn pump(&mut self) -> bool {
        self.sync();
        let deadline = self.mux.next_deadline().map(|d| self.epoch + d);
        let wake = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            event = self.events.recv() => match event {
                Some(event) => {
                    self.sync();
                    self.mux.handle_socket_event(event);
                    true
                }
                None => match deadline {
                    Some(deadline) => {
                        sleep_until(deadline).await;
                        self.sync();
                        true
                    }
                    None => false,
                },
            },
            _ = sleep_until(wake), if deadline.is_some() => {
                self.sync();
                true
            }
        }
    }

    /// Close every session.
    pub fn shutdown(self) {
        self.mux.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{CloseReason, ConnectionId, ConnectionState, Connector};
    use crate::testing::MockSurfaces;
    use std::sync::{Arc, Mutex};
    use tabmux_core::MuxResult;

    /// Opens every socket immediately and records what is sent.
    struct LoopbackConnector {
        events: mpsc::UnboundedSender<SocketEvent>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Connector for LoopbackConnector {
        fn connect(&mut self, conn: ConnectionId, _url: &str) -> MuxResult<()> {
            let _ = self.events.send(SocketEvent::Opened { conn });
            Ok(())
        }

        fn send(&mut self, _conn: ConnectionId, frame: String) -> MuxResult<()> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        fn close(&mut self, _conn: ConnectionId, _reason: CloseReason) {}
    }

    #[tokio::test]
    async fn pump_connects_after_debounce() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let connector = LoopbackConnector {
            events: tx,
            sent: sent.clone(),
        };
        let config = MuxConfig {
            connect_debounce_ms: 20,
            ..MuxConfig::default()
        };
        let endpoint = Endpoint::new("ws://localhost:8080", "ns", "app");
        let (surfaces, _log) = MockSurfaces::new();
        let mux = Multiplexer::create(config, endpoint, Box::new(connector), Box::new(surfaces));
        let mut runtime = Runtime::with_parts(mux, rx);

        let key = runtime.mux().open_shell("web", "i1", "main");
        assert_eq!(
            runtime.mux().state(&key),
            Some(ConnectionState::PendingConnect)
        );

        for _ in 0..10 {
            if runtime.mux().state(&key) == Some(ConnectionState::Open) {
                break;
            }
            assert!(runtime.pump().await);
        }
        assert_eq!(runtime.mux().state(&key), Some(ConnectionState::Open));
        assert_eq!(sent.lock().unwrap().as_slice(), ["resize:120:24"]);
        runtime.shutdown();
    }
}
