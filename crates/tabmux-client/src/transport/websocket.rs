//! WebSocket connector.
//!
//! Each connection runs in its own task: it performs the handshake, then
//! forwards commands from the multiplexer to the socket and socket traffic
//! back as [`SocketEvent`]s on one channel shared by all connections.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use tabmux_core::{MuxError, MuxResult};

use crate::connection::{CloseReason, ConnectionId, Connector, SocketEvent};

/// What the multiplexer asks a connection task to do.
#[derive(Debug)]
enum LinkCommand {
    Send(String),
    Close(CloseReason),
}

struct Link {
    commands: mpsc::UnboundedSender<LinkCommand>,
    task: JoinHandle<()>,
}

/// [`Connector`] backed by `tokio-tungstenite`. Must be used from within a
/// tokio runtime.
pub struct WsConnector {
    events: mpsc::UnboundedSender<SocketEvent>,
    links: HashMap<ConnectionId, Link>,
}

impl WsConnector {
    /// Create a connector and the receiver its socket events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SocketEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                links: HashMap::new(),
            },
            rx,
        )
    }

    /// Connection tasks not yet closed or released.
    pub fn live_links(&self) -> usize {
        self.links.len()
    }
}

impl Connector for WsConnector {
    fn connect(&mut self, conn: ConnectionId, url: &str) -> MuxResult<()> {
        let request = url
            .into_client_request()
            .map_err(|e| MuxError::Transport(format!("invalid socket URL {url}: {e}")))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MuxError::Transport(format!("no async runtime: {e}")))?;

        let (commands, rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_link(conn, request, rx, self.events.clone()));
        self.links.insert(conn, Link { commands, task });
        Ok(())
    }

    fn send(&mut self, conn: ConnectionId, frame: String) -> MuxResult<()> {
        let link = self
            .links
            .get(&conn)
            .ok_or_else(|| MuxError::Transport(format!("{conn} is not connected")))?;
        link.commands
            .send(LinkCommand::Send(frame))
            .map_err(|_| MuxError::Transport(format!("{conn} task has exited")))
    }

    fn close(&mut self, conn: ConnectionId, reason: CloseReason) {
        if let Some(link) = self.links.remove(&conn) {
            // The task may be gone already; nothing left to close then.
            let _ = link.commands.send(LinkCommand::Close(reason));
        }
    }

    fn release(&mut self, conn: ConnectionId) {
        self.links.remove(&conn);
    }
}

impl Drop for WsConnector {
    fn drop(&mut self) {
        for (_, link) in self.links.drain() {
            link.task.abort();
        }
    }
}

/// Drive one socket from handshake to close.
async fn run_link(
    conn: ConnectionId,
    request: Request,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    let emit = |event: SocketEvent| {
        let _ = events.send(event);
    };
    let fail = |message: String| {
        tracing::debug!(conn = %conn, "socket failed: {message}");
        emit(SocketEvent::Error { conn, message });
        emit(SocketEvent::Closed { conn, reason: None });
    };

    let ws = tokio::select! {
        result = connect_async(request) => match result {
            Ok((ws, _response)) => ws,
            Err(e) => return fail(format!("WebSocket connect error: {e}")),
        },
        command = commands.recv() => {
            // Closed or superseded before the handshake finished.
            tracing::debug!(conn = %conn, ?command, "connect abandoned");
            return;
        }
    };
    emit(SocketEvent::Opened { conn });

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        return fail(format!("WebSocket write error: {e}"));
                    }
                }
                Some(LinkCommand::Close(reason)) => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: reason.as_str().into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => emit(SocketEvent::Message { conn, text }),
                Some(Ok(Message::Binary(data))) => emit(SocketEvent::Message {
                    conn,
                    text: String::from_utf8_lossy(&data).into_owned(),
                }),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.into_owned());
                    emit(SocketEvent::Closed { conn, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return fail(format!("WebSocket read error: {e}")),
                None => {
                    emit(SocketEvent::Closed { conn, reason: None });
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => {
                        ws.send(Message::Text(format!("echo:{text}"))).await.unwrap();
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });
        format!("ws://{addr}/shell")
    }

    #[tokio::test]
    async fn round_trip_over_local_socket() {
        let url = echo_server().await;
        let (mut connector, mut events) = WsConnector::new();
        let conn = ConnectionId(1);
        connector.connect(conn, &url).unwrap();

        assert_eq!(events.recv().await, Some(SocketEvent::Opened { conn }));
        connector.send(conn, "ping".into()).unwrap();
        assert_eq!(
            events.recv().await,
            Some(SocketEvent::Message {
                conn,
                text: "echo:ping".into()
            })
        );

        connector.close(conn, CloseReason::Removed);
        assert_eq!(connector.live_links(), 0);
        assert!(connector.send(conn, "late".into()).is_err());
    }

    #[tokio::test]
    async fn unreachable_host_reports_error_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut connector, mut events) = WsConnector::new();
        let conn = ConnectionId(7);
        connector.connect(conn, &format!("ws://{addr}/logs")).unwrap();

        assert!(matches!(
            events.recv().await,
            Some(SocketEvent::Error { conn: c, .. }) if c == conn
        ));
        assert_eq!(
            events.recv().await,
            Some(SocketEvent::Closed { conn, reason: None })
        );
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_up_front() {
        let (mut connector, _events) = WsConnector::new();
        assert!(connector.connect(ConnectionId(1), "not a url").is_err());
        assert_eq!(connector.live_links(), 0);
    }
}
