//! tabmux-client: session multiplexer for tabbed remote shells and log tails.
//!
//! A [`Multiplexer`] keeps any number of sessions open at once, each bound
//! to one container instance and rendered through a host-supplied
//! [`Surface`]. Connects are debounced, background sessions are reclaimed
//! after an idle grace period, and terminal sizes are negotiated with the
//! remote shell. The multiplexer itself is sans-IO: sockets go through a
//! [`Connector`], time through [`Multiplexer::advance_to`]. [`Runtime`]
//! wires it to real WebSockets on tokio.
//!
//! # Quick Start
//!
//! ```no_run
//! use tabmux_client::{Endpoint, MuxConfig, Runtime, SurfaceFactory};
//!
//! # async fn example(surfaces: Box<dyn SurfaceFactory>) {
//! let endpoint = Endpoint::new("wss://console.example.com", "prod", "web");
//! let mut runtime = Runtime::new(MuxConfig::default(), endpoint, surfaces);
//!
//! runtime.mux().open_shell("web-0", "web-0", "app");
//! while runtime.pump().await {}
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod logview;
pub mod mux;
pub mod negotiator;
pub mod panel;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod timer;
pub mod transport;

mod controller;
mod reclaimer;
mod registry;
mod tabs;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary public types.
pub use config::{Endpoint, MuxConfig};
pub use connection::{CloseReason, ConnectionId, ConnectionState, Connector, SocketEvent};
pub use logview::{LogExport, LogView, TAIL_LINE_CHOICES};
pub use mux::{Multiplexer, MuxEvent};
pub use panel::PanelEvent;
pub use runtime::Runtime;
pub use session::{SessionInfo, SessionKey, Target};
pub use surface::{Banner, Surface, SurfaceFactory};
pub use transport::WsConnector;

// Re-export tabmux-core types for convenience.
pub use tabmux_core::{Dimensions, MuxError, MuxResult, SessionKind};
