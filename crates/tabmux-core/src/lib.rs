//! tabmux-core: wire protocol shared by the tabmux multiplexer.
//!
//! Provides the frame codec for interactive shell sockets and log-tail
//! sockets, the terminal dimension type carried by resize commands, and the
//! crate-wide error type.

pub mod codec;
pub mod dims;
pub mod error;

// Re-export commonly used items at crate root.
pub use codec::{LogControl, LogFrame, ShellFrame, SessionKind};
pub use dims::Dimensions;
pub use error::{MuxError, MuxResult};
