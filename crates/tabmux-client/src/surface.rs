//! Rendering-surface seam and connection-state banners.
//!
//! A surface is whatever displays one session: a terminal widget in a
//! browser, a region of the local terminal, a test recorder. The multiplexer
//! writes output and banners through it and asks it how many cells fit.

use tabmux_core::{Dimensions, MuxResult, SessionKind};

use crate::session::SessionKey;

/// Display target for one session.
pub trait Surface {
    /// Write raw output bytes.
    fn write(&mut self, data: &[u8]);

    /// Write a line of text followed by a line break.
    fn write_line(&mut self, line: &str) {
        self.write(line.as_bytes());
        self.write(b"\r\n");
    }

    /// Erase everything shown so far.
    fn clear(&mut self);

    fn scroll_to_bottom(&mut self) {}

    /// Cell grid that currently fits the viewport, if it can be measured.
    fn fit(&mut self) -> Option<Dimensions>;

    /// Release the surface. Nothing is written to it afterwards.
    fn dispose(&mut self);
}

/// Creates a surface when a session is first shown.
pub trait SurfaceFactory {
    fn create(&mut self, key: &SessionKey, kind: SessionKind) -> MuxResult<Box<dyn Surface>>;
}

/// Connection-state messages written into a session's surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Connecting,
    Reconnecting,
    Connected,
    Closed(Option<String>),
    ClosedForInactivity,
    ConnectionError,
    ConnectFailed(String),
    Notice(String),
    LogError(String),
    RequestingLogs,
}

const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

impl Banner {
    /// ANSI-coloured text of the banner, without the trailing line break.
    pub fn render(&self) -> String {
        match self {
            Self::Connecting => format!("{YELLOW}Connecting...{RESET}"),
            Self::Reconnecting => format!("{YELLOW}Reconnecting...{RESET}"),
            Self::Connected => format!("{GREEN}Connected{RESET}"),
            Self::Closed(None) => format!("{YELLOW}Connection closed{RESET}"),
            Self::Closed(Some(reason)) => format!("{YELLOW}Connection closed: {reason}{RESET}"),
            Self::ClosedForInactivity => {
                format!("{YELLOW}Session closed due to inactivity{RESET}")
            }
            Self::ConnectionError => format!("\r\n{RED}Connection error{RESET}"),
            Self::ConnectFailed(msg) => {
                format!("\r\n{RED}Failed to create connection: {msg}{RESET}")
            }
            Self::Notice(msg) => format!("\r\n{RED}{msg}{RESET}"),
            Self::LogError(msg) => format!("{RED}Error: {msg}{RESET}"),
            Self::RequestingLogs => {
                format!("{YELLOW}Requesting logs with new tail value...{RESET}")
            }
        }
    }
}
