//! Frame codec for shell and log-tail sockets.
//!
//! Shell sockets carry text frames with a short tag prefix:
//!
//! - `stdout:<base64>`: standard output bytes
//! - `stderr:<base64>`: standard error bytes
//! - `msg:<text>`: server-to-client notice
//!
//! Keystrokes travel client-to-server as bare base64, and a resize is the
//! control string `resize:<cols>:<rows>`.
//!
//! Log sockets carry JSON records: inbound `{"log": <line>}` or
//! `{"status": "error", "message": <text>}`, outbound `{"tail_lines": <n>}`.
//!
//! Decoding never fails. Anything that does not match a known shape is
//! handed back as raw text for verbatim display.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::dims::Dimensions;
use crate::error::{MuxError, MuxResult};

const STDOUT_TAG: &str = "stdout:";
const STDERR_TAG: &str = "stderr:";
const NOTICE_TAG: &str = "msg:";
const RESIZE_TAG: &str = "resize";

/// Which wire protocol a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Interactive shell: keystrokes in, classified output out.
    Shell,
    /// Live log tail: history-depth control in, log records out.
    Logs,
}

impl SessionKind {
    /// Path segment of the socket endpoint for this kind.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Logs => "logs",
        }
    }

    /// Prefix used when deriving session keys, so a shell and a log tail on
    /// the same container never collide.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Shell => "tab",
            Self::Logs => "log-tab",
        }
    }

    pub fn parse(s: &str) -> MuxResult<Self> {
        match s {
            "shell" | "sh" => Ok(Self::Shell),
            "logs" | "log" => Ok(Self::Logs),
            other => Err(MuxError::Other(format!(
                "unknown session kind: {other} (expected shell or logs)"
            ))),
        }
    }
}

/// One inbound frame on a shell socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellFrame {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Notice(String),
    /// Unrecognised frame, displayed verbatim.
    Raw(String),
}

impl ShellFrame {
    /// Classify an inbound text frame.
    ///
    /// A tagged frame whose payload is not valid base64 degrades to `Raw`
    /// carrying the whole original text.
    pub fn decode(text: &str) -> Self {
        if let Some(payload) = text.strip_prefix(STDOUT_TAG) {
            return match STANDARD.decode(payload) {
                Ok(bytes) => Self::Stdout(bytes),
                Err(_) => Self::Raw(text.to_string()),
            };
        }
        if let Some(payload) = text.strip_prefix(STDERR_TAG) {
            return match STANDARD.decode(payload) {
                Ok(bytes) => Self::Stderr(bytes),
                Err(_) => Self::Raw(text.to_string()),
            };
        }
        if let Some(message) = text.strip_prefix(NOTICE_TAG) {
            return Self::Notice(message.to_string());
        }
        Self::Raw(text.to_string())
    }

    /// Encode a frame the way the shell backend emits it.
    pub fn encode(&self) -> String {
        match self {
            Self::Stdout(bytes) => format!("{STDOUT_TAG}{}", STANDARD.encode(bytes)),
            Self::Stderr(bytes) => format!("{STDERR_TAG}{}", STANDARD.encode(bytes)),
            Self::Notice(message) => format!("{NOTICE_TAG}{message}"),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// Encode keystroke bytes for the shell socket. Lossless for any input.
pub fn encode_keystrokes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a keystroke frame (server side of the shell protocol).
pub fn decode_keystrokes(frame: &str) -> MuxResult<Vec<u8>> {
    STANDARD
        .decode(frame)
        .map_err(|e| MuxError::Codec(format!("invalid keystroke frame: {e}")))
}

/// Encode a resize command: `resize:<cols>:<rows>`.
pub fn encode_resize(dims: Dimensions) -> String {
    format!("{RESIZE_TAG}:{}:{}", dims.cols, dims.rows)
}

/// Parse a resize command, if `frame` is one.
pub fn decode_resize(frame: &str) -> Option<Dimensions> {
    let mut parts = frame.split(':');
    if parts.next()? != RESIZE_TAG {
        return None;
    }
    let cols = parts.next()?.parse().ok()?;
    let rows = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Dimensions::new(cols, rows))
}

/// One inbound frame on a log socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFrame {
    /// A single log line, as produced by the container runtime.
    Line(String),
    /// The backend reported an error.
    Error(String),
    /// A JSON object of no known shape. Not displayed.
    Unknown,
    /// Non-JSON (or non-object) text, displayed verbatim.
    Raw(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl LogFrame {
    pub fn decode(text: &str) -> Self {
        let record: LogRecord = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(_) => return Self::Raw(text.to_string()),
        };

        if let Some(log) = record.log {
            let line = match log {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return Self::Line(line);
        }
        if record.status.as_deref() == Some("error") {
            return Self::Error(record.message.unwrap_or_default());
        }
        Self::Unknown
    }

    /// Encode a frame the way the log backend emits it.
    pub fn encode(&self) -> MuxResult<String> {
        let record = match self {
            Self::Line(line) => LogRecord {
                log: Some(serde_json::Value::String(line.clone())),
                status: None,
                message: None,
            },
            Self::Error(message) => LogRecord {
                log: None,
                status: Some("error".into()),
                message: Some(message.clone()),
            },
            Self::Unknown => LogRecord {
                log: None,
                status: None,
                message: None,
            },
            Self::Raw(text) => return Ok(text.clone()),
        };
        Ok(serde_json::to_string(&record)?)
    }
}

/// Outbound control record on a log socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogControl {
    pub tail_lines: u32,
}

impl LogControl {
    pub fn new(tail_lines: u32) -> Self {
        Self { tail_lines }
    }

    pub fn encode(&self) -> MuxResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> MuxResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stdout() {
        assert_eq!(
            ShellFrame::decode("stdout:aGVsbG8="),
            ShellFrame::Stdout(b"hello".to_vec())
        );
    }

    #[test]
    fn decode_stderr_and_notice() {
        assert_eq!(
            ShellFrame::decode("stderr:b29wcw=="),
            ShellFrame::Stderr(b"oops".to_vec())
        );
        assert_eq!(
            ShellFrame::decode("msg:container exited"),
            ShellFrame::Notice("container exited".into())
        );
    }

    #[test]
    fn unrecognised_prefix_passes_through() {
        assert_eq!(
            ShellFrame::decode("plain text"),
            ShellFrame::Raw("plain text".into())
        );
        assert_eq!(ShellFrame::decode(""), ShellFrame::Raw(String::new()));
    }

    #[test]
    fn bad_base64_passes_through_whole_frame() {
        assert_eq!(
            ShellFrame::decode("stdout:not base64!"),
            ShellFrame::Raw("stdout:not base64!".into())
        );
    }

    #[test]
    fn keystrokes_are_lossless() {
        let data: Vec<u8> = (0..=255u8).collect();
        let frame = encode_keystrokes(&data);
        assert!(frame.is_ascii());
        assert_eq!(decode_keystrokes(&frame).unwrap(), data);

        let utf8 = "héllo ✓\x1b[A\r".as_bytes();
        assert_eq!(decode_keystrokes(&encode_keystrokes(utf8)).unwrap(), utf8);
    }

    #[test]
    fn resize_command_format() {
        assert_eq!(encode_resize(Dimensions::new(100, 30)), "resize:100:30");
        assert_eq!(decode_resize("resize:100:30"), Some(Dimensions::new(100, 30)));
        assert_eq!(decode_resize("resize:100"), None);
        assert_eq!(decode_resize("resize:a:b"), None);
        assert_eq!(decode_resize("aGVsbG8="), None);
    }

    #[test]
    fn decode_log_line() {
        assert_eq!(
            LogFrame::decode(r#"{"log":"2024-01-01T00:00:00Z started"}"#),
            LogFrame::Line("2024-01-01T00:00:00Z started".into())
        );
    }

    #[test]
    fn decode_log_error() {
        assert_eq!(
            LogFrame::decode(r#"{"status":"error","message":"pod not found"}"#),
            LogFrame::Error("pod not found".into())
        );
    }

    #[test]
    fn log_fallbacks() {
        assert_eq!(LogFrame::decode("not json"), LogFrame::Raw("not json".into()));
        assert_eq!(LogFrame::decode("42"), LogFrame::Raw("42".into()));
        assert_eq!(LogFrame::decode(r#"{"status":"ok"}"#), LogFrame::Unknown);
    }

    #[test]
    fn log_control_wire_shape() {
        assert_eq!(LogControl::new(200).encode().unwrap(), r#"{"tail_lines":200}"#);
        assert_eq!(
            LogControl::decode(r#"{"tail_lines": 50}"#).unwrap(),
            LogControl::new(50)
        );
    }

    #[test]
    fn session_kind_parse() {
        assert_eq!(SessionKind::parse("shell").unwrap(), SessionKind::Shell);
        assert_eq!(SessionKind::parse("logs").unwrap(), SessionKind::Logs);
        assert!(SessionKind::parse("vm").is_err());
    }
}
