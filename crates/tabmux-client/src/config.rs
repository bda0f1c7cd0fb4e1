//! Multiplexer tuning knobs and socket endpoint addressing.
//!
//! `MuxConfig` deserialises from a `[session]` TOML table; every field has a
//! default so partial tables are accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabmux_core::{MuxError, MuxResult};

use crate::session::Target;

/// Timing and history settings shared by every session of a multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Quiet period before a requested connection is actually opened.
    #[serde(default = "default_connect_debounce_ms")]
    pub connect_debounce_ms: u64,

    /// How long an Open session may sit in the background before its
    /// connection is reclaimed.
    #[serde(default = "default_idle_grace_secs")]
    pub idle_grace_secs: u64,

    /// Quiet period after the last window resize before every session refits.
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,

    /// Delay between the first stdout frame of a connection and the
    /// follow-up resize.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// History depth requested by new log sessions.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            connect_debounce_ms: default_connect_debounce_ms(),
            idle_grace_secs: default_idle_grace_secs(),
            resize_debounce_ms: default_resize_debounce_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            tail_lines: default_tail_lines(),
        }
    }
}

fn default_connect_debounce_ms() -> u64 {
    500
}
fn default_idle_grace_secs() -> u64 {
    60
}
fn default_resize_debounce_ms() -> u64 {
    100
}
fn default_settle_delay_ms() -> u64 {
    100
}
fn default_tail_lines() -> u32 {
    100
}

impl MuxConfig {
    pub fn connect_debounce(&self) -> Duration {
        Duration::from_millis(self.connect_debounce_ms)
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Parse a bare `[session]`-style TOML table.
    pub fn from_toml(content: &str) -> MuxResult<Self> {
        let config: MuxConfig =
            toml::from_str(content).map_err(|e| MuxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MuxResult<()> {
        if self.tail_lines == 0 {
            return Err(MuxError::Config("tail_lines must be at least 1".into()));
        }
        Ok(())
    }
}

/// Where session sockets live.
///
/// Shell and log sockets share one addressing scheme and differ only in the
/// path segment after the resource:
/// `{base_url}/api/container-apps/{namespace}/{resource}/{shell|logs}/{instance}/{component}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    pub namespace: String,
    pub resource: String,
}

impl Endpoint {
    pub fn new(
        base_url: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            namespace: namespace.into(),
            resource: resource.into(),
        }
    }

    /// Socket URL for a session target.
    pub fn url(&self, target: &Target) -> MuxResult<String> {
        let lower = self.base_url.to_lowercase();
        if !(lower.starts_with("ws://") || lower.starts_with("wss://")) {
            return Err(MuxError::Endpoint(format!(
                "unsupported URL scheme: {} (expected ws:// or wss://)",
                self.base_url
            )));
        }

        let segments = [
            ("namespace", self.namespace.as_str()),
            ("resource", self.resource.as_str()),
            ("instance", target.instance.as_str()),
            ("component", target.component.as_str()),
        ];
        for (what, value) in segments {
            if value.is_empty() || value.contains('/') {
                return Err(MuxError::Endpoint(format!("invalid {what}: '{value}'")));
            }
        }

        Ok(format!(
            "{}/api/container-apps/{}/{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.namespace,
            self.resource,
            target.kind.path_segment(),
            target.instance,
            target.component,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabmux_core::SessionKind;

    #[test]
    fn default_values() {
        let cfg = MuxConfig::default();
        assert_eq!(cfg.connect_debounce(), Duration::from_millis(500));
        assert_eq!(cfg.idle_grace(), Duration::from_secs(60));
        assert_eq!(cfg.resize_debounce(), Duration::from_millis(100));
        assert_eq!(cfg.tail_lines, 100);
    }

    #[test]
    fn parse_partial_table() {
        let cfg = MuxConfig::from_toml("idle_grace_secs = 300\n").unwrap();
        assert_eq!(cfg.idle_grace(), Duration::from_secs(300));
        assert_eq!(cfg.connect_debounce_ms, 500);
    }

    #[test]
    fn zero_tail_rejected() {
        assert!(MuxConfig::from_toml("tail_lines = 0\n").is_err());
    }

    #[test]
    fn shell_and_logs_urls() {
        let ep = Endpoint::new("wss://console.example.com/", "ns1", "app42");
        let shell = Target::new(SessionKind::Shell, "i1", "main");
        let logs = Target::new(SessionKind::Logs, "i1", "main");
        assert_eq!(
            ep.url(&shell).unwrap(),
            "wss://console.example.com/api/container-apps/ns1/app42/shell/i1/main"
        );
        assert_eq!(
            ep.url(&logs).unwrap(),
            "wss://console.example.com/api/container-apps/ns1/app42/logs/i1/main"
        );
    }

    #[test]
    fn bad_endpoints_rejected() {
        let target = Target::new(SessionKind::Shell, "i1", "main");
        assert!(Endpoint::new("https://x", "ns", "r").url(&target).is_err());
        assert!(Endpoint::new("ws://x", "", "r").url(&target).is_err());
        let nested = Target::new(SessionKind::Shell, "i1/evil", "main");
        assert!(Endpoint::new("ws://x", "ns", "r").url(&nested).is_err());
    }
}
