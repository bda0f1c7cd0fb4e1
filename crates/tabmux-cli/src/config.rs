//! Client configuration at `~/.tabmux/config.toml`.
//!
//! Names the endpoint sessions connect to and tunes the multiplexer.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabmux_client::{Endpoint, MuxConfig, SessionKind};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the container sockets live.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Multiplexer timing and history settings.
    #[serde(default)]
    pub session: MuxConfig,
}

/// Endpoint settings. Empty strings mean "not configured".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub resource: String,
}

/// Endpoint values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct EndpointOverrides {
    pub base_url: Option<String>,
    pub namespace: Option<String>,
    pub resource: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        config
            .session
            .validate()
            .with_context(|| format!("invalid [session] in {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Default location, `~/.tabmux/config.toml`.
    pub fn default_path() -> std::path::PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".tabmux")
            .join("config.toml")
    }

    /// The endpoint with command-line values taking precedence.
    pub fn endpoint(&self, overrides: &EndpointOverrides) -> Result<Endpoint> {
        let pick = |flag: &Option<String>, file: &str, what: &str| -> Result<String> {
            let value = flag.clone().unwrap_or_else(|| file.to_string());
            if value.is_empty() {
                anyhow::bail!("no {what} configured (set --{what} or [endpoint] in the config file)");
            }
            Ok(value)
        };
        Ok(Endpoint::new(
            pick(&overrides.base_url, &self.endpoint.base_url, "base-url")?,
            pick(&overrides.namespace, &self.endpoint.namespace, "namespace")?,
            pick(&overrides.resource, &self.endpoint.resource, "resource")?,
        ))
    }
}

/// A tab requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSpec {
    pub kind: SessionKind,
    pub instance: String,
    pub component: String,
}

impl TabSpec {
    /// Tab title: `<instance>/<component>`, suffixed for log tabs.
    pub fn name(&self) -> String {
        match self.kind {
            SessionKind::Shell => format!("{}/{}", self.instance, self.component),
            SessionKind::Logs => format!("{}/{} (logs)", self.instance, self.component),
        }
    }
}

/// Parse `shell:<instance>/<component>` or `logs:<instance>/<component>`.
pub fn parse_tab(spec: &str) -> Result<TabSpec> {
    let (kind, rest) = spec
        .split_once(':')
        .with_context(|| format!("expected <shell|logs>:<instance>/<component>, got '{spec}'"))?;
    let kind = SessionKind::parse(kind)?;
    let (instance, component) = rest
        .split_once('/')
        .with_context(|| format!("missing /<component> in '{spec}'"))?;
    if instance.is_empty() {
        anyhow::bail!("empty instance in '{spec}'");
    }
    if component.is_empty() || component.contains('/') {
        anyhow::bail!("invalid component in '{spec}'");
    }
    Ok(TabSpec {
        kind,
        instance: instance.to_string(),
        component: component.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_shell_tab() {
        let tab = parse_tab("shell:web-0/app").unwrap();
        assert_eq!(tab.kind, SessionKind::Shell);
        assert_eq!(tab.instance, "web-0");
        assert_eq!(tab.component, "app");
        assert_eq!(tab.name(), "web-0/app");
    }

    #[test]
    fn parse_logs_tab() {
        let tab = parse_tab("logs:web-0/sidecar").unwrap();
        assert_eq!(tab.kind, SessionKind::Logs);
        assert_eq!(tab.name(), "web-0/sidecar (logs)");
    }

    #[test]
    fn parse_bad_tabs_fails() {
        assert!(parse_tab("web-0/app").is_err());
        assert!(parse_tab("exec:web-0/app").is_err());
        assert!(parse_tab("shell:web-0").is_err());
        assert!(parse_tab("shell:/app").is_err());
        assert!(parse_tab("shell:web-0/").is_err());
        assert!(parse_tab("shell:web-0/a/b").is_err());
    }

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert!(cfg.endpoint.base_url.is_empty());
        assert_eq!(cfg.session, MuxConfig::default());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[endpoint]
base_url = "wss://console.example.com"
namespace = "prod"
resource = "web"

[session]
idle_grace_secs = 120
tail_lines = 500
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.endpoint.namespace, "prod");
        assert_eq!(cfg.session.idle_grace_secs, 120);
        assert_eq!(cfg.session.tail_lines, 500);
        assert_eq!(cfg.session.connect_debounce_ms, 500); // default
    }

    #[test]
    fn flags_override_file() {
        let mut cfg = Config::default();
        cfg.endpoint.base_url = "wss://file.example.com".into();
        cfg.endpoint.namespace = "staging".into();
        cfg.endpoint.resource = "api".into();

        let overrides = EndpointOverrides {
            namespace: Some("prod".into()),
            ..Default::default()
        };
        let endpoint = cfg.endpoint(&overrides).unwrap();
        assert_eq!(endpoint.base_url, "wss://file.example.com");
        assert_eq!(endpoint.namespace, "prod");
        assert_eq!(endpoint.resource, "api");
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let err = Config::default()
            .endpoint(&EndpointOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("base-url"));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.session, MuxConfig::default());
    }

    #[test]
    fn load_rejects_zero_tail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ntail_lines = 0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
