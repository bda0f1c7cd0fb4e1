//! tabmux: tabbed remote shells and log tails in the local terminal.
//!
//! Opens one tab per `shell:` or `logs:` target against a container-apps
//! endpoint and multiplexes them in a single terminal, with idle tabs
//! disconnected after a grace period and reconnected on demand.

mod backlog;
mod commands;
mod config;
mod keys;
mod screen;
mod terminal;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::{parse_tab, Config, EndpointOverrides};

/// tabmux: tabbed remote shells and log tails
#[derive(Parser)]
#[command(name = "tabmux", version, about = "Tabbed remote shells and log tails over WebSocket")]
struct Cli {
    /// Config file path (default: ~/.tabmux/config.toml)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (written to stderr; redirect it while attached)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Endpoint base URL, ws:// or wss://
    #[arg(long = "base-url", global = true)]
    base_url: Option<String>,

    /// Namespace of the container app
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Container app resource name
    #[arg(long, global = true)]
    resource: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open tabs and attach the terminal to them
    Attach {
        /// Tabs as shell:<instance>/<component> or logs:<instance>/<component>
        #[arg(required = true)]
        tabs: Vec<String>,
    },

    /// Print the socket URL a tab would connect to
    Url {
        /// Tab as shell:<instance>/<component> or logs:<instance>/<component>
        tab: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing on stderr so stdout stays with the panel.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("tabmux=debug,tabmux_client=debug,tabmux_core=debug")
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("tabmux=warn,tabmux_client=warn")
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("tabmux: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let cfg = Config::load(&config_path)?;

    // CLI flags override the config file.
    let overrides = EndpointOverrides {
        base_url: cli.base_url,
        namespace: cli.namespace,
        resource: cli.resource,
    };
    let endpoint = cfg.endpoint(&overrides)?;

    match cli.command {
        Command::Attach { tabs } => {
            let tabs = tabs
                .iter()
                .map(|t| parse_tab(t))
                .collect::<anyhow::Result<Vec<_>>>()?;
            commands::attach::run(endpoint, cfg.session, tabs).await
        }
        Command::Url { tab } => {
            let tab = parse_tab(&tab)?;
            let url = commands::url::run(&endpoint, &tab).context("cannot build socket URL")?;
            println!("{url}");
            Ok(())
        }
    }
}
