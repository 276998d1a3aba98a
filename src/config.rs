use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::controller::{ControllerOptions, DEFAULT_FALLBACK_MESSAGE};
use crate::session::DEFAULT_MAX_ENTRIES;

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the completion service
    #[arg(long, env = "KOC_API_BASE")]
    pub api_base: Option<String>,

    /// Model name sent with each completion request
    #[arg(long, env = "KOC_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the chat widget (default)
    Serve,
    /// Send one message and print the reply
    Ask {
        /// Message to send
        message: String,
        /// Wait for the complete reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Check the health, models and stats endpoints
    Diagnose,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    /// Initial state of the streaming toggle.
    pub streaming: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    pub title: String,
    pub toast_ttl_ms: u64,
    /// Seconds between sidebar refreshes; 0 loads once.
    pub stats_refresh_secs: u64,
    /// Seconds between health probes; 0 disables probing.
    pub health_probe_secs: u64,
    pub fallback_message: String,
    /// Transcript entries kept in memory; older ones are dropped.
    pub max_entries: usize,
    #[serde(default = "default_quick_questions")]
    pub quick_questions: Vec<String>,
}

fn default_quick_questions() -> Vec<String> {
    [
        "How do I register an account?",
        "How can I pay by card?",
        "How do I withdraw my commission?",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

impl UiConfig {
    pub fn stats_refresh_interval(&self) -> Option<Duration> {
        (self.stats_refresh_secs > 0).then(|| Duration::from_secs(self.stats_refresh_secs))
    }

    pub fn health_probe_interval(&self) -> Option<Duration> {
        (self.health_probe_secs > 0).then(|| Duration::from_secs(self.health_probe_secs))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Build the configuration.
    ///
    /// Priority: CLI flag > CLI env var > `KOC_` env var > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("completion.base_url", "http://localhost:8000")?
            .set_default("completion.model", "koc-assistant")?
            .set_default("completion.streaming", true)?
            .set_default("ui.title", "KOC Support Chat")?
            .set_default("ui.toast_ttl_ms", 3000)?
            .set_default("ui.stats_refresh_secs", 60)?
            .set_default("ui.health_probe_secs", 30)?
            .set_default("ui.fallback_message", DEFAULT_FALLBACK_MESSAGE)?
            .set_default("ui.max_entries", DEFAULT_MAX_ENTRIES as u64)?;

        // 2. Config file: explicit path, else ./config.yaml if present
        match &cli.config {
            Some(path) => {
                builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
            }
            None if Path::new(CWD_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::from(Path::new(CWD_CONFIG_FILE)).required(false));
            }
            None => {}
        }

        // 3. Environment variables, e.g. KOC_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("KOC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap has already folded in their own env vars)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(base) = &cli.api_base {
            builder = builder.set_override("completion.base_url", base.as_str())?;
        }
        if let Some(model) = &cli.model {
            builder = builder.set_override("completion.model", model.as_str())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            streaming: self.completion.streaming,
            toast_ttl: Duration::from_millis(self.ui.toast_ttl_ms),
            fallback_message: self.ui.fallback_message.clone(),
            max_entries: self.ui.max_entries,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
