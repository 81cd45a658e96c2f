use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default = "default_http_url")]
    pub http_url: String,
    #[serde(default = "default_expected_chain_id")]
    pub expected_chain_id: u64,
    /// Deadline applied to every chain call, including the aggregate batch.
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

fn default_http_url() -> String {
    "https://api.avax.network/ext/bc/C/rpc".to_string()
}
fn default_expected_chain_id() -> u64 {
    43114
}
fn default_call_timeout_seconds() -> u64 {
    10
}

impl Default for Rpc {
    fn default() -> Self {
        Self {
            http_url: default_http_url(),
            expected_chain_id: default_expected_chain_id(),
            call_timeout_seconds: default_call_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    #[serde(default = "default_multicall")]
    pub multicall: String,
}

fn default_multicall() -> String {
    // Multicall3, same address on every EVM chain
    "0xcA11bde05977b3631167028862bE2a173976CA11".to_string()
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            multicall: default_multicall(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Feeds {
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,
    /// 0 disables the background scheduler.
    #[serde(default)]
    pub refresh_interval_seconds: u64,
}

fn default_metadata_path() -> String {
    "data/avalanche_feeds.csv".to_string()
}

impl Default for Feeds {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            refresh_interval_seconds: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Prometheus scrape endpoint, only used with the `observability` feature.
    #[serde(default)]
    pub metrics_address: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            metrics_address: None,
        }
    }
}

impl Server {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid bind_address {}: {}", self.bind_address, e)))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub rpc: Rpc,
    #[serde(default)]
    pub contracts: Contracts,
    #[serde(default)]
    pub feeds: Feeds,
    #[serde(default)]
    pub server: Server,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    /// Reads `path` (optional) and applies the environment overrides.
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Some(url) = non_empty_var("FEEDS_RPC_HTTP_URL") {
            self.rpc.http_url = url;
        }
        if let Some(path) = non_empty_var("FEEDS_METADATA_PATH") {
            self.feeds.metadata_path = path;
        }
        // PORT replaces only the port of the bind address
        if let Some(port) = non_empty_var("PORT").and_then(|p| p.parse::<u16>().ok()) {
            let host = self
                .server
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind_address = format!("{}:{}", host, port);
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
