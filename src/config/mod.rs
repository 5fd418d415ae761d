use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::chain::{parse_address, parse_token_amount};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub faucet: Option<FaucetConfig>,
    pub launcher: Option<LauncherConfig>,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("HUMAN_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("HUMAN_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        // Secrets such as HUMAN__FAUCET__PRIVATE_KEY stay out of the TOML files.
        builder = builder.add_source(
            Environment::with_prefix("HUMAN")
                .prefix_separator("__")
                .separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.server.port > 0, "Server port must be greater than zero");
        ensure!(
            self.faucet.is_some() || self.launcher.is_some(),
            "At least one of [faucet] or [launcher] must be configured"
        );
        if let Some(faucet) = &self.faucet {
            faucet.validate().context("Invalid [faucet] section")?;
        }
        if let Some(launcher) = &self.launcher {
            launcher.validate().context("Invalid [launcher] section")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
    /// Directory holding the faucet's client bundle, served for unmatched paths.
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub title: String,
    pub rpc_url: String,
    pub hmt_address: String,
    pub factory_address: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(10_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.chain_id > 0, "Chain id must be non-zero");
        ensure!(!self.title.trim().is_empty(), "Network {} needs a title", self.chain_id);
        ensure!(
            !self.rpc_url.is_empty(),
            "Network {} needs an rpc_url",
            self.chain_id
        );
        parse_address(&self.hmt_address)
            .with_context(|| format!("Network {} has an invalid hmt_address", self.chain_id))?;
        if let Some(factory) = &self.factory_address {
            parse_address(factory).with_context(|| {
                format!("Network {} has an invalid factory_address", self.chain_id)
            })?;
        }
        if let Some(millis) = self.request_timeout_ms {
            ensure!(
                (100..=60_000).contains(&millis),
                "Network {} request_timeout_ms must be within 100..=60000",
                self.chain_id
            );
        }
        Ok(())
    }
}

fn validate_networks(networks: &[NetworkConfig]) -> Result<()> {
    ensure!(!networks.is_empty(), "At least one network must be configured");
    let mut seen = HashSet::with_capacity(networks.len());
    for network in networks {
        network.validate()?;
        ensure!(
            seen.insert(network.chain_id),
            "Chain id {} is configured twice",
            network.chain_id
        );
    }
    Ok(())
}

/// Longest accepted faucet waiting time. Zero or negative disables a wait.
const MAX_WAITING_TIME_SECONDS: i64 = 365 * 86_400;

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetConfig {
    pub private_key: String,
    /// Drip size in whole tokens.
    pub amount: String,
    #[serde(default)]
    pub daily_limit: u64,
    pub ip_waiting_time_seconds: i64,
    pub address_waiting_time_seconds: i64,
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default = "FaucetConfig::default_blocklist_capacity")]
    pub blocklist_capacity: u64,
    #[serde(default = "default_receipt_timeout_seconds")]
    pub receipt_timeout_seconds: u64,
    pub networks: Vec<NetworkConfig>,
}

impl FaucetConfig {
    const fn default_blocklist_capacity() -> u64 {
        100_000
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.private_key.is_empty(), "private_key must be set");
        let amount = parse_token_amount(&self.amount).context("amount is not a token amount")?;
        ensure!(!amount.is_zero(), "amount must be positive");
        ensure!(
            self.blocklist_capacity >= 100,
            "blocklist_capacity must be at least 100"
        );
        ensure!(
            (1..=3_600).contains(&self.receipt_timeout_seconds),
            "receipt_timeout_seconds must be within 1..=3600"
        );
        ensure!(
            self.ip_waiting_time_seconds <= MAX_WAITING_TIME_SECONDS,
            "ip_waiting_time_seconds must be at most {MAX_WAITING_TIME_SECONDS} (365 days)"
        );
        ensure!(
            self.address_waiting_time_seconds <= MAX_WAITING_TIME_SECONDS,
            "address_waiting_time_seconds must be at most {MAX_WAITING_TIME_SECONDS} (365 days)"
        );
        validate_networks(&self.networks)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    pub private_key: String,
    #[serde(default = "default_receipt_timeout_seconds")]
    pub receipt_timeout_seconds: u64,
    pub networks: Vec<NetworkConfig>,
    pub oracles: OracleConfig,
    pub storage: StorageConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub extra_curse_words: Vec<String>,
}

impl LauncherConfig {
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.private_key.is_empty(), "private_key must be set");
        ensure!(
            (1..=3_600).contains(&self.receipt_timeout_seconds),
            "receipt_timeout_seconds must be within 1..=3600"
        );
        validate_networks(&self.networks)?;
        for network in &self.networks {
            ensure!(
                network.factory_address.is_some(),
                "Launcher network {} needs a factory_address",
                network.chain_id
            );
        }
        self.oracles.validate()?;
        self.storage.validate()?;
        ensure!(
            !self.stripe.secret_key.is_empty(),
            "stripe.secret_key must be set"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub recording_address: String,
    pub reputation_address: String,
    pub exchange_address: String,
    pub recording_url: String,
    pub reputation_url: String,
    pub exchange_url: String,
    pub recording_fee_percentage: u8,
    pub reputation_fee_percentage: u8,
}

impl OracleConfig {
    fn validate(&self) -> Result<()> {
        for (label, address) in [
            ("recording_address", &self.recording_address),
            ("reputation_address", &self.reputation_address),
            ("exchange_address", &self.exchange_address),
        ] {
            parse_address(address).with_context(|| format!("oracles.{label} is invalid"))?;
        }
        ensure!(
            !self.exchange_url.is_empty(),
            "oracles.exchange_url must be set"
        );
        ensure!(
            u16::from(self.recording_fee_percentage) + u16::from(self.reputation_fee_percentage)
                <= 100,
            "Oracle fee percentages cannot exceed 100 in total"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    #[serde(default = "StorageConfig::default_region")]
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base URL manifests are published under. Defaults to `<endpoint>/<bucket>/`.
    pub public_url: Option<String>,
}

impl StorageConfig {
    fn default_region() -> String {
        "us-east-1".to_string()
    }

    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) if url.ends_with('/') => url.clone(),
            Some(url) => format!("{url}/"),
            None => format!("{}/{}/", self.endpoint.trim_end_matches('/'), self.bucket),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.endpoint.is_empty(), "storage.endpoint must be set");
        ensure!(!self.bucket.is_empty(), "storage.bucket must be set");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    #[serde(default = "StripeConfig::default_api_base")]
    pub api_base: String,
}

impl StripeConfig {
    fn default_api_base() -> String {
        "https://api.stripe.com".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub api_base: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.coingecko.com/api/v3".to_string(),
        }
    }
}

const fn default_receipt_timeout_seconds() -> u64 {
    120
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
