//! Testnet HMT faucet.
//!
//! One drip per request, rate limited per client IP and per recipient address.
//! Every outcome is reported to the caller as a message; nothing here maps to HTTP
//! error statuses.

mod blocklist;
mod history;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::chain::{
    ChainError, ChainGateway, EvmGateway, format_token_amount, parse_address, parse_token_amount,
};
use crate::config::FaucetConfig;
use crate::models::faucet::{FaucetStats, SendRecord};
use crate::slack::SlackNotifier;

use self::blocklist::WaitList;
use self::history::SendHistory;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaucetRejection {
    #[error("Invalid Chain Id")]
    InvalidChain,
    #[error(
        "Your account address is invalid. Please check your account address (it should start with 0x)."
    )]
    InvalidAddress,
    #[error("Testnet ETH request fail. Please try again!")]
    RequestFailed,
    #[error(
        "Your ip address has already requested testnet ETH today. The remaining time for next request is {}",
        format_wait(.0)
    )]
    IpBlocked(Duration),
    #[error(
        "Your wallet address has already requested testnet ETH today. The remaining time for next request is {}.",
        format_wait(.0)
    )]
    AddressBlocked(Duration),
    #[error("Faucet out of balance.")]
    OutOfBalance,
    #[error("Faucet balance unavailable. Please try again!")]
    BalanceUnavailable,
}

pub struct FaucetNetwork {
    pub chain_id: u64,
    pub title: String,
    pub hmt_address: Address,
    pub gateway: Arc<dyn ChainGateway>,
}

pub struct FaucetSettings {
    /// Drip size in base units.
    pub amount: U256,
    pub daily_limit: u64,
    pub ip_waiting_time_seconds: i64,
    pub address_waiting_time_seconds: i64,
    pub blocklist_capacity: u64,
    pub trust_forwarded_for: bool,
}

pub struct FaucetService {
    networks: HashMap<u64, FaucetNetwork>,
    amount: U256,
    daily_limit: u64,
    ip_waits: Option<WaitList>,
    address_waits: Option<WaitList>,
    history: SendHistory,
    slack: Option<SlackNotifier>,
    trust_forwarded_for: bool,
}

impl FaucetService {
    pub fn new(
        settings: FaucetSettings,
        networks: Vec<FaucetNetwork>,
        slack: Option<SlackNotifier>,
    ) -> Self {
        assert!(!settings.amount.is_zero(), "Drip amount must be positive");
        let networks = networks
            .into_iter()
            .map(|network| (network.chain_id, network))
            .collect();
        Self {
            networks,
            amount: settings.amount,
            daily_limit: settings.daily_limit,
            ip_waits: WaitList::from_seconds(
                settings.ip_waiting_time_seconds,
                settings.blocklist_capacity,
            ),
            address_waits: WaitList::from_seconds(
                settings.address_waiting_time_seconds,
                settings.blocklist_capacity,
            ),
            history: SendHistory::new(),
            slack,
            trust_forwarded_for: settings.trust_forwarded_for,
        }
    }

    /// Builds one RPC-backed gateway per configured network, all sharing the faucet wallet.
    pub async fn connect(config: &FaucetConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .trim()
            .parse()
            .context("Faucet private_key is not a valid secp256k1 key")?;
        info!(account = %signer.address(), "Faucet wallet loaded");

        let mut networks = Vec::with_capacity(config.networks.len());
        for network in &config.networks {
            let gateway = EvmGateway::connect(network, signer.clone(), config.receipt_timeout())?;
            gateway.verify_chain_id().await;
            networks.push(FaucetNetwork {
                chain_id: network.chain_id,
                title: network.title.clone(),
                hmt_address: parse_address(&network.hmt_address)?,
                gateway: Arc::new(gateway),
            });
        }

        let slack = match config.slack_webhook_url.as_deref() {
            Some(url) if !url.is_empty() => Some(SlackNotifier::new(url.to_string())?),
            _ => None,
        };

        let settings = FaucetSettings {
            amount: parse_token_amount(&config.amount)?,
            daily_limit: config.daily_limit,
            ip_waiting_time_seconds: config.ip_waiting_time_seconds,
            address_waiting_time_seconds: config.address_waiting_time_seconds,
            blocklist_capacity: config.blocklist_capacity,
            trust_forwarded_for: config.trust_forwarded_for,
        };
        Ok(Self::new(settings, networks, slack))
    }

    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    fn network(&self, chain_id: Option<u64>) -> Result<&FaucetNetwork, FaucetRejection> {
        chain_id
            .and_then(|id| self.networks.get(&id))
            .ok_or(FaucetRejection::InvalidChain)
    }

    pub async fn stats(&self, chain_id: Option<u64>) -> Result<FaucetStats, FaucetRejection> {
        let network = self.network(chain_id)?;
        let account = network.gateway.account();
        let balance = network
            .gateway
            .balance_of(network.hmt_address, account)
            .await
            .map_err(|err| {
                error!(chain_id = network.chain_id, "Faucet balance lookup failed: {err}");
                FaucetRejection::BalanceUnavailable
            })?;

        Ok(FaucetStats {
            account: account.to_string(),
            balance: format_token_amount(balance).map_err(|err| {
                error!(chain_id = network.chain_id, "{err:#}");
                FaucetRejection::BalanceUnavailable
            })?,
            daily_limit: self.daily_limit,
        })
    }

    pub async fn queue(&self) -> Vec<SendRecord> {
        self.history.snapshot().await
    }

    /// Sends one drip of HMT to `address` on `chain_id`.
    pub async fn request_funds(
        &self,
        chain_id: Option<u64>,
        address: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<B256, FaucetRejection> {
        let network = self.network(chain_id)?;

        let compact: String = address.chars().filter(|c| !c.is_whitespace()).collect();
        let recipient = parse_address(&compact).map_err(|_| FaucetRejection::InvalidAddress)?;
        let address_key = recipient.to_string();

        let ip_key = client_ip
            .ok_or(FaucetRejection::RequestFailed)?
            .to_string();

        // Keys are claimed up front so concurrent requests cannot both get a drip.
        if let Some(waits) = &self.ip_waits {
            waits
                .reserve(&ip_key)
                .await
                .map_err(FaucetRejection::IpBlocked)?;
        }
        if let Some(waits) = &self.address_waits {
            if let Err(left) = waits.reserve(&address_key).await {
                self.release(&ip_key, None).await;
                return Err(FaucetRejection::AddressBlocked(left));
            }
        }

        let tx_hash = match self.send_drip(network, recipient).await {
            Ok(tx_hash) => tx_hash,
            Err(rejection) => {
                self.release(&ip_key, Some(&address_key)).await;
                return Err(rejection);
            }
        };

        self.history
            .push(SendRecord {
                time: Utc::now().timestamp_millis(),
                address: address_key.clone(),
                tx_hash: tx_hash.to_string(),
            })
            .await;

        if let Some(waits) = &self.ip_waits {
            waits.block(&ip_key).await;
        }
        if let Some(waits) = &self.address_waits {
            waits.block(&address_key).await;
        }

        info!(
            chain_id = network.chain_id,
            %recipient,
            tx = %tx_hash,
            "Faucet drip sent"
        );
        Ok(tx_hash)
    }

    async fn send_drip(
        &self,
        network: &FaucetNetwork,
        recipient: Address,
    ) -> Result<B256, FaucetRejection> {
        let gateway = &network.gateway;
        let balance = gateway
            .balance_of(network.hmt_address, gateway.account())
            .await
            .map_err(|err| {
                error!(chain_id = network.chain_id, "Faucet balance lookup failed: {err}");
                FaucetRejection::RequestFailed
            })?;
        if balance < self.amount {
            warn!(
                chain_id = network.chain_id,
                balance = %balance,
                "Faucet out of balance"
            );
            if let Some(slack) = &self.slack {
                slack.out_of_balance(&network.title);
            }
            return Err(FaucetRejection::OutOfBalance);
        }

        match gateway
            .transfer(network.hmt_address, recipient, self.amount)
            .await
        {
            Ok(tx_hash) => Ok(tx_hash),
            // Broadcast already happened; a retry would pay out twice.
            Err(ChainError::ReceiptTimeout { hash, waited }) => {
                warn!(
                    chain_id = network.chain_id,
                    %recipient,
                    tx = %hash,
                    ?waited,
                    "Faucet drip broadcast but not confirmed"
                );
                Ok(hash)
            }
            Err(err) => {
                error!(chain_id = network.chain_id, %recipient, "Faucet transfer failed: {err}");
                Err(FaucetRejection::RequestFailed)
            }
        }
    }

    async fn release(&self, ip_key: &str, address_key: Option<&str>) {
        if let Some(waits) = &self.ip_waits {
            waits.release(ip_key).await;
        }
        if let (Some(waits), Some(key)) = (&self.address_waits, address_key) {
            waits.release(key).await;
        }
    }
}

/// Renders a wait as `HH:MM:SS`; whole days are dropped.
pub fn format_wait(duration: &Duration) -> String {
    let total_seconds = duration.as_secs();
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = (total_seconds / 3_600) % 24;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
