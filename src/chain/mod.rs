//! EVM access for the faucet and the escrow launcher.
//!
//! [`ChainGateway`] is the seam the services talk to. [`EvmGateway`] implements it
//! over JSON-RPC: reads go through `eth_call`, writes are signed locally as legacy
//! EIP-155 transactions and confirmed by polling for the receipt.

mod contracts;
mod units;

use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, B256, TxKind, U256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::rpc::{CallRequest, RpcClient, TransactionReceipt};

use self::contracts::{IEscrow, IEscrowFactory, IHMToken, launched_escrow};
pub use self::units::{format_token_amount, parse_address, parse_token_amount, token_amount_from_f64};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("rpc request failed: {0:#}")]
    Rpc(#[from] anyhow::Error),
    #[error("failed to sign transaction: {0}")]
    Signing(#[from] alloy::signers::Error),
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("transaction {hash} was not mined within {waited:?}")]
    ReceiptTimeout { hash: B256, waited: Duration },
    #[error("malformed {method} response: {reason}")]
    Malformed { method: &'static str, reason: String },
}

/// Arguments of `Escrow.setup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowSetup {
    pub reputation_oracle: Address,
    pub recording_oracle: Address,
    pub reputation_oracle_stake: U256,
    pub recording_oracle_stake: U256,
    pub url: String,
    pub hash: String,
    pub solutions_requested: U256,
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// The service wallet every transaction is sent from.
    fn account(&self) -> Address;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<B256, ChainError>;

    async fn transfer_from(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, ChainError>;

    async fn create_escrow(
        &self,
        factory: Address,
        token: Address,
        trusted_handlers: Vec<Address>,
    ) -> Result<Address, ChainError>;

    async fn setup_escrow(&self, escrow: Address, setup: &EscrowSetup) -> Result<B256, ChainError>;
}

pub struct EvmGateway {
    rpc: RpcClient,
    signer: PrivateKeySigner,
    chain_id: u64,
    receipt_timeout: Duration,
    submission: Mutex<()>,
}

impl EvmGateway {
    pub fn connect(
        network: &NetworkConfig,
        signer: PrivateKeySigner,
        receipt_timeout: Duration,
    ) -> anyhow::Result<Self> {
        assert!(network.chain_id > 0, "Chain id must be non-zero");
        assert!(
            receipt_timeout >= RECEIPT_POLL_INTERVAL,
            "Receipt timeout shorter than one poll"
        );
        let rpc = RpcClient::new(&network.rpc_url, network.request_timeout())
            .with_context(|| format!("Failed to initialize RPC client for {}", network.title))?;
        debug!(
            chain_id = network.chain_id,
            timeout_ms = rpc.timeout().as_millis() as u64,
            "RPC client ready"
        );
        Ok(Self {
            rpc,
            signer,
            chain_id: network.chain_id,
            receipt_timeout,
            submission: Mutex::new(()),
        })
    }

    /// Logs a warning when the node serves a different chain than configured.
    pub async fn verify_chain_id(&self) {
        match self.rpc.chain_id().await {
            Ok(reported) if reported == self.chain_id => {
                debug!(chain_id = reported, "RPC node chain id verified");
            }
            Ok(reported) => warn!(
                expected = self.chain_id,
                reported, "RPC node reports a different chain id"
            ),
            Err(err) => warn!(chain_id = self.chain_id, "Chain id check failed: {err:#}"),
        }
    }

    async fn read_word(&self, to: Address, data: Vec<u8>) -> Result<U256, ChainError> {
        let request = CallRequest::new(self.signer.address(), to, &data);
        let output = self.rpc.call(&request).await?;
        if output.len() < 32 {
            return Err(ChainError::Malformed {
                method: "eth_call",
                reason: format!("expected a 32 byte word, got {} bytes", output.len()),
            });
        }
        Ok(U256::from_be_slice(&output[..32]))
    }

    async fn submit(&self, to: Address, input: Vec<u8>) -> Result<TransactionReceipt, ChainError> {
        let from = self.signer.address();
        // Nonces are assigned from the node's pending count, so one transaction at a time.
        let _guard = self.submission.lock().await;

        let request = CallRequest::new(from, to, &input);
        let gas_limit = self.rpc.estimate_gas(&request).await?;
        let gas_price = self.rpc.gas_price().await?;
        let nonce = self.rpc.pending_nonce(from).await?;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value: U256::ZERO,
            input: input.into(),
        };
        let signature = self.signer.sign_hash_sync(&tx.signature_hash())?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let hash = self.rpc.send_raw_transaction(&envelope.encoded_2718()).await?;
        debug!(%hash, nonce, gas_limit, "Transaction submitted");

        let receipt = self.await_receipt(hash).await?;
        if !receipt.succeeded() {
            return Err(ChainError::Reverted(hash));
        }
        Ok(receipt)
    }

    /// Polls until the receipt shows up. The transaction is already broadcast, so failed
    /// lookups are retried until the deadline instead of abandoning it.
    async fn await_receipt(&self, hash: B256) -> Result<TransactionReceipt, ChainError> {
        let polling = async {
            loop {
                match self.rpc.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(err) => warn!(%hash, "Receipt lookup failed, retrying: {err:#}"),
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(self.receipt_timeout, polling)
            .await
            .map_err(|_| ChainError::ReceiptTimeout {
                hash,
                waited: self.receipt_timeout,
            })
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn account(&self) -> Address {
        self.signer.address()
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let call = IHMToken::balanceOfCall { owner };
        self.read_word(token, call.abi_encode()).await
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let call = IHMToken::allowanceCall { owner, spender };
        self.read_word(token, call.abi_encode()).await
    }

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<B256, ChainError> {
        let call = IHMToken::transferCall { to, value: amount };
        let receipt = self.submit(token, call.abi_encode()).await?;
        info!(%token, %to, %amount, tx = %receipt.transaction_hash, "Token transfer mined");
        Ok(receipt.transaction_hash)
    }

    async fn transfer_from(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, ChainError> {
        let call = IHMToken::transferFromCall {
            from,
            to,
            value: amount,
        };
        let receipt = self.submit(token, call.abi_encode()).await?;
        info!(%token, %from, %to, %amount, tx = %receipt.transaction_hash, "Token transferFrom mined");
        Ok(receipt.transaction_hash)
    }

    async fn create_escrow(
        &self,
        factory: Address,
        token: Address,
        trusted_handlers: Vec<Address>,
    ) -> Result<Address, ChainError> {
        let call = IEscrowFactory::createEscrowCall {
            token,
            trustedHandlers: trusted_handlers,
        };
        let receipt = self.submit(factory, call.abi_encode()).await?;
        let escrow =
            launched_escrow(factory, &receipt.logs).ok_or_else(|| ChainError::Malformed {
                method: "createEscrow",
                reason: format!(
                    "receipt {} carries no Launched event",
                    receipt.transaction_hash
                ),
            })?;
        info!(%factory, %escrow, "Escrow launched");
        Ok(escrow)
    }

    async fn setup_escrow(&self, escrow: Address, setup: &EscrowSetup) -> Result<B256, ChainError> {
        let call = IEscrow::setupCall {
            reputationOracle: setup.reputation_oracle,
            recordingOracle: setup.recording_oracle,
            reputationOracleStake: setup.reputation_oracle_stake,
            recordingOracleStake: setup.recording_oracle_stake,
            url: setup.url.clone(),
            hash: setup.hash.clone(),
            solutionsRequested: setup.solutions_requested,
        };
        let receipt = self.submit(escrow, call.abi_encode()).await?;
        info!(%escrow, url = %setup.url, "Escrow set up");
        Ok(receipt.transaction_hash)
    }
}
