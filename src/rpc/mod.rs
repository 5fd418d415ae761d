use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::{Context, Result, anyhow};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};

/// Thin Ethereum JSON-RPC client. Quantities travel as `0x` hex strings.
#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let response: U64 = self
            .inner
            .request("eth_chainId", rpc_params![])
            .await
            .context("RPC call eth_chainId failed")?;
        Ok(response.to())
    }

    pub async fn gas_price(&self) -> Result<u128> {
        let response: U256 = self
            .inner
            .request("eth_gasPrice", rpc_params![])
            .await
            .context("RPC call eth_gasPrice failed")?;
        u128::try_from(response).map_err(|_| anyhow!("Gas price {response} exceeds u128"))
    }

    pub async fn pending_nonce(&self, account: Address) -> Result<u64> {
        let response: U64 = self
            .inner
            .request("eth_getTransactionCount", rpc_params![account, "pending"])
            .await
            .context("RPC call eth_getTransactionCount failed")?;
        Ok(response.to())
    }

    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let response: U64 = self
            .inner
            .request("eth_estimateGas", rpc_params![request])
            .await
            .context("RPC call eth_estimateGas failed")?;
        Ok(response.to())
    }

    pub async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.inner
            .request("eth_call", rpc_params![request, "latest"])
            .await
            .context("RPC call eth_call failed")
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        assert!(!raw.is_empty(), "Raw transaction must not be empty");
        self.inner
            .request(
                "eth_sendRawTransaction",
                rpc_params![Bytes::copy_from_slice(raw)],
            )
            .await
            .context("RPC call eth_sendRawTransaction failed")
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.inner
            .request("eth_getTransactionReceipt", rpc_params![hash])
            .await
            .context("RPC call eth_getTransactionReceipt failed")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

impl CallRequest {
    pub fn new(from: Address, to: Address, data: &[u8]) -> Self {
        Self {
            from,
            to,
            data: Bytes::copy_from_slice(data),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub status: Option<U64>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
    /// Pre-Byzantium receipts carry no status and are treated as successful.
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "status": "0x1",
            "logs": []
        }))
        .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.transaction_hash, B256::repeat_byte(0x01));

        let reverted: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "status": "0x0"
        }))
        .unwrap();
        assert!(!reverted.succeeded());
        assert!(reverted.logs.is_empty());

        let legacy: TransactionReceipt =
            serde_json::from_value(serde_json::json!({ "transactionHash": HASH })).unwrap();
        assert!(legacy.succeeded());
    }

    #[test]
    fn receipt_logs_are_typed() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": HASH,
            "status": "0x1",
            "logs": [{
                "address": "0x1111111111111111111111111111111111111111",
                "topics": [HASH],
                "data": "0x2a"
            }]
        }))
        .unwrap();
        let log = &receipt.logs[0];
        assert_eq!(log.address, Address::repeat_byte(0x11));
        assert_eq!(log.topics, vec![B256::repeat_byte(0x01)]);
        assert_eq!(log.data.as_ref(), &[0x2a]);
    }

    #[test]
    fn call_request_encodes_hex() {
        let request = CallRequest::new(Address::ZERO, Address::ZERO, &[0x70, 0xa0, 0x82, 0x31]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["data"], "0x70a08231");
        assert!(json["to"].as_str().unwrap().starts_with("0x"));
    }
}
