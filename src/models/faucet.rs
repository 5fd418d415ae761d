use serde::{Deserialize, Serialize};

use super::lenient_chain_id;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetRequestBody {
    #[serde(default, deserialize_with = "lenient_chain_id")]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRecord {
    /// Unix milliseconds.
    pub time: i64,
    pub address: String,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetStats {
    pub account: String,
    pub balance: String,
    pub daily_limit: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub last_send: Vec<SendRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetReply {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl FaucetReply {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            tx_hash: None,
        }
    }

    pub fn sent(tx_hash: String) -> Self {
        Self {
            status: true,
            message: "Requested successfully".to_string(),
            tx_hash: Some(tx_hash),
        }
    }
}
