use serde::{Deserialize, Deserializer, Serialize};

use super::lenient_chain_id;

/// Body of `POST /check-escrow` and `POST /escrow`, kept as sent so it can be
/// republished in the escrow manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowRequest {
    #[serde(default, deserialize_with = "lenient_chain_id")]
    pub chain_id: Option<u64>,
    pub title: String,
    pub description: String,
    pub fortunes_required: f64,
    pub token: String,
    pub fund_amount: f64,
    pub job_requester: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub fiat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowLaunched {
    pub escrow_address: String,
    pub exchange_url: String,
}

/// What gets uploaded next to the escrow: the request plus the oracles serving it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowManifest {
    #[serde(flatten)]
    pub request: EscrowRequest,
    pub recording_oracle_address: String,
    pub reputation_oracle_address: String,
    pub exchange_oracle_address: String,
    pub recording_oracle_url: String,
    pub reputation_oracle_url: String,
    pub exchange_oracle_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

/// `fiat` arrives as a boolean or as the strings "true"/"false".
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<FlagValue>::deserialize(deserializer)? {
        None => Ok(false),
        Some(FlagValue::Bool(flag)) => Ok(flag),
        Some(FlagValue::Text(text)) => match text.trim() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "fiat must be a boolean, got {other:?}"
            ))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextValue {
    Text(String),
    Number(serde_json::Number),
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextValue>::deserialize(deserializer)? {
        None => None,
        Some(TextValue::Text(text)) => Some(text).filter(|t| !t.trim().is_empty()),
        Some(TextValue::Number(number)) => Some(number.to_string()),
    })
}
