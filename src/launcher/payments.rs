use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::StripeConfig;

pub const PAYMENT_SUCCEEDED: &str = "succeeded";

/// A card payment the requester made for a fiat-funded escrow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Payment {
    pub id: String,
    pub status: String,
    /// Smallest currency unit (cents).
    pub amount: u64,
    pub currency: String,
}

impl Payment {
    pub fn succeeded(&self) -> bool {
        self.status == PAYMENT_SUCCEEDED
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// `None` when the provider does not know the payment.
    async fn payment(&self, payment_id: &str) -> Result<Option<Payment>>;
}

pub struct StripePayments {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripePayments {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Stripe HTTP client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePayments {
    async fn payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        if !is_payment_id(payment_id) {
            return Ok(None);
        }
        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{payment_id}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("Stripe payment lookup failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payment = response
            .error_for_status()
            .context("Stripe rejected the payment lookup")?
            .json::<Payment>()
            .await
            .context("Stripe returned a malformed payment intent")?;
        Ok(Some(payment))
    }
}

/// Stripe ids look like `pi_3MtwBwLkdIwHu7ix28a3tqPa`.
fn is_payment_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 255
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
