use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;

use crate::config::PricingConfig;

const HMT_COIN_ID: &str = "human-protocol";

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// How many HMT `amount` units of `currency` buy.
    async fn hmt_amount(&self, amount: f64, currency: &str) -> Result<f64>;
}

pub struct CoinGeckoPrices {
    client: reqwest::Client,
    api_base: String,
}

impl CoinGeckoPrices {
    pub fn new(config: &PricingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build pricing HTTP client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoPrices {
    async fn hmt_amount(&self, amount: f64, currency: &str) -> Result<f64> {
        let currency = currency.trim().to_ascii_lowercase();
        let quotes: HashMap<String, HashMap<String, f64>> = self
            .client
            .get(format!("{}/simple/price", self.api_base))
            .query(&[("ids", HMT_COIN_ID), ("vs_currencies", currency.as_str())])
            .send()
            .await
            .context("HMT price request failed")?
            .error_for_status()
            .context("HMT price request rejected")?
            .json()
            .await
            .context("HMT price response is malformed")?;
        let price = quoted_price(&quotes, &currency)?;
        Ok(amount / price)
    }
}

fn quoted_price(quotes: &HashMap<String, HashMap<String, f64>>, currency: &str) -> Result<f64> {
    let price = quotes
        .get(HMT_COIN_ID)
        .and_then(|by_currency| by_currency.get(currency))
        .copied()
        .ok_or_else(|| anyhow!("No HMT quote available in {currency}"))?;
    ensure!(
        price.is_finite() && price > 0.0,
        "HMT quote {price} in {currency} is unusable"
    );
    Ok(price)
}
