use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

/// Posts operator alerts to a Slack incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        assert!(!webhook_url.is_empty(), "Slack webhook URL must be set");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Slack HTTP client")?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// Fire and forget; delivery failures are only logged.
    pub fn out_of_balance(&self, network_title: &str) {
        let notifier = self.clone();
        let text = out_of_balance_text(network_title);
        tokio::spawn(async move {
            match notifier.post(text).await {
                Ok(()) => info!("Out of balance alert delivered"),
                Err(err) => warn!("Slack alert failed: {err:#}"),
            }
        });
    }

    async fn post(&self, text: String) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(&SlackMessage { text })
            .send()
            .await
            .context("Slack webhook request failed")?
            .error_for_status()
            .context("Slack webhook rejected the message")?;
        Ok(())
    }
}

fn out_of_balance_text(network_title: &str) -> String {
    format!("Faucet out of balance on {network_title}")
}
