use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use guardian_common::DnsSettings;
use reqwest::Client;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;
use tracing::info;

/// Points one configured hostname at a new address.
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    fn hostname(&self) -> &str;

    async fn update_record(&self, address: &str) -> Result<()>;
}

/// Cloudflare v4 DNS record update (one PUT per event).
pub struct CloudflareDns {
    client: Client,
    settings: DnsSettings,
}

impl CloudflareDns {
    pub fn new(settings: DnsSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    fn record_url(&self) -> String {
        format!(
            "{}/zones/{}/dns_records/{}",
            self.settings.api_url, self.settings.zone_id, self.settings.record_id
        )
    }
}

fn record_type(address: &str) -> &'static str {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => "AAAA",
        _ => "A",
    }
}

#[async_trait]
impl DnsUpdater for CloudflareDns {
    fn hostname(&self) -> &str {
        &self.settings.record_name
    }

    async fn update_record(&self, address: &str) -> Result<()> {
        let body = json!({
            "type": record_type(address),
            "name": self.settings.record_name,
            "content": address,
            "ttl": self.settings.ttl,
            "proxied": false,
        });
        let resp = self
            .client
            .put(self.record_url())
            .bearer_auth(&self.settings.api_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        // Cloudflare can answer 200 with `success: false`.
        let success = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["success"].as_bool())
            .unwrap_or(false);
        if !status.is_success() || !success {
            return Err(anyhow!(
                "DNS update rejected: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        info!(record = %self.settings.record_name, address, "DNS record updated");
        Ok(())
    }
}
