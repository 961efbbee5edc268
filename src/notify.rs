use crate::error::{Result, WatcherError};
use crate::types::Listing;
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// One outbound notification for a newly discovered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingAlert {
    #[serde(rename = "value1")]
    pub title: String,

    #[serde(rename = "value2")]
    pub link: String,

    #[serde(rename = "value3")]
    pub image_url: String,

    #[serde(rename = "rawData")]
    pub raw: Value,
}

impl ListingAlert {
    /// 构建通知：链接补全站点域名，原始数据附带触发的关键词
    pub fn new(listing: &Listing, term: &str, site_origin: &str) -> Self {
        Self {
            title: listing.title.clone(),
            link: format!("{}{}", site_origin.trim_end_matches('/'), listing.vip_url),
            image_url: listing.image_url().unwrap_or_default().to_string(),
            raw: listing.annotated(term),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempt delivery exactly once. No retries.
    async fn notify(&self, alert: &ListingAlert) -> Result<()>;
}

/// Posts alerts as JSON to a webhook (IFTTT `value1..3` layout).
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: Option<String>,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(webhook: Option<String>) -> Self {
        Self {
            webhook: webhook.filter(|url| !url.trim().is_empty()),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &ListingAlert) -> Result<()> {
        let webhook = self.webhook.as_deref().ok_or(WatcherError::MissingWebhook)?;

        let response = self
            .client
            .post(webhook)
            .timeout(self.timeout)
            .json(alert)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(WatcherError::WebhookRejected { status, body });
        }

        info!("✅ 通知已发送: {}", alert.title);
        Ok(())
    }
}
