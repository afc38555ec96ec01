//! Catalog source: pack discovery, card pages and card art

pub mod extract;

use async_trait::async_trait;
use optcg_common::types::{Card, Pack};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{IngestError, Result};

/// Where packs and cards come from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List every pack; failure here aborts a run
    async fn discover_packs(&self) -> Result<Vec<Pack>>;

    /// Cards on one pack's page; cards that fail extraction are skipped
    async fn fetch_cards(&self, pack_id: &str) -> Result<Vec<Card>>;

    /// Card art referenced by `card.img_url`
    async fn fetch_asset(&self, card: &Card) -> Result<Vec<u8>>;
}

/// The official English card list site
pub struct OfficialSite {
    client: Client,
    config: SourceConfig,
}

impl OfficialSite {
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate().map_err(IngestError::Config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// GET with exponential backoff between attempts
    async fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 1..=self.config.max_retries {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = Some(e);

                    if attempt < self.config.max_retries {
                        let backoff = Duration::from_millis(
                            self.config.retry_base_delay_ms.saturating_mul(2u64.pow(attempt)),
                        );
                        debug!(backoff_ms = backoff.as_millis() as u64, "Retrying fetch");
                        tokio::time::sleep(backoff).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| IngestError::fetch(url, "no fetch attempts were made")))
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::fetch(url, format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| IngestError::fetch(url, e))?;
        Ok(body.to_vec())
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let body = self.get_with_retry(url).await?;
        String::from_utf8(body).map_err(|e| IngestError::fetch(url, e))
    }
}

#[async_trait]
impl CatalogSource for OfficialSite {
    async fn discover_packs(&self) -> Result<Vec<Pack>> {
        let url = self.config.cardlist_url()?;
        info!(url = %url, "GET");

        let html = self.get_text(url.as_str()).await?;
        let packs = extract::extract_packs(&html);

        info!(packs = packs.len(), "Discovered packs");
        Ok(packs)
    }

    async fn fetch_cards(&self, pack_id: &str) -> Result<Vec<Card>> {
        let url = self.config.series_url(pack_id)?;
        info!(url = %url, "GET");

        let html = self.get_text(url.as_str()).await?;
        Ok(extract::extract_cards(
            &html,
            pack_id,
            self.config.base_url_trimmed(),
        ))
    }

    async fn fetch_asset(&self, card: &Card) -> Result<Vec<u8>> {
        debug!(url = %card.img_url, card_id = %card.id, "Downloading image");
        self.get_with_retry(&card.img_url).await
    }
}
