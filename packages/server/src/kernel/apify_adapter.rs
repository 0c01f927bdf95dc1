//! Apify-backed scrape provider (Facebook Ad Library actor).

use apify_client::{ApifyClient, ApifyError, FacebookAd};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::traits::{BaseScrapeProvider, ScrapeError, ScrapeRequest, ScrapeResponse};
use crate::domains::ads::AdItem;

/// Default Ad Library scraper actor.
pub const DEFAULT_ADS_ACTOR: &str = "curious_coder~facebook-ads-library-scraper";

pub struct ApifyScrapeAdapter {
    client: Arc<ApifyClient>,
    actor_id: String,
}

impl ApifyScrapeAdapter {
    pub fn new(client: Arc<ApifyClient>, actor_id: impl Into<String>) -> Self {
        Self {
            client,
            actor_id: actor_id.into(),
        }
    }
}

#[async_trait]
impl BaseScrapeProvider for ApifyScrapeAdapter {
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse, ScrapeError> {
        let output = self
            .client
            .scrape_facebook_ads(
                &self.actor_id,
                &request.keyword,
                &request.region,
                request.max_items,
            )
            .await
            .map_err(scrape_error)?;

        let items: Vec<AdItem> = output.ads.iter().map(ad_item_from).collect();
        info!(run_id = %output.run_id, items = items.len(), "Ad library scrape finished");

        Ok(ScrapeResponse {
            run_id: output.run_id,
            items,
        })
    }
}

fn scrape_error(err: ApifyError) -> ScrapeError {
    match err {
        ApifyError::Network(e) => ScrapeError::Network(e.to_string()),
        ApifyError::InvalidRequest(msg) => ScrapeError::InvalidRequest(msg),
        other => ScrapeError::Provider(other.to_string()),
    }
}

pub fn ad_item_from(ad: &FacebookAd) -> AdItem {
    AdItem {
        ad_archive_id: ad.archive_id(),
        text: ad.body_text().unwrap_or_default(),
        image_urls: ad.image_urls(),
        video_urls: ad.video_urls(),
        page_name: ad.advertiser(),
        cta_text: ad.call_to_action(),
    }
}
