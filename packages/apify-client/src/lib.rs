//! Pure Apify REST API client.
//!
//! A minimal client for the Apify platform API. Supports starting actor runs,
//! polling for completion, and fetching dataset results. The ads helpers drive
//! a Facebook Ad Library scraper actor end to end.
//!
//! # Example
//!
//! ```rust,ignore
//! use apify_client::ApifyClient;
//!
//! let client = ApifyClient::new("your-api-token".into());
//!
//! let out = client.scrape_facebook_ads("curious_coder~facebook-ads-library-scraper", "running shoes", "US", 25).await?;
//! for ad in &out.ads {
//!     println!("{}", ad.body_text().unwrap_or_else(|| "(no text)".into()));
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{AdsScrapeOutput, FacebookAd, FacebookAdsScraperInput, RunData, StartUrl};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

const AD_LIBRARY_URL: &str = "https://www.facebook.com/ads/library/";

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (local stub servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Start an actor run with arbitrary input. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes. Uses `waitForFinish=60` for efficient long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        loop {
            let url = format!("{}/actor-runs/{}?waitForFinish=60", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    continue;
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json&clean=true", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Scrape the Ad Library for a keyword end-to-end: start run, poll, fetch results.
    pub async fn scrape_facebook_ads(
        &self,
        actor_id: &str,
        query: &str,
        country: &str,
        count: u32,
    ) -> Result<AdsScrapeOutput> {
        tracing::info!(query, country, count, "Starting ad library scrape");

        let input = FacebookAdsScraperInput {
            urls: vec![StartUrl {
                url: ad_library_search_url(query, country)?,
            }],
            count,
            scrape_ad_details: false,
        };

        let run = self.start_run(actor_id, &input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let mut ads: Vec<FacebookAd> = self.get_dataset_items(&completed.default_dataset_id).await?;
        // Actors occasionally overshoot the requested count.
        ads.truncate(count as usize);
        tracing::info!(count = ads.len(), "Fetched ads");

        Ok(AdsScrapeOutput {
            run_id: completed.id,
            ads,
        })
    }
}

/// Build an Ad Library keyword search URL for all active ads in a country.
pub fn ad_library_search_url(query: &str, country: &str) -> Result<String> {
    if query.trim().is_empty() {
        return Err(ApifyError::InvalidRequest("search query is empty".into()));
    }
    let url = reqwest::Url::parse_with_params(
        AD_LIBRARY_URL,
        &[
            ("active_status", "active"),
            ("ad_type", "all"),
            ("country", country),
            ("q", query.trim()),
            ("search_type", "keyword_unordered"),
            ("media_type", "all"),
        ],
    )
    .map_err(|e| ApifyError::InvalidRequest(e.to_string()))?;
    Ok(url.to_string())
}
