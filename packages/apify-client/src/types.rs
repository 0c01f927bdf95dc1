use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single start URL entry as the ads library actors expect it.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the Facebook Ad Library scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct FacebookAdsScraperInput {
    pub urls: Vec<StartUrl>,
    pub count: u32,
    #[serde(rename = "scrapeAdDetails")]
    pub scrape_ad_details: bool,
}

/// One ad record from the Apify dataset.
///
/// Actor versions disagree on whether creative fields sit at the top level or
/// under `snapshot`, so both are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacebookAd {
    #[serde(alias = "adArchiveID", alias = "adArchiveId")]
    pub ad_archive_id: Option<serde_json::Value>,
    #[serde(alias = "pageName")]
    pub page_name: Option<String>,
    pub snapshot: Option<AdSnapshot>,
    #[serde(alias = "adText")]
    pub ad_text: Option<String>,
    #[serde(alias = "ctaText")]
    pub cta_text: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<i64>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

/// Creative snapshot attached to an ad.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdSnapshot {
    pub body: Option<AdBody>,
    pub title: Option<String>,
    pub page_name: Option<String>,
    pub cta_text: Option<String>,
    pub link_url: Option<String>,
    #[serde(default)]
    pub images: Vec<AdImage>,
    #[serde(default)]
    pub videos: Vec<AdVideo>,
    #[serde(default)]
    pub cards: Vec<AdCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdBody {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdImage {
    pub original_image_url: Option<String>,
    pub resized_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdVideo {
    pub video_hd_url: Option<String>,
    pub video_sd_url: Option<String>,
    pub video_preview_image_url: Option<String>,
}

/// Carousel card; carries its own body and media.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdCard {
    pub body: Option<String>,
    pub original_image_url: Option<String>,
    pub resized_image_url: Option<String>,
    pub video_hd_url: Option<String>,
    pub video_sd_url: Option<String>,
}

impl FacebookAd {
    /// Archive id as a string, whichever JSON type the actor used.
    pub fn archive_id(&self) -> Option<String> {
        match self.ad_archive_id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Primary body text, preferring the snapshot body over the flat field.
    pub fn body_text(&self) -> Option<String> {
        let from_snapshot = self
            .snapshot
            .as_ref()
            .and_then(|s| s.body.as_ref())
            .and_then(|b| b.text.clone());
        let from_cards = self
            .snapshot
            .as_ref()
            .and_then(|s| s.cards.iter().find_map(|c| c.body.clone()));
        from_snapshot
            .or_else(|| self.ad_text.clone())
            .or(from_cards)
            .filter(|t| !t.trim().is_empty())
    }

    pub fn image_urls(&self) -> Vec<String> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .images
            .iter()
            .filter_map(|i| i.original_image_url.clone().or_else(|| i.resized_image_url.clone()))
            .chain(
                snapshot
                    .cards
                    .iter()
                    .filter_map(|c| c.original_image_url.clone().or_else(|| c.resized_image_url.clone())),
            )
            .collect()
    }

    pub fn video_urls(&self) -> Vec<String> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .videos
            .iter()
            .filter_map(|v| v.video_hd_url.clone().or_else(|| v.video_sd_url.clone()))
            .chain(
                snapshot
                    .cards
                    .iter()
                    .filter_map(|c| c.video_hd_url.clone().or_else(|| c.video_sd_url.clone())),
            )
            .collect()
    }

    pub fn advertiser(&self) -> Option<String> {
        self.page_name
            .clone()
            .or_else(|| self.snapshot.as_ref().and_then(|s| s.page_name.clone()))
    }

    pub fn call_to_action(&self) -> Option<String> {
        self.cta_text
            .clone()
            .or_else(|| self.snapshot.as_ref().and_then(|s| s.cta_text.clone()))
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Ads plus the run that produced them.
#[derive(Debug, Clone)]
pub struct AdsScrapeOutput {
    pub run_id: String,
    pub ads: Vec<FacebookAd>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_shape_is_read() {
        let json = serde_json::json!({
            "ad_archive_id": 1234567890u64,
            "page_name": "Acme Shoes",
            "snapshot": {
                "body": { "text": "Run faster. 30% off today." },
                "cta_text": "Shop Now",
                "images": [{ "original_image_url": "https://scontent.example/img.jpg" }],
                "videos": []
            }
        });
        let ad: FacebookAd = serde_json::from_value(json).unwrap();
        assert_eq!(ad.archive_id().as_deref(), Some("1234567890"));
        assert_eq!(ad.body_text().as_deref(), Some("Run faster. 30% off today."));
        assert_eq!(ad.image_urls(), vec!["https://scontent.example/img.jpg"]);
        assert!(ad.video_urls().is_empty());
        assert_eq!(ad.call_to_action().as_deref(), Some("Shop Now"));
    }

    #[test]
    fn flat_shape_and_carousel_cards() {
        let json = serde_json::json!({
            "adArchiveID": "987",
            "pageName": "Acme",
            "snapshot": {
                "cards": [
                    { "body": "Card copy", "video_sd_url": "https://video.example/v.mp4" }
                ]
            }
        });
        let ad: FacebookAd = serde_json::from_value(json).unwrap();
        assert_eq!(ad.archive_id().as_deref(), Some("987"));
        assert_eq!(ad.body_text().as_deref(), Some("Card copy"));
        assert_eq!(ad.video_urls(), vec!["https://video.example/v.mp4"]);
        assert_eq!(ad.advertiser().as_deref(), Some("Acme"));
    }

    #[test]
    fn blank_body_is_none() {
        let ad = FacebookAd {
            ad_text: Some("   ".into()),
            ..Default::default()
        };
        assert!(ad.body_text().is_none());
    }
}
