use serde::{Deserialize, Serialize};

/// One scraped advertisement. Read-only once ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdItem {
    pub ad_archive_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    pub page_name: Option<String>,
    pub cta_text: Option<String>,
}

impl AdItem {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Which provider path an item takes. Assigned once by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    TextOnly,
    TextWithImage,
    TextWithVideo,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::TextWithImage => "text_with_image",
            Self::TextWithVideo => "text_with_video",
        }
    }

    /// Image and video items need a media call before synthesis.
    pub fn needs_media_analysis(&self) -> bool {
        !matches!(self, Self::TextOnly)
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
