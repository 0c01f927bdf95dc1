//! Content classification.
//!
//! Pure mapping from an [`AdItem`] to its [`ContentCategory`]. The category
//! picks the provider path, so it is computed once per item and carried
//! through retries unchanged.

use lazy_static::lazy_static;
use regex::Regex;

use super::models::{AdItem, ContentCategory};

lazy_static! {
    // Direct video files the media analyzer can fetch
    static ref VIDEO_FILE_REGEX: Regex = Regex::new(
        r"(?i)^https?://[^\s?#]+\.(mp4|mov|webm|m4v)([?#][^\s]*)?$"
    ).unwrap();

    // Facebook video CDN (video.xx.fbcdn.net, video-xxx.fbcdn.net)
    static ref VIDEO_CDN_REGEX: Regex = Regex::new(
        r"(?i)^https?://video[a-z0-9.-]*\.fbcdn\.net/[^\s]+$"
    ).unwrap();

    static ref HTTP_URL_REGEX: Regex = Regex::new(r"(?i)^https?://[^\s/]+\.[^\s]+$").unwrap();
}

/// Video URL the provider can actually play.
pub fn is_playable_video(url: &str) -> bool {
    let url = url.trim();
    VIDEO_FILE_REGEX.is_match(url) || VIDEO_CDN_REGEX.is_match(url)
}

/// Image URL that can be fetched over http(s).
pub fn is_resolvable_image(url: &str) -> bool {
    HTTP_URL_REGEX.is_match(url.trim())
}

pub fn classify(item: &AdItem) -> ContentCategory {
    if !item.has_text() {
        return ContentCategory::TextOnly;
    }
    if item.video_urls.iter().any(|u| is_playable_video(u)) {
        return ContentCategory::TextWithVideo;
    }
    if item.image_urls.iter().any(|u| is_resolvable_image(u)) {
        return ContentCategory::TextWithImage;
    }
    ContentCategory::TextOnly
}
