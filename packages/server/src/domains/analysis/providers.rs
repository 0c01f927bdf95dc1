//! Provider routing and token estimation.
//!
//! The content category decides which calls an item needs and in what order.
//! The plan is built once per item and reused across retries.

use crate::domains::ads::{is_playable_video, is_resolvable_image, AdItem, ContentCategory};
use crate::kernel::{AnalysisRequest, AnalysisRoute, ProviderResponse};

const CHARS_PER_TOKEN: usize = 4;
const IMAGE_TOKENS: u32 = 850;
const VIDEO_TOKENS: u32 = 2_500;
const OUTPUT_TOKENS: u32 = 600;

const MAX_IMAGES: usize = 4;
const MAX_VIDEOS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    MediaAnalyzer,
    Synthesizer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCall {
    pub role: ProviderRole,
    pub route: AnalysisRoute,
    pub model: String,
    pub estimated_tokens: u32,
}

/// Calls an item needs, in execution order.
///
/// `text_only` is one synthesizer call; image and video ads get a media call
/// followed by a synthesis call on the cheaper model.
pub fn plan_calls(
    item: &AdItem,
    category: ContentCategory,
    media_model: &str,
    synthesis_model: &str,
) -> Vec<PlannedCall> {
    let synthesizer = |route: AnalysisRoute| PlannedCall {
        role: ProviderRole::Synthesizer,
        route,
        model: synthesis_model.to_string(),
        estimated_tokens: estimate_tokens(item, route),
    };
    let media = |route: AnalysisRoute| PlannedCall {
        role: ProviderRole::MediaAnalyzer,
        route,
        model: media_model.to_string(),
        estimated_tokens: estimate_tokens(item, route),
    };

    match category {
        ContentCategory::TextOnly => vec![synthesizer(AnalysisRoute::Text)],
        ContentCategory::TextWithImage => vec![
            media(AnalysisRoute::Image),
            synthesizer(AnalysisRoute::Synthesis),
        ],
        ContentCategory::TextWithVideo => vec![
            media(AnalysisRoute::Video),
            synthesizer(AnalysisRoute::Synthesis),
        ],
    }
}

/// `ceil(chars / 4)` plus media overhead plus the output budget.
pub fn estimate_tokens(item: &AdItem, route: AnalysisRoute) -> u32 {
    let chars = item_prompt(item).chars().count();
    let text_tokens = chars.div_ceil(CHARS_PER_TOKEN) as u32;
    let media_tokens = match route {
        AnalysisRoute::Image => IMAGE_TOKENS * media_urls(item, route).len().max(1) as u32,
        AnalysisRoute::Video => VIDEO_TOKENS,
        AnalysisRoute::Text | AnalysisRoute::Synthesis => 0,
    };
    text_tokens + media_tokens + OUTPUT_TOKENS
}

/// Media sent along with a media-route call.
pub fn media_urls(item: &AdItem, route: AnalysisRoute) -> Vec<String> {
    match route {
        AnalysisRoute::Image => item
            .image_urls
            .iter()
            .filter(|u| is_resolvable_image(u))
            .take(MAX_IMAGES)
            .cloned()
            .collect(),
        AnalysisRoute::Video => item
            .video_urls
            .iter()
            .filter(|u| is_playable_video(u))
            .take(MAX_VIDEOS)
            .cloned()
            .collect(),
        AnalysisRoute::Text | AnalysisRoute::Synthesis => Vec::new(),
    }
}

/// The ad as the models see it.
pub fn item_prompt(item: &AdItem) -> String {
    let mut prompt = format!("Ad text:\n{}", item.text.trim());
    if let Some(page) = &item.page_name {
        prompt.push_str(&format!("\n\nAdvertiser: {}", page));
    }
    if let Some(cta) = &item.cta_text {
        prompt.push_str(&format!("\nCall to action: {}", cta));
    }
    prompt
}

/// Request for `call`, given the responses of the calls before it.
pub fn build_request(item: &AdItem, call: &PlannedCall, earlier: &[ProviderResponse]) -> AnalysisRequest {
    let mut content = item_prompt(item);
    if call.route == AnalysisRoute::Synthesis {
        if let Some(media) = earlier.first() {
            content.push_str("\n\nCreative analysis:\n");
            content.push_str(&media.analysis.to_string());
        }
    }
    AnalysisRequest {
        route: call.route,
        content,
        media_urls: media_urls(item, call.route),
    }
}
