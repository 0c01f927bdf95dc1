//! Pattern-based fallback analyzer.
//!
//! Used when the rate limiter blocks a provider call and fallback is enabled.
//! No network calls; output is marked `fallback: true`.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::models::AnalysisResult;
use crate::domains::ads::{AdItem, ContentCategory};

lazy_static! {
    // "30% off", "$19.99", "€5", "free shipping", "buy one get one"
    static ref OFFER_REGEX: Regex = Regex::new(
        r"(?i)(\d{1,3}\s?%\s?off|[$€£]\s?\d+(?:[.,]\d{2})?|\bfree (shipping|trial|gift)\b|\bbogo\b|\bbuy one get one\b|\bdiscount\b|\bsale\b)"
    ).unwrap();

    static ref URGENCY_REGEX: Regex = Regex::new(
        r"(?i)\b(today only|limited time|ends (tonight|soon|today)|last chance|hurry|while supplies last|don'?t miss|now or never|only \d+ left)\b"
    ).unwrap();

    static ref SOCIAL_PROOF_REGEX: Regex = Regex::new(
        r"(?i)(\b\d[\d,.]*\s?(k|m)?\+?\s(customers|users|reviews|people|members|sold)\b|\b(best[- ]?seller|top[- ]rated|award[- ]winning|trusted by|as seen on)\b|★|\b\d(\.\d)?\s?stars?\b)"
    ).unwrap();

    static ref CTA_REGEX: Regex = Regex::new(
        r"(?i)\b(shop now|buy now|order now|sign up|learn more|get started|book now|download|subscribe|claim|try it|get yours|join)\b"
    ).unwrap();

    static ref EMOJI_REGEX: Regex = Regex::new(
        r"[\x{1F300}-\x{1FAFF}\x{2600}-\x{27BF}]"
    ).unwrap();

    static ref SENTENCE_END_REGEX: Regex = Regex::new(r"[.!?](\s|$)").unwrap();
}

/// Signals found in the ad copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySignals {
    pub offer: Option<String>,
    pub urgency: bool,
    pub social_proof: bool,
    pub question: bool,
    pub call_to_action: Option<String>,
    pub emoji_count: usize,
    pub word_count: usize,
}

impl CopySignals {
    pub fn detect(item: &AdItem) -> Self {
        let text = item.text.as_str();
        let call_to_action = item
            .cta_text
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .or_else(|| CTA_REGEX.find(text).map(|m| m.as_str().to_string()));

        Self {
            offer: OFFER_REGEX.find(text).map(|m| m.as_str().to_string()),
            urgency: URGENCY_REGEX.is_match(text),
            social_proof: SOCIAL_PROOF_REGEX.is_match(text),
            question: text.contains('?'),
            call_to_action,
            emoji_count: EMOJI_REGEX.find_iter(text).count(),
            word_count: text.split_whitespace().count(),
        }
    }

    /// More than one emoji per ten words.
    pub fn emoji_heavy(&self) -> bool {
        self.emoji_count > 0 && self.emoji_count * 10 > self.word_count.max(1)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAnalyzer;

impl FallbackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(
        &self,
        item: &AdItem,
        category: ContentCategory,
        media_analysis: Option<JsonValue>,
    ) -> AnalysisResult {
        let signals = CopySignals::detect(item);

        AnalysisResult {
            summary: summary(item, category, &signals),
            key_insights: key_insights(&signals),
            rewritten_copy: rewritten_copy(item, &signals),
            strategic_notes: strategic_notes(category, &signals),
            media_analysis,
            fallback: true,
        }
    }
}

fn summary(item: &AdItem, category: ContentCategory, signals: &CopySignals) -> String {
    let advertiser = item.page_name.as_deref().unwrap_or("Unknown advertiser");
    if !item.has_text() {
        return format!("{} ad with no copy ({}).", advertiser, category);
    }

    let angle = match (&signals.offer, signals.urgency) {
        (Some(_), true) => "time-limited offer",
        (Some(_), false) => "offer-led",
        (None, true) => "urgency-led",
        (None, false) if signals.social_proof => "social-proof",
        (None, false) => "brand/informational",
    };
    format!(
        "{} runs a {} {} ad ({} words).",
        advertiser,
        angle,
        category.as_str().replace('_', " "),
        signals.word_count
    )
}

fn key_insights(signals: &CopySignals) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(offer) = &signals.offer {
        insights.push(format!("Leads with an offer: \"{}\"", offer));
    }
    if signals.urgency {
        insights.push("Uses urgency language".to_string());
    }
    if signals.social_proof {
        insights.push("Cites social proof".to_string());
    }
    if signals.question {
        insights.push("Opens a question to the reader".to_string());
    }
    match &signals.call_to_action {
        Some(cta) => insights.push(format!("Call to action: \"{}\"", cta)),
        None => insights.push("No explicit call to action".to_string()),
    }
    if signals.emoji_heavy() {
        insights.push(format!("Emoji-heavy copy ({} emoji)", signals.emoji_count));
    }
    insights
}

fn rewritten_copy(item: &AdItem, signals: &CopySignals) -> Option<String> {
    let text = item.text.trim();
    if text.is_empty() {
        return None;
    }
    let first_sentence = match SENTENCE_END_REGEX.find(text) {
        Some(end) => &text[..end.start() + 1],
        None => text,
    };
    let cta = signals.call_to_action.as_deref().unwrap_or("Learn more");
    Some(format!("{} {}.", first_sentence.trim(), cta.trim_end_matches('.')))
}

fn strategic_notes(category: ContentCategory, signals: &CopySignals) -> Vec<String> {
    let mut notes = Vec::new();
    match category {
        ContentCategory::TextOnly => {
            notes.push("Text-only creative: test an image variant against it".to_string())
        }
        ContentCategory::TextWithImage => {
            notes.push("Keep the headline readable on the image at feed size".to_string())
        }
        ContentCategory::TextWithVideo => {
            notes.push("Land the hook in the first three seconds of the video".to_string())
        }
    }
    if signals.offer.is_none() {
        notes.push("No concrete offer detected: consider a price or discount anchor".to_string());
    }
    if !signals.social_proof {
        notes.push("Add a proof point such as reviews or customer counts".to_string());
    }
    if signals.call_to_action.is_none() {
        notes.push("Close with a single clear call to action".to_string());
    }
    notes
}
