//! OpenAI-compatible analysis provider.
//!
//! Serves both roles: the media analyzer (OpenAI vision models) and the
//! strategic synthesizer (Groq or OpenAI text models). Every route asks for a
//! single JSON object back.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use tracing::debug;

use super::traits::{AnalysisRequest, AnalysisRoute, BaseAnalysisProvider, ProviderError, ProviderResponse};

const MAX_OUTPUT_TOKENS: u32 = 600;

const TEXT_SYSTEM_PROMPT: &str = r#"You are a performance marketing analyst reviewing a competitor's ad.
Respond with a JSON object with exactly these keys:
"summary" (string, one or two sentences),
"key_insights" (array of short strings: hooks, offers, audience, tone),
"rewritten_copy" (string, an improved version of the ad text),
"strategic_notes" (array of short strings: how to compete with this ad)."#;

const IMAGE_SYSTEM_PROMPT: &str = r#"You are a creative director reviewing the images of an ad.
Respond with a JSON object with exactly these keys:
"visual_summary" (string), "creative_elements" (array of strings),
"hook" (string, what grabs attention first), "brand_signals" (array of strings)."#;

const VIDEO_SYSTEM_PROMPT: &str = r#"You are a creative director reviewing a video ad from its copy and video links.
Respond with a JSON object with exactly these keys:
"visual_summary" (string, likely format and pacing), "creative_elements" (array of strings),
"hook" (string, likely opening hook), "brand_signals" (array of strings)."#;

const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are a performance marketing strategist.
You get an ad's text and a creative analysis of its media.
Respond with a JSON object with exactly these keys:
"summary" (string), "key_insights" (array of strings),
"rewritten_copy" (string), "strategic_notes" (array of strings)."#;

pub struct OpenAiAnalysisAdapter {
    client: OpenAIClient,
    name: String,
}

impl OpenAiAnalysisAdapter {
    /// `name` is the rate-limit bucket prefix, e.g. "openai" or "groq".
    pub fn new(client: OpenAIClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl BaseAnalysisProvider for OpenAiAnalysisAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        model: &str,
        request: &AnalysisRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let chat = build_chat_request(model, request);
        let response = self.client.chat_completion(chat).await.map_err(provider_error)?;

        let analysis = parse_json_object(&response.content)?;
        let tokens_used = response.usage.map(|u| u.total_tokens);
        debug!(provider = %self.name, model, route = request.route.as_str(), ?tokens_used, "Analysis call finished");

        Ok(ProviderResponse {
            analysis,
            tokens_used,
        })
    }
}

fn build_chat_request(model: &str, request: &AnalysisRequest) -> ChatRequest {
    let (system, user) = match request.route {
        AnalysisRoute::Text => (TEXT_SYSTEM_PROMPT, Message::user(&request.content)),
        AnalysisRoute::Synthesis => (SYNTHESIS_SYSTEM_PROMPT, Message::user(&request.content)),
        AnalysisRoute::Image => (
            IMAGE_SYSTEM_PROMPT,
            Message::user_with_images(&request.content, &request.media_urls),
        ),
        AnalysisRoute::Video => {
            let links = request.media_urls.join("\n");
            (
                VIDEO_SYSTEM_PROMPT,
                Message::user(format!("{}\n\nVideo links:\n{}", request.content, links)),
            )
        }
    };

    ChatRequest::new(model)
        .message(Message::system(system))
        .message(user)
        .temperature(0.2)
        .max_tokens(MAX_OUTPUT_TOKENS)
        .json_mode()
}

fn provider_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Api { status, message } => ProviderError::Http { status, message },
        OpenAIError::Network(msg) => ProviderError::Network(msg),
        OpenAIError::Parse(msg) => ProviderError::Parse(msg),
        OpenAIError::Config(msg) => ProviderError::Config(msg),
    }
}

/// Parse a completion into a JSON object, tolerating a markdown code fence.
pub fn parse_json_object(content: &str) -> Result<serde_json::Value, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value =
        serde_json::from_str(unfenced).map_err(|e| ProviderError::Parse(e.to_string()))?;
    if !value.is_object() {
        return Err(ProviderError::Parse("expected a JSON object".into()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = parse_json_object(r#"{"summary":"ok"}"#).unwrap();
        assert_eq!(plain["summary"], "ok");

        let fenced = parse_json_object("```json\n{\"summary\":\"ok\"}\n```").unwrap();
        assert_eq!(fenced["summary"], "ok");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(parse_json_object("[1,2]"), Err(ProviderError::Parse(_))));
        assert!(matches!(parse_json_object("sure! here"), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn api_status_is_preserved() {
        let err = provider_error(OpenAIError::Api {
            status: 429,
            message: "rate limited".into(),
        });
        assert_eq!(err.status(), Some(429));
        assert!(err.is_retryable());
    }

    #[test]
    fn image_route_attaches_images() {
        let request = AnalysisRequest {
            route: AnalysisRoute::Image,
            content: "Ad text".into(),
            media_urls: vec!["https://img.example/a.jpg".into()],
        };
        let chat = build_chat_request("gpt-4o-mini", &request);
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(json["response_format"]["type"], "json_object");
    }
}
