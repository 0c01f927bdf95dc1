use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::kernel::{DEFAULT_ADS_ACTOR, GPT_4O_MINI, LLAMA_3_1_8B};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub apify_api_token: String,
    pub apify_ads_actor: String,
    pub openai_api_key: String,
    /// When absent the synthesizer runs on OpenAI as well.
    pub groq_api_key: Option<String>,
    pub media_model: String,
    pub synthesis_model: String,
    pub allow_fallback: bool,
    /// None means derive from the tightest RPM in use.
    pub item_spacing: Option<Duration>,
    pub backoff_base: Duration,
    pub scrape_region: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let groq_api_key = env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let default_synthesis_model = if groq_api_key.is_some() {
            LLAMA_3_1_8B
        } else {
            GPT_4O_MINI
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            apify_api_token: env::var("APIFY_API_TOKEN").context("APIFY_API_TOKEN must be set")?,
            apify_ads_actor: env::var("APIFY_ADS_ACTOR")
                .unwrap_or_else(|_| DEFAULT_ADS_ACTOR.to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            groq_api_key,
            media_model: env::var("MEDIA_MODEL").unwrap_or_else(|_| GPT_4O_MINI.to_string()),
            synthesis_model: env::var("SYNTHESIS_MODEL")
                .unwrap_or_else(|_| default_synthesis_model.to_string()),
            allow_fallback: parse_bool(env::var("ANALYSIS_ALLOW_FALLBACK").ok(), true)
                .context("ANALYSIS_ALLOW_FALLBACK must be true or false")?,
            item_spacing: env::var("ANALYSIS_ITEM_SPACING_MS")
                .ok()
                .map(|v| v.parse::<u64>().map(Duration::from_millis))
                .transpose()
                .context("ANALYSIS_ITEM_SPACING_MS must be a number of milliseconds")?,
            backoff_base: Duration::from_millis(
                env::var("ANALYSIS_BACKOFF_BASE_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .context("ANALYSIS_BACKOFF_BASE_MS must be a number of milliseconds")?,
            ),
            scrape_region: env::var("SCRAPE_REGION").unwrap_or_else(|_| "US".to_string()),
        })
    }

    /// Only the database is needed for the admin subcommands.
    pub fn database_url_from_env() -> Result<String> {
        let _ = dotenv();
        env::var("DATABASE_URL").context("DATABASE_URL must be set")
    }
}

fn parse_bool(raw: Option<String>, default: bool) -> Result<bool> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("unrecognized boolean '{}'", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans() {
        assert!(parse_bool(None, true).unwrap());
        assert!(!parse_bool(Some("FALSE".into()), true).unwrap());
        assert!(parse_bool(Some(" yes ".into()), false).unwrap());
        assert!(parse_bool(Some("".into()), true).unwrap());
        assert!(parse_bool(Some("maybe".into()), true).is_err());
    }
}
