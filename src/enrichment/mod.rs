mod lastfm;

use async_trait::async_trait;
use std::time::Duration;

pub use lastfm::LastFmClient;

/// Result type for trivia enrichment lookups
pub type TriviaResult<T> = Result<T, TriviaError>;

/// Errors that can occur while talking to a trivia source
#[derive(Debug, thiserror::Error)]
pub enum TriviaError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// External source of genre tags and similar artists.
///
/// Failures are never fatal: the generator drops the affected question
/// families for that call.
#[async_trait]
pub trait TriviaSource: Send + Sync {
    /// Genre/style tags for a track, most relevant first
    async fn track_tags(&self, artist: &str, track: &str) -> TriviaResult<Vec<String>>;

    /// Artists similar to `artist`, most similar first
    async fn similar_artists(&self, artist: &str, limit: usize) -> TriviaResult<Vec<String>>;

    /// Name of this source, for logging
    fn name(&self) -> &str;
}

/// Configuration for the trivia source
#[derive(Debug, Clone)]
pub struct TriviaConfig {
    /// Last.fm API key; no key means no enrichment
    pub lastfm_api_key: Option<String>,
    pub lastfm_base_url: String,
    pub timeout: Duration,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            lastfm_api_key: None,
            lastfm_base_url: lastfm::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl TriviaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let lastfm_api_key = std::env::var("LASTFM_API_KEY").ok().and_then(|key| {
            let trimmed = key.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        let lastfm_base_url = std::env::var("LASTFM_BASE_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| lastfm::DEFAULT_BASE_URL.to_string());

        Self {
            lastfm_api_key,
            lastfm_base_url,
            timeout: std::env::var("LASTFM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(5)),
        }
    }

    /// Build the configured source
    pub fn build_source(&self) -> TriviaResult<LastFmClient> {
        let api_key = self.lastfm_api_key.clone().ok_or_else(|| {
            TriviaError::ConfigError(
                "No trivia source configured. Set LASTFM_API_KEY".to_string(),
            )
        })?;

        LastFmClient::new(api_key, self.lastfm_base_url.clone(), self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_source() {
        let config = TriviaConfig::default();
        assert!(config.lastfm_api_key.is_none());
        assert!(matches!(
            config.build_source(),
            Err(TriviaError::ConfigError(_))
        ));
    }

    #[test]
    fn test_build_source_with_key() {
        let config = TriviaConfig {
            lastfm_api_key: Some("key".to_string()),
            ..TriviaConfig::default()
        };
        let source = config.build_source().unwrap();
        assert_eq!(source.name(), "lastfm");
    }
}
