use super::*;
use serde::Deserialize;
use std::time::Instant;

pub const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Last.fm backed trivia source
pub struct LastFmClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl LastFmClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> TriviaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriviaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url,
            timeout,
            client,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> TriviaResult<T> {
        let start = Instant::now();

        let mut query: Vec<(&str, &str)> = vec![
            ("method", method),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("autocorrect", "1"),
        ];
        query.extend_from_slice(params);

        let response = tokio::time::timeout(
            self.timeout,
            self.client.get(&self.base_url).query(&query).send(),
        )
        .await
        .map_err(|_| TriviaError::Timeout(self.timeout))?
        .map_err(|e| TriviaError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TriviaError::ApiError(format!(
                "Last.fm API returned status: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TriviaError::ParseError(e.to_string()))?;

        if let Some(code) = body.get("error") {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(TriviaError::ApiError(format!(
                "Last.fm error {}: {}",
                code, message
            )));
        }

        tracing::debug!(
            "Last.fm {} answered in {}ms",
            method,
            start.elapsed().as_millis()
        );

        serde_json::from_value(body).map_err(|e| TriviaError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: Option<TrackInfo>,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    #[serde(default)]
    toptags: Option<TagList>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default, deserialize_with = "one_or_many")]
    tag: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistsResponse {
    similarartists: Option<SimilarArtistList>,
}

#[derive(Debug, Deserialize)]
struct SimilarArtistList {
    #[serde(default, deserialize_with = "one_or_many")]
    artist: Vec<NamedEntry>,
}

/// Last.fm collapses single-element arrays into a bare object
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<NamedEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(NamedEntry),
        Many(Vec<NamedEntry>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(entry) => vec![entry],
        OneOrMany::Many(entries) => entries,
    })
}

#[async_trait]
impl TriviaSource for LastFmClient {
    async fn track_tags(&self, artist: &str, track: &str) -> TriviaResult<Vec<String>> {
        let response: TrackInfoResponse = self
            .call("track.getInfo", &[("artist", artist), ("track", track)])
            .await?;

        Ok(response
            .track
            .and_then(|t| t.toptags)
            .map(|tags| tags.tag.into_iter().map(|t| t.name).collect())
            .unwrap_or_default())
    }

    async fn similar_artists(&self, artist: &str, limit: usize) -> TriviaResult<Vec<String>> {
        let limit = limit.to_string();
        let response: SimilarArtistsResponse = self
            .call(
                "artist.getSimilar",
                &[("artist", artist), ("limit", limit.as_str())],
            )
            .await?;

        Ok(response
            .similarartists
            .map(|list| list.artist.into_iter().map(|a| a.name).collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "lastfm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_tags() {
        let json = r#"{"track":{"name":"Hotel California","toptags":{"tag":[{"name":"classic rock","url":"x"},{"name":"rock","url":"y"}]}}}"#;
        let parsed: TrackInfoResponse = serde_json::from_str(json).unwrap();
        let tags: Vec<String> = parsed
            .track
            .and_then(|t| t.toptags)
            .map(|t| t.tag.into_iter().map(|t| t.name).collect())
            .unwrap();
        assert_eq!(tags, vec!["classic rock", "rock"]);
    }

    #[test]
    fn test_parse_single_similar_artist() {
        let json = r#"{"similarartists":{"artist":{"name":"Led Zeppelin","match":"1"}}}"#;
        let parsed: SimilarArtistsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.similarartists.unwrap().artist[0].name, "Led Zeppelin");
    }

    #[tokio::test]
    #[ignore] // Only run with a real LASTFM_API_KEY
    async fn test_lastfm_similar_artists() {
        let key = std::env::var("LASTFM_API_KEY").unwrap();
        let client =
            LastFmClient::new(key, DEFAULT_BASE_URL.to_string(), Duration::from_secs(10)).unwrap();
        let similar = client.similar_artists("Queen", 5).await.unwrap();
        assert!(!similar.is_empty());
    }
}
