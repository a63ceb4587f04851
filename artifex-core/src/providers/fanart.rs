use std::time::Duration;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use super::{ArtworkCandidate, ArtworkProvider, int_field, str_field};

const DEFAULT_BASE_URL: &str = "http://webservice.fanart.tv/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// fanart.tv adapter. Movies resolve by TMDB (else IMDB) id, shows by TVDB
/// id; the response groups images under per-kind keys.
#[derive(Debug, Clone)]
pub struct FanartProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl FanartProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the adapter at a different host (test harnesses, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, reqwest::Error> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("api-key", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json().await?))
    }
}

fn mapping_keys(kind: ArtworkKind) -> &'static [&'static str] {
    match kind {
        ArtworkKind::Logo => &["hdmovielogo", "hdtvlogo", "clearlogo"],
        ArtworkKind::Poster => &["movieposter", "tvposter"],
        ArtworkKind::Background => &["moviebackground", "showbackground"],
    }
}

pub(crate) fn parse_fanart(data: &Value, wanted: &[ArtworkKind]) -> Vec<ArtworkCandidate> {
    let mut results = Vec::new();

    for &kind in wanted {
        for key in mapping_keys(kind) {
            let Some(entries) = data.get(*key).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let Some(url) = str_field(entry, "url") else {
                    continue;
                };
                results.push(ArtworkCandidate {
                    source: ArtworkSource::Fanart,
                    artwork_kind: kind,
                    thumbnail_url: Some(url.clone()),
                    image_url: url,
                    language: str_field(entry, "lang"),
                    score: int_field(entry, "likes"),
                    set_name: None,
                    creator: None,
                });
            }
        }
    }

    results
}

#[async_trait]
impl ArtworkProvider for FanartProvider {
    fn name(&self) -> ArtworkSource {
        ArtworkSource::Fanart
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn fetch(
        &self,
        media_kind: MediaKind,
        external_ids: &ExternalIds,
        wanted: &[ArtworkKind],
    ) -> Vec<ArtworkCandidate> {
        if !self.is_configured() {
            return Vec::new();
        }

        let (endpoint, resource_id) = match media_kind {
            MediaKind::Movie => (
                "movies",
                external_ids.tmdb.clone().or_else(|| external_ids.imdb.clone()),
            ),
            MediaKind::Show => ("tv", external_ids.tvdb.clone()),
            _ => return Vec::new(),
        };

        let Some(resource_id) = resource_id else {
            debug!(?media_kind, "missing id for fanart.tv lookup");
            return Vec::new();
        };

        match self.get(&format!("/{endpoint}/{resource_id}")).await {
            Ok(Some(data)) => parse_fanart(&data, wanted),
            Ok(None) => {
                debug!(resource_id, "no artwork on fanart.tv");
                Vec::new()
            }
            Err(err) => {
                error!("fanart.tv request failed: {err}");
                Vec::new()
            }
        }
    }

    async fn probe(&self) -> bool {
        if !self.is_configured() {
            return false;
        }
        // The Matrix; a stable, always-present record.
        self.get("/movies/603").await.is_ok_and(|data| data.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_maps_kind_keys_and_likes() {
        let data = json!({
            "movieposter": [
                {"url": "https://assets.fanart.tv/p1.jpg", "lang": "en", "likes": "12"},
                {"url": "", "likes": "99"},
            ],
            "moviebackground": [
                {"url": "https://assets.fanart.tv/b1.jpg", "likes": 3},
            ],
            "hdmovielogo": [
                {"url": "https://assets.fanart.tv/l1.png", "lang": "en", "likes": "7"},
            ],
        });

        let posters = parse_fanart(&data, &[ArtworkKind::Poster]);
        assert_eq!(posters.len(), 1, "entries without a url are skipped");
        assert_eq!(posters[0].score, 12);
        assert_eq!(posters[0].language.as_deref(), Some("en"));

        let all = parse_fanart(
            &data,
            &[ArtworkKind::Poster, ArtworkKind::Background, ArtworkKind::Logo],
        );
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|c| c.artwork_kind == ArtworkKind::Logo));
    }

    #[tokio::test]
    async fn unconfigured_provider_returns_nothing() {
        let provider = FanartProvider::new("");
        assert!(!provider.is_configured());
        let ids = ExternalIds {
            tmdb: Some("603".to_string()),
            ..Default::default()
        };
        assert!(
            provider
                .fetch(MediaKind::Movie, &ids, &[ArtworkKind::Poster])
                .await
                .is_empty()
        );
    }
}
