use std::time::Duration;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::{ArtworkCandidate, ArtworkProvider, str_field};

const DEFAULT_BASE_URL: &str = "https://api4.thetvdb.com/v4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_TTL_HOURS: i64 = 24;

/// TVDB v4 adapter. Authenticates with `/login` for a JWT that is cached
/// for a day, then reads artwork off the extended entity record.
#[derive(Debug)]
pub struct TvdbProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    token: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl TvdbProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Point the adapter at a different host (test harnesses, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn bearer_token(&self) -> Option<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref()
            && Utc::now() < *expires_at
        {
            return Some(token.clone());
        }

        let response = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&json!({ "apikey": self.api_key }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        let body: Value = match response {
            Ok(response) => match response.json().await {
                Ok(body) => body,
                Err(err) => {
                    error!("TVDB login decode failed: {err}");
                    return None;
                }
            },
            Err(err) => {
                error!("failed to authenticate with TVDB: {err}");
                return None;
            }
        };

        let token = body
            .get("data")
            .and_then(|data| data.get("token"))
            .and_then(Value::as_str)?
            .to_string();
        *cached = Some((
            token.clone(),
            Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS),
        ));
        Some(token)
    }
}

fn artwork_kind_for_type(type_id: i64) -> Option<ArtworkKind> {
    match type_id {
        3 => Some(ArtworkKind::Poster),
        4 => Some(ArtworkKind::Background),
        22 | 23 => Some(ArtworkKind::Logo),
        _ => None,
    }
}

pub(crate) fn parse_tvdb(data: &Value, wanted: &[ArtworkKind]) -> Vec<ArtworkCandidate> {
    let Some(artworks) = data
        .get("data")
        .and_then(|data| data.get("artworks"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    artworks
        .iter()
        .filter_map(|entry| {
            let type_id = entry.get("type").and_then(Value::as_i64)?;
            let kind = artwork_kind_for_type(type_id)?;
            if !wanted.contains(&kind) {
                return None;
            }
            let image_url = str_field(entry, "image")?;
            Some(ArtworkCandidate {
                source: ArtworkSource::Tvdb,
                artwork_kind: kind,
                image_url,
                thumbnail_url: str_field(entry, "thumbnail"),
                language: str_field(entry, "language"),
                score: entry.get("score").and_then(Value::as_i64).unwrap_or(0),
                set_name: None,
                creator: None,
            })
        })
        .collect()
}

#[async_trait]
impl ArtworkProvider for TvdbProvider {
    fn name(&self) -> ArtworkSource {
        ArtworkSource::Tvdb
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

        let endpoint = match media_kind {
            MediaKind::Show => "series",
            MediaKind::Movie => "movies",
            _ => return Vec::new(),
        };
        let Some(tvdb_id) = &external_ids.tvdb else {
            debug!(?media_kind, "missing TVDB id for lookup");
            return Vec::new();
        };
        let Some(token) = self.bearer_token().await else {
            return Vec::new();
        };

        let response = self
            .http
            .get(format!("{}/{endpoint}/{tvdb_id}/extended", self.base_url))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().as_u16() == 404 => return Vec::new(),
            Ok(response) => match response.error_for_status() {
                Ok(response) => response,
                Err(err) => {
                    error!("TVDB request failed: {err}");
                    return Vec::new();
                }
            },
            Err(err) => {
                error!("TVDB request failed: {err}");
                return Vec::new();
            }
        };

        match response.json::<Value>().await {
            Ok(data) => parse_tvdb(&data, wanted),
            Err(err) => {
                error!("TVDB payload decode failed: {err}");
                Vec::new()
            }
        }
    }

    async fn probe(&self) -> bool {
        self.is_configured() && self.bearer_token().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artwork_type_ids_map_to_kinds() {
        let data = json!({
            "data": {
                "artworks": [
                    {"type": 3, "image": "https://tvdb.test/p.jpg", "score": 100005, "language": "eng"},
                    {"type": 4, "image": "https://tvdb.test/b.jpg", "score": 9, "thumbnail": "https://tvdb.test/b_t.jpg"},
                    {"type": 22, "image": "https://tvdb.test/l.png", "score": 1},
                    {"type": 5, "image": "https://tvdb.test/season.jpg", "score": 50},
                    {"type": 3, "score": 7},
                ]
            }
        });

        let all = parse_tvdb(
            &data,
            &[ArtworkKind::Poster, ArtworkKind::Background, ArtworkKind::Logo],
        );
        assert_eq!(all.len(), 3, "unmapped types and missing images are dropped");
        assert_eq!(all[0].artwork_kind, ArtworkKind::Poster);
        assert_eq!(all[0].score, 100005);
        assert_eq!(all[1].thumbnail_url.as_deref(), Some("https://tvdb.test/b_t.jpg"));

        let posters_only = parse_tvdb(&data, &[ArtworkKind::Poster]);
        assert_eq!(posters_only.len(), 1);
    }

    #[test]
    fn missing_artworks_field_yields_empty() {
        assert!(parse_tvdb(&json!({"data": {}}), &[ArtworkKind::Poster]).is_empty());
        assert!(parse_tvdb(&json!({}), &[ArtworkKind::Poster]).is_empty());
    }
}
