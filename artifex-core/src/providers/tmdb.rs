use std::time::Duration;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use super::{ArtworkCandidate, ArtworkProvider};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const FALLBACK_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// TMDB adapter. Resolves foreign ids through `/find` when no TMDB id is
/// present and caches the image base URL for the life of the instance.
#[derive(Debug)]
pub struct TmdbProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    image_base: OnceCell<String>,
}

impl TmdbProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
            image_base: OnceCell::new(),
        }
    }

    /// Point the adapter at a different host (test harnesses, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn image_base_url(&self) -> &str {
        self.image_base
            .get_or_init(|| async {
                match self.fetch_configuration().await {
                    Some(base_url) => base_url,
                    None => {
                        warn!("falling back to default TMDB image base URL");
                        FALLBACK_IMAGE_BASE.to_string()
                    }
                }
            })
            .await
    }

    async fn fetch_configuration(&self) -> Option<String> {
        let response = self
            .http
            .get(format!("{}/configuration", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let body: Value = response.json().await.ok()?;
        body.get("images")
            .and_then(|images| images.get("secure_base_url"))
            .and_then(Value::as_str)
            .filter(|base| !base.is_empty())
            .map(str::to_string)
    }

    /// Resolve a foreign id to a TMDB id via `/find/{id}`.
    async fn find_tmdb_id(&self, external_id: &str, external_source: &str) -> Option<String> {
        let response = self
            .http
            .get(format!("{}/find/{external_id}", self.base_url))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("external_source", external_source),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        let body: Value = response.json().await.ok()?;

        for results_key in ["movie_results", "tv_results"] {
            if let Some(first) = body
                .get(results_key)
                .and_then(Value::as_array)
                .and_then(|results| results.first())
                && let Some(id) = first.get("id").and_then(Value::as_i64)
            {
                return Some(id.to_string());
            }
        }
        None
    }

    async fn resolve_id(&self, media_kind: MediaKind, external_ids: &ExternalIds) -> Option<String> {
        if let Some(tmdb) = &external_ids.tmdb {
            return Some(tmdb.clone());
        }
        if let Some(imdb) = &external_ids.imdb
            && let Some(found) = self.find_tmdb_id(imdb, "imdb_id").await
        {
            return Some(found);
        }
        if media_kind == MediaKind::Show
            && let Some(tvdb) = &external_ids.tvdb
        {
            return self.find_tmdb_id(tvdb, "tvdb_id").await;
        }
        None
    }
}

fn images_key(kind: ArtworkKind) -> &'static str {
    match kind {
        ArtworkKind::Poster => "posters",
        ArtworkKind::Background => "backdrops",
        ArtworkKind::Logo => "logos",
    }
}

pub(crate) fn parse_tmdb(data: &Value, base_url: &str, wanted: &[ArtworkKind]) -> Vec<ArtworkCandidate> {
    let mut results = Vec::new();

    for &kind in wanted {
        let Some(entries) = data.get(images_key(kind)).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(file_path) = entry.get("file_path").and_then(Value::as_str) else {
                continue;
            };
            let vote_average = entry
                .get("vote_average")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            results.push(ArtworkCandidate {
                source: ArtworkSource::Tmdb,
                artwork_kind: kind,
                image_url: format!("{base_url}original{file_path}"),
                thumbnail_url: Some(format!("{base_url}w500{file_path}")),
                language: entry
                    .get("iso_639_1")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                score: (vote_average * 10.0).round() as i64,
                set_name: None,
                creator: None,
            });
        }
    }

    results
}

#[async_trait]
impl ArtworkProvider for TmdbProvider {
    fn name(&self) -> ArtworkSource {
        ArtworkSource::Tmdb
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

        let Some(tmdb_id) = self.resolve_id(media_kind, external_ids).await else {
            debug!(?media_kind, "no TMDB id resolvable for lookup");
            return Vec::new();
        };

        let endpoint = if media_kind == MediaKind::Movie {
            "movie"
        } else {
            "tv"
        };
        let base_image_url = self.image_base_url().await.to_string();

        let response = self
            .http
            .get(format!("{}/{endpoint}/{tmdb_id}/images", self.base_url))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("include_image_language", "en,null"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().as_u16() == 404 => return Vec::new(),
            Ok(response) => match response.error_for_status() {
                Ok(response) => response,
                Err(err) => {
                    error!("TMDB request failed: {err}");
                    return Vec::new();
                }
            },
            Err(err) => {
                error!("TMDB request failed: {err}");
                return Vec::new();
            }
        };

        match response.json::<Value>().await {
            Ok(data) => parse_tmdb(&data, &base_image_url, wanted),
            Err(err) => {
                error!("TMDB payload decode failed: {err}");
                Vec::new()
            }
        }
    }

    async fn probe(&self) -> bool {
        if !self.is_configured() {
            return false;
        }
        self.fetch_configuration().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn score_is_vote_average_times_ten() {
        let data = json!({
            "posters": [
                {"file_path": "/p.jpg", "vote_average": 8.5, "iso_639_1": "en"},
            ],
            "backdrops": [
                {"file_path": "/b.jpg", "vote_average": 7.26},
            ],
        });

        let posters = parse_tmdb(&data, "https://img.test/", &[ArtworkKind::Poster]);
        assert_eq!(posters.len(), 1);
        assert_eq!(posters[0].score, 85);
        assert_eq!(posters[0].image_url, "https://img.test/original/p.jpg");
        assert_eq!(
            posters[0].thumbnail_url.as_deref(),
            Some("https://img.test/w500/p.jpg")
        );

        let backgrounds = parse_tmdb(&data, "https://img.test/", &[ArtworkKind::Background]);
        assert_eq!(backgrounds[0].score, 73);
    }

    #[test]
    fn entries_without_file_path_are_skipped() {
        let data = json!({"posters": [{"vote_average": 9.0}]});
        assert!(parse_tmdb(&data, "b/", &[ArtworkKind::Poster]).is_empty());
    }
}
