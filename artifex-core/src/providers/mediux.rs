use std::time::Duration;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, warn};

use super::{ArtworkCandidate, ArtworkProvider, str_field};

const DEFAULT_BASE_URL: &str = "https://staged.mediux.io/graphql";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Mediux adapter (GraphQL). Items are addressed as `tmdb-{id}` and images
/// are grouped into curator sets whose files carry a `file_type`.
#[derive(Debug, Clone)]
pub struct MediuxProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl MediuxProvider {
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

    /// Asset URLs hang off the GraphQL host.
    fn asset_base(&self) -> String {
        self.base_url.trim_end_matches("/graphql").to_string()
    }

    fn build_query(media_kind: MediaKind) -> String {
        let (root_field, set_field) = if media_kind == MediaKind::Show {
            ("shows_by_id", "show_sets")
        } else {
            ("movies_by_id", "movie_sets")
        };

        format!(
            r#"
            query getArtwork($id: ID!) {{
                result: {root_field}(id: $id) {{
                    id
                    title
                    sets: {set_field} {{
                        id
                        name: set_title
                        user: user_created {{
                            username
                        }}
                        files {{
                            id
                            type: file_type
                        }}
                    }}
                }}
            }}
            "#
        )
    }

    async fn post_query(&self, body: Value) -> Result<Value, reqwest::Error> {
        let mut request = self
            .http
            .post(&self.base_url)
            .json(&body)
            .timeout(REQUEST_TIMEOUT);
        if !self.api_key.is_empty() {
            request = request.header("x-api-key", &self.api_key);
        }
        request.send().await?.error_for_status()?.json().await
    }
}

fn file_type_kind(file_type: &str) -> Option<ArtworkKind> {
    match file_type {
        "poster" => Some(ArtworkKind::Poster),
        "background" | "title_card" => Some(ArtworkKind::Background),
        "logo" | "clear_logo" => Some(ArtworkKind::Logo),
        _ => None,
    }
}

pub(crate) fn parse_mediux(
    data: &Value,
    asset_base: &str,
    wanted: &[ArtworkKind],
) -> Vec<ArtworkCandidate> {
    let Some(sets) = data
        .get("data")
        .and_then(|data| data.get("result"))
        .and_then(|result| result.get("sets"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for set in sets {
        let set_name = str_field(set, "name");
        let creator = set
            .get("user")
            .and_then(|user| user.get("username"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(files) = set.get("files").and_then(Value::as_array) else {
            continue;
        };
        for file in files {
            let Some(kind) = file
                .get("type")
                .and_then(Value::as_str)
                .and_then(file_type_kind)
            else {
                continue;
            };
            if !wanted.contains(&kind) {
                continue;
            }
            let Some(file_id) = str_field(file, "id") else {
                continue;
            };

            let image_url = format!("{asset_base}/assets/{file_id}");
            results.push(ArtworkCandidate {
                source: ArtworkSource::Mediux,
                artwork_kind: kind,
                thumbnail_url: Some(format!("{image_url}?width=400")),
                image_url,
                language: Some("en".to_string()),
                score: 0,
                set_name: set_name.clone(),
                creator: creator.clone(),
            });
        }
    }

    results
}

#[async_trait]
impl ArtworkProvider for MediuxProvider {
    fn name(&self) -> ArtworkSource {
        ArtworkSource::Mediux
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
        let Some(tmdb_id) = &external_ids.tmdb else {
            return Vec::new();
        };

        let body = json!({
            "query": Self::build_query(media_kind),
            "variables": { "id": format!("tmdb-{tmdb_id}") },
        });

        match self.post_query(body).await {
            Ok(data) => {
                if let Some(errors) = data.get("errors") {
                    warn!("mediux GraphQL errors: {errors}");
                    return Vec::new();
                }
                parse_mediux(&data, &self.asset_base(), wanted)
            }
            Err(err) => {
                error!("mediux request failed: {err}");
                Vec::new()
            }
        }
    }

    async fn probe(&self) -> bool {
        let body = json!({ "query": "query { __typename }" });
        self.post_query(body).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn files_map_through_set_metadata() {
        let data = json!({
            "data": {
                "result": {
                    "id": "tmdb-603",
                    "title": "The Matrix",
                    "sets": [
                        {
                            "name": "Minimalist",
                            "user": {"username": "curator"},
                            "files": [
                                {"id": "f1", "type": "poster"},
                                {"id": "f2", "type": "title_card"},
                                {"id": "f3", "type": "clear_logo"},
                                {"id": "f4", "type": "album"},
                            ]
                        }
                    ]
                }
            }
        });

        let all = parse_mediux(
            &data,
            "https://staged.mediux.io",
            &[ArtworkKind::Poster, ArtworkKind::Background, ArtworkKind::Logo],
        );
        assert_eq!(all.len(), 3, "unknown file types are dropped");
        assert_eq!(all[0].image_url, "https://staged.mediux.io/assets/f1");
        assert_eq!(all[0].set_name.as_deref(), Some("Minimalist"));
        assert_eq!(all[0].creator.as_deref(), Some("curator"));
        assert_eq!(all[1].artwork_kind, ArtworkKind::Background);
        assert_eq!(all[2].artwork_kind, ArtworkKind::Logo);

        let posters = parse_mediux(&data, "https://staged.mediux.io", &[ArtworkKind::Poster]);
        assert_eq!(posters.len(), 1);
    }

    #[test]
    fn missing_result_yields_empty() {
        assert!(parse_mediux(&json!({"data": {"result": null}}), "b", &[ArtworkKind::Poster]).is_empty());
    }
}
