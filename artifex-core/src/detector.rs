//! Per-item artwork defect rules.
//!
//! Placeholder detection judges an image by its aspect ratio: a landscape
//! "poster" is almost always a video frame the server grabbed as a stand-in,
//! and a portrait "background" is a poster stuffed into the wrong slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artifex_model::{DefectKind, ExternalIds, MediaKind, ScanConfig};
use image::GenericImageView;
use serde_json::json;
use tracing::{debug, warn};

use crate::media_server::{MediaItem, MediaServerClient};

/// Standard poster aspect ratio is 2:3.
const POSTER_ASPECT_RATIO: f64 = 2.0 / 3.0;
const ASPECT_RATIO_TOLERANCE: f64 = 0.15;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A defect detected on one media item.
#[derive(Debug, Clone)]
pub struct ArtworkIssue {
    pub defect: DefectKind,
    pub item_key: String,
    pub item_guid: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub media_kind: MediaKind,
    pub library: String,
    pub external_ids: ExternalIds,
    pub details: Option<serde_json::Value>,
}

impl ArtworkIssue {
    fn new(item: &MediaItem, defect: DefectKind, details: Option<serde_json::Value>) -> Self {
        Self {
            defect,
            item_key: item.key.clone(),
            item_guid: item.guid.clone(),
            title: item.title.clone(),
            year: item.year,
            media_kind: item.kind,
            library: item.library.clone(),
            external_ids: item.external_ids(),
            details,
        }
    }
}

/// `true` when a poster's aspect ratio betrays a placeholder.
pub fn poster_ratio_is_placeholder(ratio: f64) -> bool {
    // Landscape means a video frame, not a poster.
    if ratio > 1.0 {
        return true;
    }

    let min_valid = POSTER_ASPECT_RATIO * (1.0 - ASPECT_RATIO_TOLERANCE);
    let max_valid = POSTER_ASPECT_RATIO * (1.0 + ASPECT_RATIO_TOLERANCE);
    if (min_valid..=max_valid).contains(&ratio) {
        return false;
    }

    // Outside the band but still portrait: only flag the clearly wrong.
    ratio > 0.9 || ratio < 0.4
}

/// `true` when a background's aspect ratio betrays a placeholder. Anything
/// narrower than 1.2 is either portrait or a stretched poster.
pub fn background_ratio_is_placeholder(ratio: f64) -> bool {
    ratio < 1.2
}

/// Applies the enabled defect rules to one item at a time.
pub struct ArtworkInspector {
    client: Arc<MediaServerClient>,
    http: reqwest::Client,
    check_posters: bool,
    check_backgrounds: bool,
    check_unmatched: bool,
    check_placeholders: bool,
    /// Aspect ratio per image path; each URL is fetched at most once per
    /// inspector (one inspector lives for one scan).
    ratio_cache: Mutex<HashMap<String, f64>>,
}

impl ArtworkInspector {
    pub fn new(client: Arc<MediaServerClient>, config: &ScanConfig) -> Self {
        if config.check_logos {
            // Logo presence is not observable on items, so the flag is
            // accepted without producing any defect.
            debug!("logo checks enabled; item listings do not expose logos, nothing will be emitted");
        }

        Self {
            client,
            http: reqwest::Client::new(),
            check_posters: config.check_posters,
            check_backgrounds: config.check_backgrounds,
            check_unmatched: config.check_unmatched,
            check_placeholders: config.check_placeholders,
            ratio_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run the rules against one item, in order. An unmatched item
    /// short-circuits: artwork cannot be fixed without an identity.
    pub async fn scan_item(&self, item: &MediaItem) -> Vec<ArtworkIssue> {
        let mut issues = Vec::new();

        if self.check_unmatched && !item.is_matched() {
            issues.push(ArtworkIssue::new(item, DefectKind::NoMatch, None));
            return issues;
        }

        if self.check_posters && !item.has_poster() {
            issues.push(ArtworkIssue::new(item, DefectKind::NoPoster, None));
        }

        if self.check_backgrounds && !item.has_background() {
            issues.push(ArtworkIssue::new(item, DefectKind::NoBackground, None));
        }

        if self.check_placeholders && item.has_poster() {
            let thumb = item.thumb.as_deref().unwrap_or_default();
            if let Some(ratio) = self.image_aspect_ratio(thumb).await
                && poster_ratio_is_placeholder(ratio)
            {
                issues.push(ArtworkIssue::new(
                    item,
                    DefectKind::PlaceholderPoster,
                    Some(json!({ "detected_aspect_ratio": ratio })),
                ));
            }
        }

        if self.check_placeholders && item.has_background() {
            let art = item.art.as_deref().unwrap_or_default();
            if let Some(ratio) = self.image_aspect_ratio(art).await
                && background_ratio_is_placeholder(ratio)
            {
                issues.push(ArtworkIssue::new(
                    item,
                    DefectKind::PlaceholderBackground,
                    Some(json!({ "detected_aspect_ratio": ratio })),
                ));
            }
        }

        issues
    }

    /// Fetch an image and compute width/height. `None` on any fetch or
    /// decode failure, which suppresses placeholder flagging so transient
    /// errors never produce false positives.
    async fn image_aspect_ratio(&self, image_path: &str) -> Option<f64> {
        if let Some(ratio) = self.ratio_cache.lock().unwrap().get(image_path) {
            return Some(*ratio);
        }

        let url = self.client.image_url(image_path);
        let bytes = match self
            .http
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
        {
            Ok(response) => match response.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("failed to read image {image_path}: {err}");
                    return None;
                }
            },
            Err(err) => {
                warn!("failed to fetch image {image_path}: {err}");
                return None;
            }
        };

        let (width, height) = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded.dimensions(),
            Err(err) => {
                warn!("failed to decode image {image_path}: {err}");
                return None;
            }
        };
        if height == 0 {
            return None;
        }

        let ratio = f64::from(width) / f64::from(height);
        self.ratio_cache
            .lock()
            .unwrap()
            .insert(image_path.to_string(), ratio);
        Some(ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_poster_is_placeholder() {
        assert!(poster_ratio_is_placeholder(1920.0 / 1080.0));
        assert!(poster_ratio_is_placeholder(1.01));
    }

    #[test]
    fn standard_poster_ratio_is_accepted() {
        assert!(!poster_ratio_is_placeholder(2.0 / 3.0));
        assert!(!poster_ratio_is_placeholder(0.68));
        // Edges of the ±15% band.
        assert!(!poster_ratio_is_placeholder(POSTER_ASPECT_RATIO * 0.86));
        assert!(!poster_ratio_is_placeholder(POSTER_ASPECT_RATIO * 1.14));
    }

    #[test]
    fn odd_portrait_ratios_only_flag_when_clearly_wrong() {
        assert!(poster_ratio_is_placeholder(0.95));
        assert!(poster_ratio_is_placeholder(0.35));
        // Non-standard but plausible portrait stays unflagged.
        assert!(!poster_ratio_is_placeholder(0.55));
        assert!(!poster_ratio_is_placeholder(0.85));
    }

    #[test]
    fn background_must_be_wide() {
        assert!(background_ratio_is_placeholder(0.667));
        assert!(background_ratio_is_placeholder(1.0));
        assert!(background_ratio_is_placeholder(1.19));
        assert!(!background_ratio_is_placeholder(16.0 / 9.0));
        assert!(!background_ratio_is_placeholder(1.2));
    }
}
