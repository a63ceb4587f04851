//! Artwork source adapters behind one contract.
//!
//! Failures never escape an adapter: every network or payload problem is
//! logged and surfaced as an empty candidate list so a misbehaving source
//! can never fail a scan.

mod aggregator;
mod fanart;
mod mediux;
mod tmdb;
mod tvdb;

pub use aggregator::ArtworkAggregator;
pub use fanart::FanartProvider;
pub use mediux::MediuxProvider;
pub use tmdb::TmdbProvider;
pub use tvdb::TvdbProvider;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A candidate artwork image proposed by a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ArtworkCandidate {
    pub source: ArtworkSource,
    pub artwork_kind: ArtworkKind,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub language: Option<String>,
    pub score: i64,
    pub set_name: Option<String>,
    pub creator: Option<String>,
}

/// Uniform contract implemented by every artwork source.
#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    fn name(&self) -> ArtworkSource;

    fn is_configured(&self) -> bool;

    /// Candidate artwork for the given item. Infallible by contract;
    /// adapters swallow their own failures.
    async fn fetch(
        &self,
        media_kind: MediaKind,
        external_ids: &ExternalIds,
        wanted: &[ArtworkKind],
    ) -> Vec<ArtworkCandidate>;

    /// Whether the source is reachable with the configured credentials.
    async fn probe(&self) -> bool;
}

/// Integer field that may arrive as a JSON number or a numeric string.
pub(crate) fn int_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(number)) => number.as_i64().unwrap_or(0),
        Some(Value::String(text)) => text.parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
