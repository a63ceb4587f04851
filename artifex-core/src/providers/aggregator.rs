use std::cmp::Reverse;
use std::sync::Arc;

use artifex_model::{ArtworkKind, ArtworkSource, ExternalIds, MediaKind};
use futures::future::join_all;
use tracing::debug;

use super::{
    ArtworkCandidate, ArtworkProvider, FanartProvider, MediuxProvider, TmdbProvider, TvdbProvider,
};
use crate::config_store::ConfigStore;
use crate::error::Result;

/// Index assigned to sources missing from the priority list so they sort
/// after every listed source.
const UNRANKED: usize = usize::MAX;

/// Fans a lookup out to every configured provider and merges the results
/// into one deterministically ranked list.
pub struct ArtworkAggregator {
    providers: Vec<Arc<dyn ArtworkProvider>>,
    priority: Vec<ArtworkSource>,
}

impl ArtworkAggregator {
    pub fn new(providers: Vec<Arc<dyn ArtworkProvider>>, priority: Vec<ArtworkSource>) -> Self {
        Self {
            providers,
            priority,
        }
    }

    /// Build the adapter set from stored API keys and the priority list.
    pub async fn from_config(store: &ConfigStore) -> Result<Self> {
        let mut providers: Vec<Arc<dyn ArtworkProvider>> = Vec::new();

        if let Some(key) = store.provider_key(ArtworkSource::Fanart).await? {
            providers.push(Arc::new(FanartProvider::new(key)));
        }
        // Mediux is registered even without a key; its adapter reports
        // itself unconfigured and stays out of the fan-out until one is set.
        let mediux_key = store
            .provider_key(ArtworkSource::Mediux)
            .await?
            .unwrap_or_default();
        providers.push(Arc::new(MediuxProvider::new(mediux_key)));
        if let Some(key) = store.provider_key(ArtworkSource::Tmdb).await? {
            providers.push(Arc::new(TmdbProvider::new(key)));
        }
        if let Some(key) = store.provider_key(ArtworkSource::Tvdb).await? {
            providers.push(Arc::new(TvdbProvider::new(key)));
        }

        let priority = store.provider_priority().await?;
        Ok(Self::new(providers, priority))
    }

    fn priority_index(&self, source: ArtworkSource) -> usize {
        self.priority
            .iter()
            .position(|candidate| *candidate == source)
            .unwrap_or(UNRANKED)
    }

    /// Query every configured provider concurrently and return the merged
    /// candidates ordered by `(priority index, score desc)`. Stable for
    /// identical inputs and configuration.
    pub async fn fetch(
        &self,
        media_kind: MediaKind,
        external_ids: &ExternalIds,
        wanted: &[ArtworkKind],
    ) -> Vec<ArtworkCandidate> {
        let configured: Vec<&Arc<dyn ArtworkProvider>> = self
            .providers
            .iter()
            .filter(|provider| provider.is_configured())
            .collect();

        if configured.is_empty() {
            debug!("no artwork providers configured");
            return Vec::new();
        }

        let results = join_all(
            configured
                .iter()
                .map(|provider| provider.fetch(media_kind, external_ids, wanted)),
        )
        .await;

        let mut candidates: Vec<ArtworkCandidate> = results.into_iter().flatten().collect();
        candidates
            .sort_by_key(|candidate| (self.priority_index(candidate.source), Reverse(candidate.score)));
        candidates
    }

    /// Probe one provider by name. `None` when no adapter with that name
    /// was built (no key configured).
    pub async fn probe(&self, source: ArtworkSource) -> Option<bool> {
        let provider = self
            .providers
            .iter()
            .find(|provider| provider.name() == source)?;
        Some(provider.probe().await)
    }
}
