//! Edition string generation and application.

pub mod input;
pub mod modules;

use std::collections::HashSet;

use artifex_model::{EditionConfigData, EditionSettings};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::EditionRepository;
use crate::error::{CoreError, Result};
use crate::media_server::MediaServerClient;
use input::ModuleInput;

/// Modules enabled when no configuration has been saved yet.
const DEFAULT_ENABLED: [&str; 6] = [
    "Resolution",
    "DynamicRange",
    "AudioCodec",
    "AudioChannels",
    "Cut",
    "Release",
];

pub fn default_config() -> EditionConfigData {
    EditionConfigData {
        enabled_modules: DEFAULT_ENABLED.iter().map(|name| name.to_string()).collect(),
        module_order: modules::module_names(),
        settings: EditionSettings::default(),
    }
}

/// Append registry modules missing from a saved ordering, so orderings
/// saved before a module existed keep working.
pub fn normalize_config(mut config: EditionConfigData) -> EditionConfigData {
    for name in modules::module_names() {
        if !config.module_order.contains(&name) {
            config.module_order.push(name);
        }
    }
    config
}

/// Compose the edition string for raw item metadata: enabled modules run in
/// the configured order, empty outputs are skipped, the rest joined with
/// the separator. Pure; no I/O.
pub fn compose(metadata: &Value, config: &EditionConfigData) -> Option<String> {
    let enabled: HashSet<&str> = config
        .enabled_modules
        .iter()
        .map(String::as_str)
        .collect();
    let module_input = ModuleInput::new(metadata, &config.settings);

    let mut parts = Vec::new();
    for name in &config.module_order {
        if !enabled.contains(name.as_str()) {
            continue;
        }
        // Unknown saved names are skipped.
        let Some(extractor) = modules::lookup(name) else {
            continue;
        };
        if let Some(value) = extractor(&module_input)
            && !value.is_empty()
        {
            parts.push(value);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&config.settings.separator))
    }
}

/// Generates edition strings and applies them with backup-first semantics.
#[derive(Debug, Clone)]
pub struct EditionEngine {
    repo: EditionRepository,
}

impl EditionEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: EditionRepository::new(pool),
        }
    }

    /// The effective configuration: saved row if present, defaults
    /// otherwise, always normalized against the registry.
    pub async fn config(&self) -> Result<EditionConfigData> {
        match self.repo.config().await? {
            Some(saved) => Ok(normalize_config(saved)),
            None => Ok(default_config()),
        }
    }

    pub async fn update_config(&self, config: EditionConfigData) -> Result<EditionConfigData> {
        let config = normalize_config(config);
        self.repo.save_config(&config).await?;
        Ok(config)
    }

    /// Generate the edition string for an item. Read-only.
    pub async fn generate(
        &self,
        client: &MediaServerClient,
        item_key: &str,
    ) -> Result<Option<String>> {
        let Some(metadata) = client.raw_item_metadata(item_key).await? else {
            return Ok(None);
        };
        let config = self.config().await?;
        Ok(compose(&metadata, &config))
    }

    /// Write an edition string to the server, backing up the item's
    /// current edition first. The backup is a no-op after the first write.
    pub async fn apply(
        &self,
        client: &MediaServerClient,
        item_key: &str,
        edition: &str,
    ) -> Result<()> {
        self.backup(client, item_key).await?;
        client.set_edition(item_key, edition).await?;
        self.repo.set_new_edition(item_key, edition).await?;
        Ok(())
    }

    /// Restore the backed-up edition (empty clears the field on the
    /// server). `false` when no backup exists.
    pub async fn restore(&self, client: &MediaServerClient, item_key: &str) -> Result<bool> {
        let Some(backup) = self.repo.backup(item_key).await? else {
            return Ok(false);
        };
        let original = backup.original_edition.unwrap_or_default();
        client.set_edition(item_key, &original).await?;
        self.repo.mark_restored(item_key).await?;
        Ok(true)
    }

    /// Never writes an edition without a backup row: an item whose current
    /// state cannot be read is not written to either.
    async fn backup(&self, client: &MediaServerClient, item_key: &str) -> Result<()> {
        if self.repo.backup(item_key).await?.is_some() {
            return Ok(());
        }

        let Some(item) = client.item_metadata(item_key).await? else {
            warn!(item_key, "refusing edition write; item state could not be backed up");
            return Err(CoreError::NotFound(format!("item {item_key}")));
        };
        self.repo
            .backup_if_absent(item_key, &item.title, item.edition_title.as_deref())
            .await?;
        Ok(())
    }
}
