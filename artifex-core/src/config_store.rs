//! Typed accessors over the key/value config table.
//!
//! Keys flagged as encrypted are ciphertext at rest; the accessor decrypts
//! on read and encrypts on write so callers only ever see plaintext.

use artifex_model::ArtworkSource;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::crypto::SecretCipher;
use crate::error::{CoreError, Result};
use crate::media_server::MediaServerClient;

pub mod keys {
    pub const MEDIA_SERVER_URL: &str = "media_server_url";
    pub const MEDIA_SERVER_TOKEN: &str = "media_server_token";
    pub const MEDIA_SERVER_NAME: &str = "media_server_name";
    pub const PROVIDER_PRIORITY: &str = "provider_priority";
    pub const FANART_API_KEY: &str = "fanart_api_key";
    pub const MEDIUX_API_KEY: &str = "mediux_api_key";
    pub const TMDB_API_KEY: &str = "tmdb_api_key";
    pub const TVDB_API_KEY: &str = "tvdb_api_key";
}

fn provider_key_name(source: ArtworkSource) -> Option<&'static str> {
    match source {
        ArtworkSource::Fanart => Some(keys::FANART_API_KEY),
        ArtworkSource::Mediux => Some(keys::MEDIUX_API_KEY),
        ArtworkSource::Tmdb => Some(keys::TMDB_API_KEY),
        ArtworkSource::Tvdb => Some(keys::TVDB_API_KEY),
        ArtworkSource::Plex => None,
    }
}

pub fn default_provider_priority() -> Vec<ArtworkSource> {
    vec![
        ArtworkSource::Fanart,
        ArtworkSource::Mediux,
        ArtworkSource::Tmdb,
        ArtworkSource::Tvdb,
        ArtworkSource::Plex,
    ]
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
    cipher: SecretCipher,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool, cipher: SecretCipher) -> Self {
        Self { pool, cipher }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value, encrypted FROM config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row.try_get("value")?;
        let encrypted: bool = row.try_get("encrypted")?;
        if encrypted {
            Ok(Some(self.cipher.decrypt(&value)))
        } else {
            Ok(Some(value))
        }
    }

    pub async fn set(&self, key: &str, value: &str, encrypted: bool) -> Result<()> {
        let stored = if encrypted {
            self.cipher.encrypt(value)
        } else {
            value.to_string()
        };

        sqlx::query(
            r#"
            INSERT INTO config (key, value, encrypted, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                encrypted = excluded.encrypted,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(stored)
        .bind(encrypted)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM config WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// `(url, token, server_name)` of the configured media server.
    pub async fn media_server_config(
        &self,
    ) -> Result<(Option<String>, Option<String>, Option<String>)> {
        let url = self.get(keys::MEDIA_SERVER_URL).await?;
        let token = self.get(keys::MEDIA_SERVER_TOKEN).await?;
        let name = self.get(keys::MEDIA_SERVER_NAME).await?;
        Ok((url, token, name))
    }

    pub async fn set_media_server_config(
        &self,
        url: &str,
        token: &str,
        server_name: &str,
    ) -> Result<()> {
        self.set(keys::MEDIA_SERVER_URL, url, false).await?;
        self.set(keys::MEDIA_SERVER_TOKEN, token, true).await?;
        self.set(keys::MEDIA_SERVER_NAME, server_name, false).await?;
        Ok(())
    }

    pub async fn is_media_server_configured(&self) -> Result<bool> {
        let (url, token, _) = self.media_server_config().await?;
        Ok(url.is_some_and(|url| !url.is_empty()) && token.is_some_and(|token| !token.is_empty()))
    }

    /// A client for the configured media server, or `NotConfigured`.
    pub async fn media_server_client(&self) -> Result<MediaServerClient> {
        let (url, token, _) = self.media_server_config().await?;
        match (url, token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                Ok(MediaServerClient::new(&url, &token)?)
            }
            _ => Err(CoreError::NotConfigured),
        }
    }

    pub async fn provider_key(&self, source: ArtworkSource) -> Result<Option<String>> {
        match provider_key_name(source) {
            Some(key) => Ok(self
                .get(key)
                .await?
                .filter(|value| !value.is_empty())),
            None => Ok(None),
        }
    }

    pub async fn set_provider_key(&self, source: ArtworkSource, api_key: &str) -> Result<()> {
        if let Some(key) = provider_key_name(source) {
            self.set(key, api_key, true).await?;
        }
        Ok(())
    }

    pub async fn provider_configured(&self, source: ArtworkSource) -> Result<bool> {
        Ok(self.provider_key(source).await?.is_some())
    }

    pub async fn provider_priority(&self) -> Result<Vec<ArtworkSource>> {
        if let Some(stored) = self.get(keys::PROVIDER_PRIORITY).await?
            && let Ok(priority) = serde_json::from_str::<Vec<ArtworkSource>>(&stored)
        {
            return Ok(priority);
        }
        Ok(default_provider_priority())
    }

    pub async fn set_provider_priority(&self, priority: &[ArtworkSource]) -> Result<()> {
        self.set(
            keys::PROVIDER_PRIORITY,
            &serde_json::to_string(priority)?,
            false,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    async fn store() -> ConfigStore {
        let pool = connect_in_memory().await.unwrap();
        ConfigStore::new(pool, SecretCipher::from_passphrase("test-passphrase"))
    }

    #[tokio::test]
    async fn plain_values_roundtrip() {
        let store = store().await;
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("media_server_url", "http://localhost:32400", false)
            .await
            .unwrap();
        assert_eq!(
            store.get("media_server_url").await.unwrap().as_deref(),
            Some("http://localhost:32400")
        );

        assert!(store.delete("media_server_url").await.unwrap());
        assert!(!store.exists("media_server_url").await.unwrap());
    }

    #[tokio::test]
    async fn encrypted_values_are_ciphertext_at_rest() {
        let store = store().await;
        store.set("media_server_token", "s3cret", true).await.unwrap();

        let raw: String =
            sqlx::query_scalar("SELECT value FROM config WHERE key = 'media_server_token'")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_ne!(raw, "s3cret");

        assert_eq!(
            store.get("media_server_token").await.unwrap().as_deref(),
            Some("s3cret")
        );
    }

    #[tokio::test]
    async fn passphrase_change_reads_empty_instead_of_failing() {
        let pool = connect_in_memory().await.unwrap();
        let store = ConfigStore::new(pool.clone(), SecretCipher::from_passphrase("old"));
        store.set("tvdb_api_key", "key-123", true).await.unwrap();

        let rotated = ConfigStore::new(pool, SecretCipher::from_passphrase("new"));
        assert_eq!(rotated.get("tvdb_api_key").await.unwrap().as_deref(), Some(""));
        assert_eq!(rotated.provider_key(ArtworkSource::Tvdb).await.unwrap(), None);
    }

    #[tokio::test]
    async fn provider_priority_defaults_and_persists() {
        let store = store().await;
        assert_eq!(
            store.provider_priority().await.unwrap(),
            default_provider_priority()
        );

        let custom = vec![ArtworkSource::Tmdb, ArtworkSource::Fanart];
        store.set_provider_priority(&custom).await.unwrap();
        assert_eq!(store.provider_priority().await.unwrap(), custom);
    }
}
