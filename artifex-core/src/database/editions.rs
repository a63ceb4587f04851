use artifex_model::{EditionBackupRecord, EditionConfigData, EditionSettings};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;

/// Persistence for the edition module configuration and edition backups.
#[derive(Debug, Clone)]
pub struct EditionRepository {
    pool: SqlitePool,
}

fn map_backup(row: &SqliteRow) -> Result<EditionBackupRecord> {
    Ok(EditionBackupRecord {
        id: row.try_get("id")?,
        item_key: row.try_get("item_key")?,
        title: row.try_get("title")?,
        original_edition: row.try_get("original_edition")?,
        new_edition: row.try_get("new_edition")?,
        backed_up_at: row.try_get("backed_up_at")?,
        restored_at: row.try_get("restored_at")?,
    })
}

impl EditionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The saved module configuration, if any.
    pub async fn config(&self) -> Result<Option<EditionConfigData>> {
        let row = sqlx::query(
            "SELECT enabled_modules, module_order, settings FROM edition_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let enabled_modules: String = row.try_get("enabled_modules")?;
        let module_order: String = row.try_get("module_order")?;
        let settings: String = row.try_get("settings")?;

        Ok(Some(EditionConfigData {
            enabled_modules: serde_json::from_str(&enabled_modules)?,
            module_order: serde_json::from_str(&module_order)?,
            settings: serde_json::from_str::<EditionSettings>(&settings).unwrap_or_default(),
        }))
    }

    pub async fn save_config(&self, config: &EditionConfigData) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO edition_config (id, enabled_modules, module_order, settings, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                enabled_modules = excluded.enabled_modules,
                module_order = excluded.module_order,
                settings = excluded.settings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(serde_json::to_string(&config.enabled_modules)?)
        .bind(serde_json::to_string(&config.module_order)?)
        .bind(serde_json::to_string(&config.settings)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the item's current edition before the first write. Returns
    /// false (and writes nothing) when a backup already exists.
    pub async fn backup_if_absent(
        &self,
        item_key: &str,
        title: &str,
        original_edition: Option<&str>,
    ) -> Result<bool> {
        if self.backup(item_key).await?.is_some() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO edition_backups (item_key, title, original_edition, backed_up_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(item_key)
        .bind(title)
        .bind(original_edition)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    pub async fn backup(&self, item_key: &str) -> Result<Option<EditionBackupRecord>> {
        let row = sqlx::query("SELECT * FROM edition_backups WHERE item_key = ?1 LIMIT 1")
            .bind(item_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_backup).transpose()
    }

    pub async fn set_new_edition(&self, item_key: &str, new_edition: &str) -> Result<()> {
        sqlx::query("UPDATE edition_backups SET new_edition = ?2 WHERE item_key = ?1")
            .bind(item_key)
            .bind(new_edition)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_restored(&self, item_key: &str) -> Result<()> {
        sqlx::query("UPDATE edition_backups SET restored_at = ?2 WHERE item_key = ?1")
            .bind(item_key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    #[tokio::test]
    async fn first_backup_wins() {
        let pool = connect_in_memory().await.unwrap();
        let repo = EditionRepository::new(pool);

        assert!(
            repo.backup_if_absent("42", "Blade Runner", Some("Theatrical"))
                .await
                .unwrap()
        );
        assert!(
            !repo
                .backup_if_absent("42", "Blade Runner", Some("4K . Final Cut"))
                .await
                .unwrap()
        );

        let backup = repo.backup("42").await.unwrap().unwrap();
        assert_eq!(backup.original_edition.as_deref(), Some("Theatrical"));
        assert!(backup.restored_at.is_none());
    }

    #[tokio::test]
    async fn config_roundtrip_is_identical() {
        let pool = connect_in_memory().await.unwrap();
        let repo = EditionRepository::new(pool);

        let config = EditionConfigData {
            enabled_modules: vec!["Resolution".to_string(), "Cut".to_string()],
            module_order: vec![
                "Cut".to_string(),
                "Resolution".to_string(),
                "Source".to_string(),
            ],
            settings: EditionSettings::default(),
        };
        repo.save_config(&config).await.unwrap();

        let loaded = repo.config().await.unwrap().unwrap();
        assert_eq!(loaded, config);

        // Saving the loaded value back yields the same stored row.
        repo.save_config(&loaded).await.unwrap();
        assert_eq!(repo.config().await.unwrap().unwrap(), config);
    }
}
