use artifex_model::{ScanKind, ScheduleRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{CoreError, Result};

/// Fields accepted when creating or updating a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub name: String,
    pub cron_expression: String,
    pub scan_kind: ScanKind,
    pub config_json: String,
    pub auto_commit: bool,
    pub auto_commit_options_json: Option<String>,
}

/// Persistence for cron-driven scan schedules.
#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

fn map_schedule(row: &SqliteRow) -> Result<ScheduleRecord> {
    let scan_kind: String = row.try_get("scan_kind")?;
    Ok(ScheduleRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        cron_expression: row.try_get("cron_expression")?,
        scan_kind: scan_kind
            .parse::<ScanKind>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        config: row.try_get("config")?,
        auto_commit: row.try_get("auto_commit")?,
        auto_commit_options: row.try_get("auto_commit_options")?,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl ScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, draft: &ScheduleDraft) -> Result<ScheduleRecord> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO schedules (
                name, enabled, cron_expression, scan_kind, config,
                auto_commit, auto_commit_options, created_at, updated_at
            )
            VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.cron_expression)
        .bind(draft.scan_kind.as_str())
        .bind(&draft.config_json)
        .bind(draft.auto_commit)
        .bind(&draft.auto_commit_options_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::Internal(format!("schedule {id} vanished after insert")))
    }

    pub async fn update(&self, id: i64, draft: &ScheduleDraft) -> Result<ScheduleRecord> {
        sqlx::query(
            r#"
            UPDATE schedules
            SET name = ?2,
                cron_expression = ?3,
                scan_kind = ?4,
                config = ?5,
                auto_commit = ?6,
                auto_commit_options = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.cron_expression)
        .bind(draft.scan_kind.as_str())
        .bind(&draft.config_json)
        .bind(draft.auto_commit)
        .bind(&draft.auto_commit_options_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("schedule {id}")))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: i64) -> Result<Option<ScheduleRecord>> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_schedule).transpose()
    }

    pub async fn list(&self) -> Result<Vec<ScheduleRecord>> {
        let rows = sqlx::query("SELECT * FROM schedules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_schedule).collect()
    }

    pub async fn enabled(&self) -> Result<Vec<ScheduleRecord>> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE enabled = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_schedule).collect()
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE schedules SET enabled = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(enabled)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_run(&self, id: i64, next_run_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE schedules SET last_run_at = ?2, next_run_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .bind(next_run_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_next_run(&self, id: i64, next_run_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE schedules SET next_run_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(next_run_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    fn draft() -> ScheduleDraft {
        ScheduleDraft {
            name: "nightly".to_string(),
            cron_expression: "0 3 * * *".to_string(),
            scan_kind: ScanKind::Both,
            config_json: "{}".to_string(),
            auto_commit: true,
            auto_commit_options_json: Some("{\"min_score\":50}".to_string()),
        }
    }

    #[tokio::test]
    async fn schedule_crud() {
        let pool = connect_in_memory().await.unwrap();
        let repo = ScheduleRepository::new(pool);

        let created = repo.create(&draft()).await.unwrap();
        assert!(created.enabled);
        assert_eq!(created.scan_kind, ScanKind::Both);

        // An unchanged save yields an identical row modulo updated_at.
        let saved = repo.update(created.id, &draft()).await.unwrap();
        assert_eq!(saved.name, created.name);
        assert_eq!(saved.cron_expression, created.cron_expression);
        assert_eq!(saved.config, created.config);
        assert_eq!(saved.auto_commit_options, created.auto_commit_options);
        assert_eq!(saved.created_at, created.created_at);

        assert!(repo.set_enabled(created.id, false).await.unwrap());
        assert!(repo.enabled().await.unwrap().is_empty());
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get(created.id).await.unwrap().is_none());
    }
}
