use artifex_model::{ScanEventKind, ScanEventRecord, ScanKind, ScanRecord, ScanStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{CoreError, Result};

/// Persistence for scan rows and their append-only event log.
#[derive(Debug, Clone)]
pub struct ScanRepository {
    pool: SqlitePool,
}

fn map_scan(row: &SqliteRow) -> Result<ScanRecord> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(ScanRecord {
        id: row.try_get("id")?,
        kind: kind
            .parse::<ScanKind>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        status: status
            .parse::<ScanStatus>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        paused_at: row.try_get("paused_at")?,
        completed_at: row.try_get("completed_at")?,
        total_items: row.try_get("total_items")?,
        processed_items: row.try_get("processed_items")?,
        issues_found: row.try_get("issues_found")?,
        editions_updated: row.try_get("editions_updated")?,
        current_library: row.try_get("current_library")?,
        current_item: row.try_get("current_item")?,
        checkpoint: row.try_get("checkpoint")?,
        triggered_by: row.try_get("triggered_by")?,
        config: row.try_get("config")?,
    })
}

impl ScanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new scan row in `running` state and return its id.
    pub async fn create(
        &self,
        kind: ScanKind,
        config_json: &str,
        triggered_by: &str,
    ) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO scans (kind, status, created_at, started_at, triggered_by, config)
            VALUES (?1, 'running', ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(kind.as_str())
        .bind(now)
        .bind(now)
        .bind(triggered_by)
        .bind(config_json)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<ScanRecord>> {
        let row = sqlx::query("SELECT * FROM scans WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_scan).transpose()
    }

    pub async fn latest(&self) -> Result<Option<ScanRecord>> {
        let row = sqlx::query("SELECT * FROM scans ORDER BY created_at DESC, id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_scan).transpose()
    }

    /// Freeze the total item count once enumeration finished.
    pub async fn set_total(&self, id: i64, total: i64) -> Result<()> {
        sqlx::query("UPDATE scans SET total_items = ?2 WHERE id = ?1")
            .bind(id)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_checkpoint(
        &self,
        id: i64,
        processed: i64,
        issues_found: i64,
        editions_updated: i64,
        current_library: Option<&str>,
        checkpoint_json: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scans
            SET processed_items = ?2,
                issues_found = ?3,
                editions_updated = ?4,
                current_library = ?5,
                checkpoint = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(processed)
        .bind(issues_found)
        .bind(editions_updated)
        .bind(current_library)
        .bind(checkpoint_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(
        &self,
        id: i64,
        processed: i64,
        issues_found: i64,
        editions_updated: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scans
            SET status = 'completed',
                processed_items = ?2,
                issues_found = ?3,
                editions_updated = ?4,
                completed_at = ?5,
                current_item = NULL,
                checkpoint = NULL
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(processed)
        .bind(issues_found)
        .bind(editions_updated)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_cancelled(&self, id: i64) -> Result<()> {
        self.finalize(id, ScanStatus::Cancelled).await
    }

    pub async fn mark_failed(&self, id: i64) -> Result<()> {
        self.finalize(id, ScanStatus::Failed).await
    }

    async fn finalize(&self, id: i64, status: ScanStatus) -> Result<()> {
        sqlx::query(
            "UPDATE scans SET status = ?2, completed_at = ?3, checkpoint = NULL WHERE id = ?1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_paused(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE scans SET status = 'paused', paused_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_resumed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE scans SET status = 'running', paused_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_event(
        &self,
        scan_id: i64,
        kind: ScanEventKind,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO scan_events (scan_id, kind, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(scan_id)
        .bind(kind.as_str())
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn events(&self, scan_id: i64) -> Result<Vec<ScanEventRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM scan_events WHERE scan_id = ?1 ORDER BY created_at, id",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                let kind = match kind.as_str() {
                    "started" => ScanEventKind::Started,
                    "paused" => ScanEventKind::Paused,
                    "resumed" => ScanEventKind::Resumed,
                    "cancelled" => ScanEventKind::Cancelled,
                    "completed" => ScanEventKind::Completed,
                    "failed" => ScanEventKind::Failed,
                    other => {
                        return Err(CoreError::Internal(format!("unknown scan event: {other}")));
                    }
                };
                Ok(ScanEventRecord {
                    id: row.try_get("id")?,
                    scan_id: row.try_get("scan_id")?,
                    kind,
                    message: row.try_get("message")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// The most recent scan left in a live state by a previous run.
    pub async fn find_interrupted(&self) -> Result<Option<ScanRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM scans
            WHERE status IN ('running', 'paused')
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_scan).transpose()
    }

    /// Count of scans still marked live in the store.
    pub async fn live_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scans WHERE status IN ('running', 'paused')")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn history(&self, offset: i64, limit: i64) -> Result<(Vec<ScanRecord>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT * FROM scans ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let scans = rows.iter().map(map_scan).collect::<Result<Vec<_>>>()?;
        Ok((scans, total))
    }
}

/// JSON stored in the `checkpoint` column while a scan is live.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    pub processed: i64,
    pub current_library: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    #[tokio::test]
    async fn scan_lifecycle_rows() {
        let pool = connect_in_memory().await.unwrap();
        let repo = ScanRepository::new(pool);

        let id = repo.create(ScanKind::Both, "{}", "manual").await.unwrap();
        repo.append_event(id, ScanEventKind::Started, "Scan started")
            .await
            .unwrap();

        let scan = repo.get(id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Running);
        assert!(scan.started_at.is_some());
        assert!(scan.created_at <= scan.started_at.unwrap());
        assert_eq!(repo.live_count().await.unwrap(), 1);

        repo.set_total(id, 42).await.unwrap();
        repo.save_checkpoint(id, 10, 2, 1, Some("Movies"), "{\"processed\":10}")
            .await
            .unwrap();

        let scan = repo.get(id).await.unwrap().unwrap();
        assert_eq!(scan.total_items, 42);
        assert_eq!(scan.processed_items, 10);
        assert!(scan.checkpoint.is_some());

        repo.mark_completed(id, 42, 2, 1).await.unwrap();
        repo.append_event(id, ScanEventKind::Completed, "Scan completed")
            .await
            .unwrap();

        let scan = repo.get(id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Completed);
        assert!(scan.checkpoint.is_none(), "checkpoint nulled on terminal transition");
        assert_eq!(repo.live_count().await.unwrap(), 0);

        let events = repo.events(id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ScanEventKind::Started);
        assert_eq!(events[1].kind, ScanEventKind::Completed);
    }

    #[tokio::test]
    async fn interrupted_scan_detection() {
        let pool = connect_in_memory().await.unwrap();
        let repo = ScanRepository::new(pool);

        assert!(repo.find_interrupted().await.unwrap().is_none());

        let id = repo.create(ScanKind::Artwork, "{}", "manual").await.unwrap();
        let interrupted = repo.find_interrupted().await.unwrap().unwrap();
        assert_eq!(interrupted.id, id);

        repo.mark_cancelled(id).await.unwrap();
        assert!(repo.find_interrupted().await.unwrap().is_none());
    }
}
