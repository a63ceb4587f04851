use std::collections::HashMap;

use artifex_model::{
    ArtworkKind, ArtworkSource, DefectKind, ExternalIds, IssueFilter, IssueRecord, IssueStats,
    IssueStatus, IssueWithSuggestions, MediaKind, SuggestionRecord,
};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::detector::ArtworkIssue;
use crate::error::{CoreError, Result};
use crate::providers::ArtworkCandidate;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

/// Persistence for issues and the suggestions they own.
#[derive(Debug, Clone)]
pub struct IssueRepository {
    pool: SqlitePool,
}

fn map_issue(row: &SqliteRow) -> Result<IssueRecord> {
    let media_kind: String = row.try_get("media_kind")?;
    let defect: String = row.try_get("defect")?;
    let status: String = row.try_get("status")?;
    let external_ids: Option<String> = row.try_get("external_ids")?;
    let details: Option<String> = row.try_get("details")?;

    Ok(IssueRecord {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        item_key: row.try_get("item_key")?,
        item_guid: row.try_get("item_guid")?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        media_kind: media_kind
            .parse::<MediaKind>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        defect: defect
            .parse::<DefectKind>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        status: status
            .parse::<IssueStatus>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        library: row.try_get("library")?,
        external_ids: external_ids
            .as_deref()
            .map(serde_json::from_str::<ExternalIds>)
            .transpose()?
            .unwrap_or_default(),
        details: details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn map_suggestion(row: &SqliteRow) -> Result<SuggestionRecord> {
    let source: String = row.try_get("source")?;
    let artwork_kind: String = row.try_get("artwork_kind")?;
    Ok(SuggestionRecord {
        id: row.try_get("id")?,
        issue_id: row.try_get("issue_id")?,
        source: source
            .parse::<ArtworkSource>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        artwork_kind: artwork_kind
            .parse::<ArtworkKind>()
            .map_err(|err| CoreError::Internal(err.to_string()))?,
        image_url: row.try_get("image_url")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        language: row.try_get("language")?,
        score: row.try_get("score")?,
        set_name: row.try_get("set_name")?,
        creator: row.try_get("creator")?,
        is_selected: row.try_get("is_selected")?,
    })
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &IssueFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(defect) = filter.defect {
        builder.push(" AND defect = ").push_bind(defect.as_str());
    }
    if let Some(library) = &filter.library {
        builder.push(" AND library = ").push_bind(library.clone());
    }
    if let Some(scan_id) = filter.scan_id {
        builder.push(" AND scan_id = ").push_bind(scan_id);
    }
    if let Some(search) = &filter.search {
        builder
            .push(" AND title LIKE ")
            .push_bind(format!("%{search}%"));
    }
}

impl IssueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a detected issue and return its id.
    pub async fn insert(&self, scan_id: i64, issue: &ArtworkIssue) -> Result<i64> {
        let external_ids = if issue.external_ids.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&issue.external_ids)?)
        };
        let details = issue
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO issues (
                scan_id, item_key, item_guid, title, year, media_kind,
                defect, status, library, external_ids, details, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(scan_id)
        .bind(&issue.item_key)
        .bind(&issue.item_guid)
        .bind(&issue.title)
        .bind(issue.year)
        .bind(issue.media_kind.as_str())
        .bind(issue.defect.as_str())
        .bind(&issue.library)
        .bind(external_ids)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_suggestions(
        &self,
        issue_id: i64,
        candidates: &[ArtworkCandidate],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for candidate in candidates {
            sqlx::query(
                r#"
                INSERT INTO suggestions (
                    issue_id, source, artwork_kind, image_url, thumbnail_url,
                    language, score, set_name, creator, is_selected
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                "#,
            )
            .bind(issue_id)
            .bind(candidate.source.as_str())
            .bind(candidate.artwork_kind.as_str())
            .bind(&candidate.image_url)
            .bind(&candidate.thumbnail_url)
            .bind(&candidate.language)
            .bind(candidate.score)
            .bind(&candidate.set_name)
            .bind(&candidate.creator)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Atomically swap an issue's suggestions for a fresh candidate set.
    pub async fn replace_suggestions(
        &self,
        issue_id: i64,
        candidates: &[ArtworkCandidate],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM suggestions WHERE issue_id = ?1")
            .bind(issue_id)
            .execute(&mut *tx)
            .await?;
        for candidate in candidates {
            sqlx::query(
                r#"
                INSERT INTO suggestions (
                    issue_id, source, artwork_kind, image_url, thumbnail_url,
                    language, score, set_name, creator, is_selected
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                "#,
            )
            .bind(issue_id)
            .bind(candidate.source.as_str())
            .bind(candidate.artwork_kind.as_str())
            .bind(&candidate.image_url)
            .bind(&candidate.thumbnail_url)
            .bind(&candidate.language)
            .bind(candidate.score)
            .bind(&candidate.set_name)
            .bind(&candidate.creator)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(candidates.len())
    }

    pub async fn get(&self, id: i64) -> Result<Option<IssueRecord>> {
        let row = sqlx::query("SELECT * FROM issues WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_issue).transpose()
    }

    pub async fn suggestions(&self, issue_id: i64) -> Result<Vec<SuggestionRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM suggestions WHERE issue_id = ?1 ORDER BY score DESC, id",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_suggestion).collect()
    }

    pub async fn get_with_suggestions(&self, id: i64) -> Result<Option<IssueWithSuggestions>> {
        let Some(issue) = self.get(id).await? else {
            return Ok(None);
        };
        let suggestions = self.suggestions(id).await?;
        Ok(Some(IssueWithSuggestions { issue, suggestions }))
    }

    pub async fn list(&self, filter: &IssueFilter) -> Result<(Vec<IssueWithSuggestions>, i64)> {
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut count_builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM issues WHERE 1=1");
        push_filters(&mut count_builder, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM issues WHERE 1=1");
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(i64::from((page - 1) * page_size));

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut issues = Vec::with_capacity(rows.len());
        for row in &rows {
            let issue = map_issue(row)?;
            let suggestions = self.suggestions(issue.id).await?;
            issues.push(IssueWithSuggestions { issue, suggestions });
        }

        Ok((issues, total))
    }

    /// Pending issues in item-discovery order, optionally scoped to a scan.
    pub async fn pending(&self, scan_id: Option<i64>) -> Result<Vec<IssueRecord>> {
        let rows = match scan_id {
            Some(scan_id) => {
                sqlx::query(
                    "SELECT * FROM issues WHERE status = 'pending' AND scan_id = ?1 ORDER BY id",
                )
                .bind(scan_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM issues WHERE status = 'pending' ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(map_issue).collect()
    }

    pub async fn set_status(&self, id: i64, status: IssueStatus, resolved: bool) -> Result<()> {
        let resolved_at = resolved.then(Utc::now);
        sqlx::query("UPDATE issues SET status = ?2, resolved_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .bind(resolved_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// One atomic commit per applied item: flip the issue to `applied` and
    /// flag the winning suggestion in the same transaction.
    pub async fn mark_applied(&self, issue_id: i64, suggestion_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE issues SET status = 'applied', resolved_at = ?2 WHERE id = ?1")
            .bind(issue_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE suggestions SET is_selected = 0 WHERE issue_id = ?1")
            .bind(issue_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE suggestions SET is_selected = 1 WHERE id = ?1")
            .bind(suggestion_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<IssueStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.pool)
            .await?;
        let by_status_rows =
            sqlx::query("SELECT status, COUNT(*) AS n FROM issues GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let by_defect_rows =
            sqlx::query("SELECT defect, COUNT(*) AS n FROM issues GROUP BY defect")
                .fetch_all(&self.pool)
                .await?;
        let by_library_rows =
            sqlx::query("SELECT library, COUNT(*) AS n FROM issues GROUP BY library")
                .fetch_all(&self.pool)
                .await?;

        let mut by_status: HashMap<String, i64> = HashMap::new();
        for row in &by_status_rows {
            by_status.insert(row.try_get("status")?, row.try_get("n")?);
        }
        let mut by_defect: HashMap<String, i64> = HashMap::new();
        for row in &by_defect_rows {
            by_defect.insert(row.try_get("defect")?, row.try_get("n")?);
        }
        let mut by_library: HashMap<String, i64> = HashMap::new();
        for row in &by_library_rows {
            let library: Option<String> = row.try_get("library")?;
            by_library.insert(
                library.unwrap_or_else(|| "Unknown".to_string()),
                row.try_get("n")?,
            );
        }

        Ok(IssueStats {
            total,
            pending: by_status.get("pending").copied().unwrap_or(0),
            applied: by_status.get("applied").copied().unwrap_or(0),
            rejected: by_status.get("rejected").copied().unwrap_or(0),
            by_defect,
            by_library,
        })
    }
}
