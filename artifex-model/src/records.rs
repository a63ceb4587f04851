use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kinds::{
    ArtworkKind, ArtworkSource, DefectKind, IssueStatus, MediaKind, ScanEventKind, ScanKind,
    ScanStatus,
};

/// External identifiers attached to a media item, extracted from
/// `source://value` guid strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<String>,
}

impl ExternalIds {
    pub fn is_empty(&self) -> bool {
        self.tmdb.is_none() && self.imdb.is_none() && self.tvdb.is_none()
    }
}

/// A scan row. `config` holds the JSON snapshot of the [`crate::ScanConfig`]
/// the scan was started with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub kind: ScanKind,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_items: i64,
    pub processed_items: i64,
    pub issues_found: i64,
    pub editions_updated: i64,
    pub current_library: Option<String>,
    pub current_item: Option<String>,
    /// Mid-scan progress record, JSON; non-null only while the scan is live.
    pub checkpoint: Option<String>,
    pub triggered_by: String,
    pub config: String,
}

/// Append-only scan lifecycle log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEventRecord {
    pub id: i64,
    pub scan_id: i64,
    pub kind: ScanEventKind,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A detected metadata defect on one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: i64,
    pub scan_id: i64,
    pub item_key: String,
    pub item_guid: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub media_kind: MediaKind,
    pub defect: DefectKind,
    pub status: IssueStatus,
    pub library: Option<String>,
    pub external_ids: ExternalIds,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A candidate artwork image proposed for an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub id: i64,
    pub issue_id: i64,
    pub source: ArtworkSource,
    pub artwork_kind: ArtworkKind,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub language: Option<String>,
    pub score: i64,
    pub set_name: Option<String>,
    pub creator: Option<String>,
    pub is_selected: bool,
}

/// Snapshot of an item's edition title taken before the first write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionBackupRecord {
    pub id: i64,
    pub item_key: String,
    pub title: String,
    pub original_edition: Option<String>,
    pub new_edition: Option<String>,
    pub backed_up_at: DateTime<Utc>,
    pub restored_at: Option<DateTime<Utc>>,
}

/// A cron-driven scan schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub cron_expression: String,
    pub scan_kind: ScanKind,
    pub config: String,
    pub auto_commit: bool,
    pub auto_commit_options: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
