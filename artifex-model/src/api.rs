use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kinds::{ArtworkSource, DefectKind, IssueStatus, ScanKind, ScanStatus};
use crate::records::{IssueRecord, ScanRecord, ScheduleRecord, SuggestionRecord};

fn default_true() -> bool {
    true
}

fn default_checkpoint_interval() -> u64 {
    100
}

fn default_separator() -> String {
    " . ".to_string()
}

fn default_excluded_languages() -> Vec<String> {
    vec!["English".to_string()]
}

/// What a scan should look at and which rules are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "ScanConfig::default_kind")]
    pub kind: ScanKind,
    /// Library ids to scan; empty means every video library.
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default = "default_true")]
    pub check_posters: bool,
    #[serde(default = "default_true")]
    pub check_backgrounds: bool,
    #[serde(default = "default_true")]
    pub check_logos: bool,
    #[serde(default = "default_true")]
    pub check_unmatched: bool,
    #[serde(default = "default_true")]
    pub check_placeholders: bool,
    #[serde(default = "default_true")]
    pub edition_enabled: bool,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
}

impl ScanConfig {
    const fn default_kind() -> ScanKind {
        ScanKind::Both
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            kind: ScanKind::Both,
            libraries: Vec::new(),
            check_posters: true,
            check_backgrounds: true,
            check_logos: true,
            check_unmatched: true,
            check_placeholders: true,
            edition_enabled: true,
            checkpoint_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanStartRequest {
    #[serde(default)]
    pub config: Option<ScanConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStatusResponse {
    pub id: i64,
    pub kind: ScanKind,
    pub status: ScanStatus,
    pub total_items: i64,
    pub processed_items: i64,
    pub issues_found: i64,
    pub editions_updated: i64,
    pub current_library: Option<String>,
    pub current_item: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_percent: f64,
}

impl From<ScanRecord> for ScanStatusResponse {
    fn from(scan: ScanRecord) -> Self {
        let progress_percent = if scan.total_items > 0 {
            scan.processed_items as f64 / scan.total_items as f64 * 100.0
        } else {
            0.0
        };
        Self {
            id: scan.id,
            kind: scan.kind,
            status: scan.status,
            total_items: scan.total_items,
            processed_items: scan.processed_items,
            issues_found: scan.issues_found,
            editions_updated: scan.editions_updated,
            current_library: scan.current_library,
            current_item: scan.current_item,
            started_at: scan.started_at,
            paused_at: scan.paused_at,
            completed_at: scan.completed_at,
            progress_percent,
        }
    }
}

/// Filters accepted by the issue listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub defect: Option<DefectKind>,
    pub library: Option<String>,
    pub search: Option<String>,
    pub scan_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueWithSuggestions {
    #[serde(flatten)]
    pub issue: IssueRecord,
    pub suggestions: Vec<SuggestionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueListResponse {
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub issues: Vec<IssueWithSuggestions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueAcceptRequest {
    pub suggestion_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueStats {
    pub total: i64,
    pub pending: i64,
    pub applied: i64,
    pub rejected: i64,
    pub by_defect: std::collections::HashMap<String, i64>,
    pub by_library: std::collections::HashMap<String, i64>,
}

/// Selection policy for the auto-apply engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoApplyOptions {
    #[serde(default)]
    pub scan_id: Option<i64>,
    #[serde(default = "default_true")]
    pub skip_unmatched: bool,
    #[serde(default)]
    pub min_score: i64,
}

impl Default for AutoApplyOptions {
    fn default() -> Self {
        Self {
            scan_id: None,
            skip_unmatched: true,
            min_score: 0,
        }
    }
}

/// Free-form settings passed to edition modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionSettings {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_excluded_languages")]
    pub excluded_languages: Vec<String>,
}

impl Default for EditionSettings {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            excluded_languages: default_excluded_languages(),
        }
    }
}

/// Singleton edition-module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditionConfigData {
    pub enabled_modules: Vec<String>,
    pub module_order: Vec<String>,
    #[serde(default)]
    pub settings: EditionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryResponse {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettingsRequest {
    pub fanart_api_key: Option<String>,
    pub mediux_api_key: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub tvdb_api_key: Option<String>,
    pub provider_priority: Option<Vec<ArtworkSource>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSettingsResponse {
    pub fanart: bool,
    pub mediux: bool,
    pub tmdb: bool,
    pub tvdb: bool,
    pub provider_priority: Vec<ArtworkSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCreateRequest {
    pub name: String,
    pub cron_expression: String,
    #[serde(default = "ScanConfig::default_kind")]
    pub scan_kind: ScanKind,
    #[serde(default)]
    pub config: Option<ScanConfig>,
    #[serde(default)]
    pub auto_commit: bool,
    #[serde(default)]
    pub auto_commit_options: Option<AutoApplyOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResponse {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub cron_expression: String,
    pub scan_kind: ScanKind,
    pub auto_commit: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ScheduleRecord> for ScheduleResponse {
    fn from(schedule: ScheduleRecord) -> Self {
        Self {
            id: schedule.id,
            name: schedule.name,
            enabled: schedule.enabled,
            cron_expression: schedule.cron_expression,
            scan_kind: schedule.scan_kind,
            auto_commit: schedule.auto_commit,
            last_run_at: schedule.last_run_at,
            next_run_at: schedule.next_run_at,
            created_at: schedule.created_at,
        }
    }
}
