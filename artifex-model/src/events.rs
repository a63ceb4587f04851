use serde::Serialize;

use crate::kinds::ScanStatus;

/// Live progress counters for the current (or most recent) scan.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub scan_id: Option<i64>,
    pub status: ScanStatus,
    pub processed: u64,
    pub total: u64,
    pub issues_found: u64,
    pub editions_updated: u64,
    pub current_library: Option<String>,
    pub current_item: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            scan_id: None,
            status: ScanStatus::Pending,
            processed: 0,
            total: 0,
            issues_found: 0,
            editions_updated: 0,
            current_library: None,
            current_item: None,
        }
    }
}

/// Events broadcast by the scan engine to every subscribed stream.
///
/// Serialized with a `type` discriminator so SSE consumers can dispatch on
/// `data.type` directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanStreamEvent {
    Connected {
        #[serde(flatten)]
        progress: ProgressSnapshot,
    },
    ScanStarted {
        scan_id: i64,
    },
    ScanProgress {
        scan_id: i64,
        processed: u64,
        total: u64,
        issues_found: u64,
        editions_updated: u64,
        current_library: Option<String>,
        current_item: Option<String>,
    },
    ScanPaused {
        scan_id: i64,
    },
    ScanResumed {
        scan_id: i64,
    },
    ScanCancelled {
        scan_id: i64,
    },
    ScanCompleted {
        scan_id: i64,
        processed: u64,
        issues_found: u64,
        editions_updated: u64,
    },
    ScanFailed {
        scan_id: i64,
        error: String,
    },
}

impl ScanStreamEvent {
    /// Whether this event ends the stream for subscribers that only care
    /// about a single scan.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ScanCompleted { .. } | Self::ScanCancelled { .. } | Self::ScanFailed { .. }
        )
    }
}

/// Progress counters for an auto-apply run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoApplyProgress {
    pub processed: u64,
    pub total: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Events broadcast by the auto-apply engine, shaped like the scan stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoApplyEvent {
    Connected {
        #[serde(flatten)]
        progress: AutoApplyProgress,
    },
    Started {
        total: u64,
    },
    Progress {
        #[serde(flatten)]
        progress: AutoApplyProgress,
    },
    Completed {
        #[serde(flatten)]
        progress: AutoApplyProgress,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_type_discriminator() {
        let event = ScanStreamEvent::ScanStarted { scan_id: 7 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scan_started");
        assert_eq!(json["scan_id"], 7);
    }

    #[test]
    fn connected_snapshot_is_flattened() {
        let event = ScanStreamEvent::Connected {
            progress: ProgressSnapshot::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["processed"], 0);
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn terminal_events() {
        assert!(
            ScanStreamEvent::ScanCompleted {
                scan_id: 1,
                processed: 0,
                issues_found: 0,
                editions_updated: 0,
            }
            .is_terminal()
        );
        assert!(!ScanStreamEvent::ScanStarted { scan_id: 1 }.is_terminal());
    }
}
