use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use artifex_model::{
    MediaKind, ProgressSnapshot, ScanConfig, ScanEventKind, ScanRecord, ScanStatus,
    ScanStreamEvent,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::{error, info, warn};

use crate::config_store::ConfigStore;
use crate::crypto::SecretCipher;
use crate::database::scans::Checkpoint;
use crate::database::{IssueRepository, ScanRepository};
use crate::detector::ArtworkInspector;
use crate::edition::EditionEngine;
use crate::error::{CoreError, Result};
use crate::media_server::{MediaItem, MediaServerClient, MediaServerError};
use crate::providers::ArtworkAggregator;

const BROADCAST_EVERY: u64 = 5;

#[derive(Debug, Default)]
struct EngineState {
    current: Option<i64>,
    paused: bool,
}

/// Process-wide scan orchestrator. At most one scan is live at any time;
/// `start_scan` enforces the invariant under a single mutex.
///
/// Clones share all state, so one engine can be handed to the HTTP
/// surface and the scheduler alike.
#[derive(Clone)]
pub struct ScanEngine {
    pool: SqlitePool,
    cipher: SecretCipher,
    state: Arc<AsyncMutex<EngineState>>,
    progress: Arc<RwLock<ProgressSnapshot>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ScanStreamEvent>>>>,
    /// Pause gate; item processing awaits `true`.
    pause: Arc<watch::Sender<bool>>,
    cancel: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(pool: SqlitePool, cipher: SecretCipher) -> Self {
        let (pause, _) = watch::channel(true);
        Self {
            pool,
            cipher,
            state: Arc::new(AsyncMutex::new(EngineState::default())),
            progress: Arc::new(RwLock::new(ProgressSnapshot::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            pause: Arc::new(pause),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn scans(&self) -> ScanRepository {
        ScanRepository::new(self.pool.clone())
    }

    fn issues(&self) -> IssueRepository {
        IssueRepository::new(self.pool.clone())
    }

    fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.pool.clone(), self.cipher.clone())
    }

    /// Current progress counters.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.read().unwrap().clone()
    }

    pub async fn is_live(&self) -> bool {
        self.state.lock().await.current.is_some()
    }

    pub async fn current_scan_id(&self) -> Option<i64> {
        self.state.lock().await.current
    }

    /// Subscribe to the event stream. The queue is seeded with a
    /// `connected` snapshot of current progress.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ScanStreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = self.progress();
        let _ = tx.send(ScanStreamEvent::Connected { progress: snapshot });
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Best-effort fan-out; subscribers whose queue is gone are dropped.
    fn broadcast(&self, event: ScanStreamEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn update_progress<F: FnOnce(&mut ProgressSnapshot)>(&self, update: F) -> ProgressSnapshot {
        let mut progress = self.progress.write().unwrap();
        update(&mut progress);
        progress.clone()
    }

    /// Start a new scan. Fails when a scan is live, or when a stale live
    /// row from a previous run has not been reconciled yet.
    pub async fn start_scan(&self, config: ScanConfig, triggered_by: &str) -> Result<i64> {
        let mut state = self.state.lock().await;
        if state.current.is_some() {
            return Err(CoreError::ScanAlreadyRunning);
        }

        let scans = self.scans();
        if scans.find_interrupted().await?.is_some() {
            return Err(CoreError::InterruptedScanPending);
        }

        let config_json = serde_json::to_string(&config)?;
        let scan_id = scans.create(config.kind, &config_json, triggered_by).await?;
        scans
            .append_event(scan_id, ScanEventKind::Started, "Scan started")
            .await?;

        self.cancel.store(false, Ordering::SeqCst);
        self.pause.send_replace(true);
        state.current = Some(scan_id);
        state.paused = false;
        drop(state);

        self.update_progress(|progress| {
            *progress = ProgressSnapshot {
                scan_id: Some(scan_id),
                status: ScanStatus::Running,
                ..ProgressSnapshot::default()
            };
        });

        info!(scan_id, triggered_by, "started scan");
        self.broadcast(ScanStreamEvent::ScanStarted { scan_id });

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_scan(scan_id, config).await;
        });

        Ok(scan_id)
    }

    async fn run_scan(&self, scan_id: i64, config: ScanConfig) {
        if let Err(err) = self.execute_scan(scan_id, &config).await {
            error!(scan_id, "scan failed: {err}");
            if let Err(db_err) = self.finalize_failed(scan_id, &err).await {
                error!(scan_id, "failed to record scan failure: {db_err}");
            }
        }

        let mut state = self.state.lock().await;
        state.current = None;
        state.paused = false;
    }

    async fn finalize_failed(&self, scan_id: i64, err: &CoreError) -> Result<()> {
        let scans = self.scans();
        scans.mark_failed(scan_id).await?;
        scans
            .append_event(scan_id, ScanEventKind::Failed, &format!("Scan failed: {err}"))
            .await?;
        self.update_progress(|progress| progress.status = ScanStatus::Failed);
        self.broadcast(ScanStreamEvent::ScanFailed {
            scan_id,
            error: err.to_string(),
        });
        Ok(())
    }

    async fn execute_scan(&self, scan_id: i64, config: &ScanConfig) -> Result<()> {
        let scans = self.scans();
        let issues = self.issues();
        let store = self.config_store();

        let client = Arc::new(store.media_server_client().await?);
        let inspector = ArtworkInspector::new(Arc::clone(&client), config);
        let edition_engine = EditionEngine::new(self.pool.clone());
        let aggregator = ArtworkAggregator::from_config(&store).await?;

        let run_artwork = config.kind.includes_artwork();
        let run_edition = config.kind.includes_edition() && config.edition_enabled;

        // Resolve the library set: explicit ids, else every video library.
        let library_ids = if config.libraries.is_empty() {
            client
                .libraries()
                .await?
                .into_iter()
                .map(|library| library.id)
                .collect()
        } else {
            config.libraries.clone()
        };

        // Enumerate everything up front so `total` can be frozen.
        let mut library_items: Vec<Vec<MediaItem>> = Vec::new();
        let mut total: u64 = 0;
        for library_id in &library_ids {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            let items = client.all_library_items(library_id).await?;
            total += items.len() as u64;
            library_items.push(items);
        }

        scans.set_total(scan_id, total as i64).await?;
        self.update_progress(|progress| progress.total = total);
        self.broadcast(ScanStreamEvent::ScanProgress {
            scan_id,
            processed: 0,
            total,
            issues_found: 0,
            editions_updated: 0,
            current_library: None,
            current_item: None,
        });

        let mut processed: u64 = 0;
        let mut issues_found: u64 = 0;
        let mut editions_updated: u64 = 0;
        let checkpoint_interval = config.checkpoint_interval.max(1);

        for items in &library_items {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let library_name = items.first().map(|item| item.library.clone());
            self.update_progress(|progress| {
                progress.current_library = library_name.clone();
            });

            for item in items {
                // Wait while paused; cancellation reopens the gate.
                {
                    let mut gate = self.pause.subscribe();
                    let _ = gate.wait_for(|open| *open).await;
                }

                if self.cancel.load(Ordering::SeqCst) {
                    return self.finalize_cancelled(scan_id).await;
                }

                self.update_progress(|progress| {
                    progress.current_item = Some(item.title.clone());
                });

                if run_artwork {
                    for issue in inspector.scan_item(item).await {
                        let artwork_kind = issue.defect.artwork_kind();
                        let issue_id = issues.insert(scan_id, &issue).await?;
                        issues_found += 1;

                        // Populate suggestions eagerly while the item's
                        // external ids are at hand.
                        if let Some(wanted) = artwork_kind
                            && !issue.external_ids.is_empty()
                        {
                            let candidates = aggregator
                                .fetch(issue.media_kind, &issue.external_ids, &[wanted])
                                .await;
                            if !candidates.is_empty() {
                                issues.insert_suggestions(issue_id, &candidates).await?;
                            }
                        }
                    }
                }

                if run_edition && item.kind == MediaKind::Movie {
                    match self
                        .refresh_edition(&edition_engine, &client, item)
                        .await
                    {
                        Ok(true) => editions_updated += 1,
                        Ok(false) => {}
                        Err(err) if is_fatal(&err) => return Err(err),
                        Err(err) => {
                            warn!(item = %item.title, "edition update failed: {err}");
                        }
                    }
                }

                processed += 1;
                let snapshot = self.update_progress(|progress| {
                    progress.processed = processed;
                    progress.issues_found = issues_found;
                    progress.editions_updated = editions_updated;
                });

                if processed % checkpoint_interval == 0 {
                    let checkpoint = Checkpoint {
                        processed: processed as i64,
                        current_library: snapshot.current_library.clone(),
                        timestamp: Utc::now(),
                    };
                    scans
                        .save_checkpoint(
                            scan_id,
                            processed as i64,
                            issues_found as i64,
                            editions_updated as i64,
                            snapshot.current_library.as_deref(),
                            &serde_json::to_string(&checkpoint)?,
                        )
                        .await?;
                }

                if processed % BROADCAST_EVERY == 0 {
                    self.broadcast(ScanStreamEvent::ScanProgress {
                        scan_id,
                        processed,
                        total,
                        issues_found,
                        editions_updated,
                        current_library: snapshot.current_library.clone(),
                        current_item: snapshot.current_item.clone(),
                    });
                }
            }
        }

        if self.cancel.load(Ordering::SeqCst) {
            return self.finalize_cancelled(scan_id).await;
        }

        scans
            .mark_completed(
                scan_id,
                processed as i64,
                issues_found as i64,
                editions_updated as i64,
            )
            .await?;
        scans
            .append_event(
                scan_id,
                ScanEventKind::Completed,
                &format!(
                    "Scan completed. Found {issues_found} issues, updated {editions_updated} editions."
                ),
            )
            .await?;
        self.update_progress(|progress| {
            progress.status = ScanStatus::Completed;
            progress.current_item = None;
        });
        self.broadcast(ScanStreamEvent::ScanCompleted {
            scan_id,
            processed,
            issues_found,
            editions_updated,
        });
        info!(scan_id, issues_found, editions_updated, "scan completed");

        Ok(())
    }

    /// Regenerate an item's edition string; apply it when it differs from
    /// the current one. Returns whether a write happened.
    async fn refresh_edition(
        &self,
        edition_engine: &EditionEngine,
        client: &MediaServerClient,
        item: &MediaItem,
    ) -> Result<bool> {
        let Some(edition) = edition_engine.generate(client, &item.key).await? else {
            return Ok(false);
        };
        if edition.is_empty() {
            return Ok(false);
        }

        let current = item.edition_title.clone().unwrap_or_default();
        if edition == current {
            return Ok(false);
        }

        edition_engine.apply(client, &item.key, &edition).await?;
        Ok(true)
    }

    async fn finalize_cancelled(&self, scan_id: i64) -> Result<()> {
        let scans = self.scans();
        scans.mark_cancelled(scan_id).await?;
        scans
            .append_event(scan_id, ScanEventKind::Cancelled, "Scan was cancelled")
            .await?;
        self.update_progress(|progress| progress.status = ScanStatus::Cancelled);
        self.broadcast(ScanStreamEvent::ScanCancelled { scan_id });
        info!(scan_id, "scan cancelled");
        Ok(())
    }

    /// Pause the running scan. `false` when nothing is running or the scan
    /// is already paused.
    pub async fn pause(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(scan_id) = state.current else {
            return Ok(false);
        };
        if state.paused {
            return Ok(false);
        }

        self.pause.send_replace(false);
        state.paused = true;

        let scans = self.scans();
        scans.set_paused(scan_id).await?;
        scans
            .append_event(scan_id, ScanEventKind::Paused, "Scan paused")
            .await?;
        self.update_progress(|progress| progress.status = ScanStatus::Paused);
        self.broadcast(ScanStreamEvent::ScanPaused { scan_id });
        info!(scan_id, "scan paused");
        Ok(true)
    }

    /// Resume a paused scan. `false` when no scan is paused.
    pub async fn resume(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(scan_id) = state.current else {
            return Ok(false);
        };
        if !state.paused {
            return Ok(false);
        }

        self.pause.send_replace(true);
        state.paused = false;

        let scans = self.scans();
        scans.set_resumed(scan_id).await?;
        scans
            .append_event(scan_id, ScanEventKind::Resumed, "Scan resumed")
            .await?;
        self.update_progress(|progress| progress.status = ScanStatus::Running);
        self.broadcast(ScanStreamEvent::ScanResumed { scan_id });
        info!(scan_id, "scan resumed");
        Ok(true)
    }

    /// Request cancellation. The per-item loop observes the flag at its
    /// next iteration; an in-flight provider or image call finishes first.
    pub async fn cancel(&self) -> Result<bool> {
        let state = self.state.lock().await;
        let Some(scan_id) = state.current else {
            return Ok(false);
        };

        self.cancel.store(true, Ordering::SeqCst);
        // Reopen the gate so a paused scan can observe the flag.
        self.pause.send_replace(true);
        info!(scan_id, "cancel requested");
        Ok(true)
    }

    /// A scan left live by a previous process run, if any.
    pub async fn find_interrupted(&self) -> Result<Option<ScanRecord>> {
        let interrupted = self.scans().find_interrupted().await?;
        if let Some(scan) = &interrupted
            && self.state.lock().await.current == Some(scan.id)
        {
            // The live scan of this process is not "interrupted".
            return Ok(None);
        }
        Ok(interrupted)
    }

    /// Transition an interrupted scan to `cancelled`. Never touches the
    /// scan currently owned by this process.
    pub async fn discard_interrupted(&self, scan_id: i64) -> Result<()> {
        let state = self.state.lock().await;
        if state.current == Some(scan_id) {
            return Err(CoreError::InvalidInput(
                "scan is live; cancel it instead".to_string(),
            ));
        }
        drop(state);

        let scans = self.scans();
        let scan = scans
            .get(scan_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("scan {scan_id}")))?;
        if !scan.status.is_live() {
            return Err(CoreError::InvalidInput(format!(
                "scan {scan_id} is {}, not interrupted",
                scan.status
            )));
        }

        scans.mark_cancelled(scan_id).await?;
        scans
            .append_event(
                scan_id,
                ScanEventKind::Cancelled,
                "Interrupted scan discarded",
            )
            .await?;
        info!(scan_id, "interrupted scan discarded");
        Ok(())
    }
}

fn is_fatal(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::MediaServer(MediaServerError::Unauthorized) | CoreError::Database(_)
    )
}
