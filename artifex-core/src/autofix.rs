//! Batch auto-apply: pick the best suggestion for each pending issue and
//! write it to the media server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use artifex_model::{ArtworkKind, AutoApplyEvent, AutoApplyOptions, AutoApplyProgress, DefectKind};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config_store::ConfigStore;
use crate::crypto::SecretCipher;
use crate::database::IssueRepository;
use crate::error::{CoreError, Result};
use crate::media_server::MediaServerClient;

/// Process-wide auto-apply engine; one run at a time. Clones share state.
#[derive(Clone)]
pub struct AutoApplyEngine {
    pool: SqlitePool,
    cipher: SecretCipher,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    progress: Arc<RwLock<AutoApplyProgress>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<AutoApplyEvent>>>>,
}

impl AutoApplyEngine {
    pub fn new(pool: SqlitePool, cipher: SecretCipher) -> Self {
        Self {
            pool,
            cipher,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(RwLock::new(AutoApplyProgress::default())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> AutoApplyProgress {
        self.progress.read().unwrap().clone()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AutoApplyEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(AutoApplyEvent::Connected {
            progress: self.progress(),
        });
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn broadcast(&self, event: AutoApplyEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn update_progress<F: FnOnce(&mut AutoApplyProgress)>(&self, update: F) -> AutoApplyProgress {
        let mut progress = self.progress.write().unwrap();
        update(&mut progress);
        progress.clone()
    }

    pub fn cancel(&self) {
        if self.is_running() {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Start a run in the background. `AutoApplyAlreadyRunning` when one
    /// is live.
    pub fn start(&self, options: AutoApplyOptions) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CoreError::AutoApplyAlreadyRunning);
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.update_progress(|progress| *progress = AutoApplyProgress::default());

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.execute(&options).await {
                error!("auto-apply failed: {err}");
            }
            engine.running.store(false, Ordering::SeqCst);
            let progress = engine.progress();
            engine.broadcast(AutoApplyEvent::Completed { progress });
        });

        Ok(())
    }

    /// Run to completion in the caller's task. Used by the scheduler's
    /// commit monitor and by tests that need the final counters.
    pub async fn run_blocking(&self, options: AutoApplyOptions) -> Result<AutoApplyProgress> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CoreError::AutoApplyAlreadyRunning);
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.update_progress(|progress| *progress = AutoApplyProgress::default());

        let result = self.execute(&options).await;
        self.running.store(false, Ordering::SeqCst);
        let progress = self.progress();
        self.broadcast(AutoApplyEvent::Completed {
            progress: progress.clone(),
        });
        result.map(|()| progress)
    }

    async fn execute(&self, options: &AutoApplyOptions) -> Result<()> {
        let issues = IssueRepository::new(self.pool.clone());
        let pending = issues.pending(options.scan_id).await?;

        let total = pending.len() as u64;
        self.update_progress(|progress| progress.total = total);
        self.broadcast(AutoApplyEvent::Started { total });

        if pending.is_empty() {
            return Ok(());
        }

        let store = ConfigStore::new(self.pool.clone(), self.cipher.clone());
        let client = store.media_server_client().await?;

        for issue in pending {
            if self.cancel.load(Ordering::SeqCst) {
                info!("auto-apply cancelled");
                break;
            }

            let mut applied = false;
            let mut failed = false;

            if options.skip_unmatched && issue.defect == DefectKind::NoMatch {
                // Unmatched items have no trustworthy identity; applying
                // artwork could brand the wrong movie.
            } else {
                // Suggestions come back ordered by score descending.
                let suggestions = issues.suggestions(issue.id).await?;
                let best = suggestions
                    .first()
                    .filter(|suggestion| suggestion.score >= options.min_score);

                if let Some(best) = best {
                    match self.apply_artwork(&client, &issue.item_key, best.artwork_kind, &best.image_url).await {
                        Ok(true) => {
                            // Commit immediately so a crash loses at most
                            // this one apply.
                            issues.mark_applied(issue.id, best.id).await?;
                            applied = true;
                        }
                        Ok(false) => failed = true,
                        Err(err) => {
                            error!(issue = issue.id, "auto-apply error: {err}");
                            failed = true;
                        }
                    }
                }
            }

            let progress = self.update_progress(|progress| {
                progress.processed += 1;
                if applied {
                    progress.applied += 1;
                } else if failed {
                    progress.failed += 1;
                } else {
                    progress.skipped += 1;
                }
            });
            self.broadcast(AutoApplyEvent::Progress { progress });
        }

        Ok(())
    }

    /// Upload one artwork and lock the corresponding field. `false` for
    /// artwork kinds the server has no write endpoint for.
    async fn apply_artwork(
        &self,
        client: &MediaServerClient,
        item_key: &str,
        kind: ArtworkKind,
        image_url: &str,
    ) -> Result<bool> {
        match kind {
            ArtworkKind::Poster => {
                client.upload_poster(item_key, image_url).await?;
                if let Err(err) = client.lock_poster(item_key).await {
                    warn!(item_key, "poster applied but lock failed: {err}");
                }
                Ok(true)
            }
            ArtworkKind::Background => {
                client.upload_background(item_key, image_url).await?;
                if let Err(err) = client.lock_background(item_key).await {
                    warn!(item_key, "background applied but lock failed: {err}");
                }
                Ok(true)
            }
            ArtworkKind::Logo => {
                warn!(item_key, "logo application is not supported");
                Ok(false)
            }
        }
    }
}
