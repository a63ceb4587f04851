//! Cron-driven scan schedules.
//!
//! One background task per enabled schedule sleeps until the next cron
//! fire, starts a scan, and optionally monitors it to run auto-apply once
//! the scan reaches a terminal state.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artifex_model::{AutoApplyOptions, ScanConfig, ScanStatus, ScheduleRecord};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::autofix::AutoApplyEngine;
use crate::database::{ScanRepository, ScheduleRepository};
use crate::error::{CoreError, Result};
use crate::scan::ScanEngine;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Parse a 5-field crontab expression. The underlying parser wants a
/// seconds field, so one is prepended.
pub fn parse_crontab(expression: &str) -> Result<cron::Schedule> {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() != 5 {
        return Err(CoreError::InvalidCron(format!(
            "expected 5 fields: {expression}"
        )));
    }
    cron::Schedule::from_str(&format!("0 {trimmed}"))
        .map_err(|err| CoreError::InvalidCron(format!("{expression}: {err}")))
}

/// Next fire time for a 5-field crontab expression.
pub fn next_fire(expression: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(parse_crontab(expression)?.upcoming(Utc).next())
}

/// Process-wide schedule runner. Clones share the registered job set.
#[derive(Clone)]
pub struct Scheduler {
    pool: SqlitePool,
    scan_engine: ScanEngine,
    auto_apply: AutoApplyEngine,
    jobs: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(pool: SqlitePool, scan_engine: ScanEngine, auto_apply: AutoApplyEngine) -> Self {
        Self {
            pool,
            scan_engine,
            auto_apply,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Shorten the commit-monitor poll interval (tests).
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn schedules(&self) -> ScheduleRepository {
        ScheduleRepository::new(self.pool.clone())
    }

    /// Load enabled schedules and register one job per schedule.
    pub async fn start(&self) -> Result<()> {
        let schedules = self.schedules().enabled().await?;
        let count = schedules.len();
        for schedule in schedules {
            if let Err(err) = self.add_job(&schedule).await {
                error!(schedule = schedule.id, "failed to register schedule: {err}");
            }
        }
        info!(count, "scheduler started");
        Ok(())
    }

    /// Register (or replace) the job for a schedule.
    pub async fn add_job(&self, schedule: &ScheduleRecord) -> Result<()> {
        let cron_schedule = parse_crontab(&schedule.cron_expression)?;

        let next = cron_schedule.upcoming(Utc).next();
        self.schedules().set_next_run(schedule.id, next).await?;

        let scheduler = self.clone();
        let schedule_id = schedule.id;
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = cron_schedule.upcoming(Utc).next() else {
                    warn!(schedule_id, "cron expression yields no future fires");
                    break;
                };
                let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
                scheduler.fire(schedule_id).await;
            }
        });

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.insert(schedule_id, handle) {
            old.abort();
        }
        info!(
            schedule_id,
            cron = %schedule.cron_expression,
            "registered scheduled scan"
        );
        Ok(())
    }

    pub fn remove_job(&self, schedule_id: i64) {
        if let Some(handle) = self.jobs.lock().unwrap().remove(&schedule_id) {
            handle.abort();
            info!(schedule_id, "removed scheduled scan");
        }
    }

    /// Re-read a schedule and add or remove its job to match.
    pub async fn refresh_job(&self, schedule_id: i64) -> Result<()> {
        match self.schedules().get(schedule_id).await? {
            Some(schedule) if schedule.enabled => self.add_job(&schedule).await,
            _ => {
                self.remove_job(schedule_id);
                Ok(())
            }
        }
    }

    /// Trigger a schedule immediately, outside its cron cadence.
    pub async fn run_now(&self, schedule_id: i64) -> Result<()> {
        let schedule = self
            .schedules()
            .get(schedule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("schedule {schedule_id}")))?;
        self.trigger(&schedule).await
    }

    async fn fire(&self, schedule_id: i64) {
        let schedule = match self.schedules().get(schedule_id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                self.remove_job(schedule_id);
                return;
            }
            Err(err) => {
                error!(schedule_id, "failed to load schedule: {err}");
                return;
            }
        };

        if let Err(err) = self.trigger(&schedule).await {
            warn!(schedule_id, "scheduled scan did not start: {err}");
        }
    }

    async fn trigger(&self, schedule: &ScheduleRecord) -> Result<()> {
        info!(schedule = schedule.id, name = %schedule.name, "executing scheduled scan");

        let next = next_fire(&schedule.cron_expression).ok().flatten();
        self.schedules().touch_last_run(schedule.id, next).await?;

        let mut config: ScanConfig =
            serde_json::from_str(&schedule.config).unwrap_or_default();
        config.kind = schedule.scan_kind;

        let triggered_by = format!("schedule:{}", schedule.id);
        let scan_id = self.scan_engine.start_scan(config, &triggered_by).await?;

        if schedule.auto_commit {
            let options: AutoApplyOptions = schedule
                .auto_commit_options
                .as_deref()
                .and_then(|options| serde_json::from_str(options).ok())
                .unwrap_or_default();

            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.monitor_and_commit(scan_id, options).await;
            });
        }

        Ok(())
    }

    /// Poll the scan until it is terminal, then run auto-apply scoped to
    /// it. Failed and cancelled scans skip the commit.
    pub async fn monitor_and_commit(&self, scan_id: i64, options: AutoApplyOptions) {
        let scans = ScanRepository::new(self.pool.clone());

        loop {
            tokio::time::sleep(self.poll_interval).await;

            let scan = match scans.get(scan_id).await {
                Ok(Some(scan)) => scan,
                Ok(None) => return,
                Err(err) => {
                    error!(scan_id, "commit monitor lost the scan: {err}");
                    return;
                }
            };

            if !scan.status.is_terminal() {
                continue;
            }

            if scan.status != ScanStatus::Completed {
                info!(scan_id, status = %scan.status, "skipping auto-commit");
                return;
            }

            info!(scan_id, "scan completed, running auto-commit");
            let options = AutoApplyOptions {
                scan_id: Some(scan_id),
                ..options
            };
            if let Err(err) = self.auto_apply.run_blocking(options).await {
                error!(scan_id, "auto-commit failed: {err}");
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expressions_parse() {
        assert!(parse_crontab("0 3 * * *").is_ok());
        assert!(parse_crontab("*/15 * * * 1-5").is_ok());
        assert!(parse_crontab("30 2 1 * *").is_ok());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert!(matches!(
            parse_crontab("not a cron"),
            Err(CoreError::InvalidCron(_))
        ));
        assert!(matches!(
            parse_crontab("0 3 * *"),
            Err(CoreError::InvalidCron(_))
        ));
        assert!(matches!(
            parse_crontab("0 0 0 3 * * *"),
            Err(CoreError::InvalidCron(_))
        ));
        assert!(matches!(
            parse_crontab("61 3 * * *"),
            Err(CoreError::InvalidCron(_))
        ));
    }

    #[test]
    fn next_fire_is_in_the_future() {
        let next = next_fire("0 3 * * *").unwrap().unwrap();
        assert!(next > Utc::now());
    }
}
