//! Scheduler behavior: run-now triggering and the monitor-and-commit link
//! between scans and auto-apply.

mod common;

use std::time::Duration;

use artifex_core::database::schedules::{ScheduleDraft, ScheduleRepository};
use artifex_core::database::{IssueRepository, ScanRepository, connect_in_memory};
use artifex_core::detector::ArtworkIssue;
use artifex_core::providers::ArtworkCandidate;
use artifex_core::{AutoApplyEngine, ConfigStore, ScanEngine, Scheduler, SecretCipher};
use artifex_model::{
    ArtworkKind, ArtworkSource, AutoApplyOptions, DefectKind, ExternalIds, IssueStatus, MediaKind,
    ScanKind, ScanStatus,
};
use sqlx::SqlitePool;

use common::{FakeServer, spawn};

struct Harness {
    pool: SqlitePool,
    scheduler: Scheduler,
    server: FakeServer,
}

async fn harness(items: Vec<serde_json::Value>) -> Harness {
    let server = FakeServer::new("Movies", items);
    let url = spawn(server.clone()).await;

    let pool = connect_in_memory().await.unwrap();
    let cipher = SecretCipher::from_passphrase("test");
    ConfigStore::new(pool.clone(), cipher.clone())
        .set_media_server_config(&url, "token", "Fake Server")
        .await
        .unwrap();

    let scan_engine = ScanEngine::new(pool.clone(), cipher.clone());
    let auto_apply = AutoApplyEngine::new(pool.clone(), cipher);
    let scheduler = Scheduler::new(pool.clone(), scan_engine, auto_apply)
        .with_poll_interval(Duration::from_millis(20));

    Harness {
        pool,
        scheduler,
        server,
    }
}

fn poster_issue(item_key: &str, score: i64) -> (ArtworkIssue, ArtworkCandidate) {
    (
        ArtworkIssue {
            defect: DefectKind::NoPoster,
            item_key: item_key.to_string(),
            item_guid: Some(format!("plex://movie/{item_key}")),
            title: format!("Movie {item_key}"),
            year: Some(2001),
            media_kind: MediaKind::Movie,
            library: "Movies".to_string(),
            external_ids: ExternalIds {
                tmdb: Some("603".to_string()),
                ..ExternalIds::default()
            },
            details: None,
        },
        ArtworkCandidate {
            source: ArtworkSource::Tmdb,
            artwork_kind: ArtworkKind::Poster,
            image_url: format!("https://img/{item_key}.jpg"),
            thumbnail_url: None,
            language: None,
            score,
            set_name: None,
            creator: None,
        },
    )
}

#[tokio::test]
async fn monitor_commits_after_completed_scan() {
    let harness = harness(vec![]).await;
    let scans = ScanRepository::new(harness.pool.clone());
    let issues = IssueRepository::new(harness.pool.clone());

    let scan_id = scans.create(ScanKind::Artwork, "{}", "schedule:1").await.unwrap();

    let (strong, strong_suggestion) = poster_issue("700", 70);
    let strong_id = issues.insert(scan_id, &strong).await.unwrap();
    issues
        .insert_suggestions(strong_id, &[strong_suggestion])
        .await
        .unwrap();

    let (weak, weak_suggestion) = poster_issue("701", 30);
    let weak_id = issues.insert(scan_id, &weak).await.unwrap();
    issues
        .insert_suggestions(weak_id, &[weak_suggestion])
        .await
        .unwrap();

    scans.mark_completed(scan_id, 2, 2, 0).await.unwrap();

    harness
        .scheduler
        .monitor_and_commit(
            scan_id,
            AutoApplyOptions {
                scan_id: None,
                skip_unmatched: true,
                min_score: 50,
            },
        )
        .await;

    assert_eq!(
        issues.get(strong_id).await.unwrap().unwrap().status,
        IssueStatus::Applied
    );
    assert_eq!(
        issues.get(weak_id).await.unwrap().unwrap().status,
        IssueStatus::Pending
    );
    assert_eq!(
        harness
            .server
            .requests_matching("POST", "/library/metadata/700/posters")
            .len(),
        1
    );
}

#[tokio::test]
async fn monitor_skips_commit_for_cancelled_scan() {
    let harness = harness(vec![]).await;
    let scans = ScanRepository::new(harness.pool.clone());
    let issues = IssueRepository::new(harness.pool.clone());

    let scan_id = scans.create(ScanKind::Artwork, "{}", "schedule:1").await.unwrap();
    let (issue, suggestion) = poster_issue("800", 90);
    let issue_id = issues.insert(scan_id, &issue).await.unwrap();
    issues.insert_suggestions(issue_id, &[suggestion]).await.unwrap();

    scans.mark_cancelled(scan_id).await.unwrap();

    harness
        .scheduler
        .monitor_and_commit(scan_id, AutoApplyOptions::default())
        .await;

    assert_eq!(
        issues.get(issue_id).await.unwrap().unwrap().status,
        IssueStatus::Pending
    );
    assert!(
        harness
            .server
            .requests_matching("POST", "/library/metadata/800/posters")
            .is_empty()
    );
}

#[tokio::test]
async fn run_now_starts_a_scan_attributed_to_the_schedule() {
    let harness = harness(vec![]).await;
    let repo = ScheduleRepository::new(harness.pool.clone());

    let schedule = repo
        .create(&ScheduleDraft {
            name: "nightly".to_string(),
            cron_expression: "0 3 * * *".to_string(),
            scan_kind: ScanKind::Artwork,
            config_json: "{}".to_string(),
            auto_commit: false,
            auto_commit_options_json: None,
        })
        .await
        .unwrap();

    harness.scheduler.run_now(schedule.id).await.unwrap();

    let scans = ScanRepository::new(harness.pool.clone());
    let mut latest = None;
    for _ in 0..200 {
        latest = scans.latest().await.unwrap();
        if latest
            .as_ref()
            .is_some_and(|scan| scan.status.is_terminal())
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let scan = latest.expect("scheduled scan row");
    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.triggered_by, format!("schedule:{}", schedule.id));
    assert_eq!(scan.kind, ScanKind::Artwork);

    let updated = repo.get(schedule.id).await.unwrap().unwrap();
    assert!(updated.last_run_at.is_some());
    assert!(updated.next_run_at.is_some());
}
