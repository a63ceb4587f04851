//! Auto-apply selection policy and per-item commit behavior.

mod common;

use std::time::Duration;

use artifex_core::database::{IssueRepository, ScanRepository, connect_in_memory};
use artifex_core::detector::ArtworkIssue;
use artifex_core::providers::ArtworkCandidate;
use artifex_core::{AutoApplyEngine, ConfigStore, CoreError, SecretCipher};
use artifex_model::{
    ArtworkKind, ArtworkSource, AutoApplyOptions, DefectKind, ExternalIds, IssueStatus, MediaKind,
    ScanKind,
};
use sqlx::SqlitePool;

use common::{FakeServer, spawn};

fn issue(item_key: &str, title: &str, defect: DefectKind) -> ArtworkIssue {
    ArtworkIssue {
        defect,
        item_key: item_key.to_string(),
        item_guid: Some(format!("plex://movie/{item_key}")),
        title: title.to_string(),
        year: Some(1999),
        media_kind: MediaKind::Movie,
        library: "Movies".to_string(),
        external_ids: ExternalIds {
            tmdb: Some("603".to_string()),
            ..ExternalIds::default()
        },
        details: None,
    }
}

fn poster_candidate(score: i64, url: &str) -> ArtworkCandidate {
    ArtworkCandidate {
        source: ArtworkSource::Tmdb,
        artwork_kind: ArtworkKind::Poster,
        image_url: url.to_string(),
        thumbnail_url: None,
        language: Some("en".to_string()),
        score,
        set_name: None,
        creator: None,
    }
}

async fn seeded_pool(server_url: &str) -> (SqlitePool, SecretCipher, i64) {
    let pool = connect_in_memory().await.unwrap();
    let cipher = SecretCipher::from_passphrase("test");
    ConfigStore::new(pool.clone(), cipher.clone())
        .set_media_server_config(server_url, "token", "Fake Server")
        .await
        .unwrap();

    let scan_id = ScanRepository::new(pool.clone())
        .create(ScanKind::Artwork, "{}", "manual")
        .await
        .unwrap();
    (pool, cipher, scan_id)
}

#[tokio::test]
async fn min_score_gates_application() {
    let server = FakeServer::new("Movies", vec![]);
    let url = spawn(server.clone()).await;
    let (pool, cipher, scan_id) = seeded_pool(&url).await;

    let issues = IssueRepository::new(pool.clone());
    let issue_a = issues
        .insert(scan_id, &issue("100", "Strong Match", DefectKind::NoPoster))
        .await
        .unwrap();
    issues
        .insert_suggestions(
            issue_a,
            &[poster_candidate(70, "https://img/high.jpg"), poster_candidate(20, "https://img/low.jpg")],
        )
        .await
        .unwrap();

    let issue_b = issues
        .insert(scan_id, &issue("101", "Weak Match", DefectKind::NoPoster))
        .await
        .unwrap();
    issues
        .insert_suggestions(issue_b, &[poster_candidate(30, "https://img/weak.jpg")])
        .await
        .unwrap();

    let engine = AutoApplyEngine::new(pool.clone(), cipher);
    let progress = engine
        .run_blocking(AutoApplyOptions {
            scan_id: Some(scan_id),
            skip_unmatched: true,
            min_score: 50,
        })
        .await
        .unwrap();

    assert_eq!(progress.processed, 2);
    assert_eq!(progress.applied, 1);
    assert_eq!(progress.skipped, 1);
    assert_eq!(progress.failed, 0);

    // A was applied with its best suggestion and the field locked.
    let record_a = issues.get_with_suggestions(issue_a).await.unwrap().unwrap();
    assert_eq!(record_a.issue.status, IssueStatus::Applied);
    assert!(record_a.issue.resolved_at.is_some());
    let selected: Vec<_> = record_a
        .suggestions
        .iter()
        .filter(|suggestion| suggestion.is_selected)
        .collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].image_url, "https://img/high.jpg");

    let uploads = server.requests_matching("POST", "/library/metadata/100/posters");
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].contains("url=https"));
    let locks = server.requests_matching("PUT", "/library/metadata/100");
    assert!(locks.iter().any(|request| request.contains("thumb.locked=1")));

    // B stayed pending and the server never heard about it.
    let record_b = issues.get(issue_b).await.unwrap().unwrap();
    assert_eq!(record_b.status, IssueStatus::Pending);
    assert!(server.requests_matching("POST", "/library/metadata/101/posters").is_empty());
}

#[tokio::test]
async fn unmatched_issues_are_skipped() {
    let server = FakeServer::new("Movies", vec![]);
    let url = spawn(server.clone()).await;
    let (pool, cipher, scan_id) = seeded_pool(&url).await;

    let issues = IssueRepository::new(pool.clone());
    let unmatched = issues
        .insert(scan_id, &issue("200", "Unknown", DefectKind::NoMatch))
        .await
        .unwrap();
    issues
        .insert_suggestions(unmatched, &[poster_candidate(95, "https://img/wrong.jpg")])
        .await
        .unwrap();

    let engine = AutoApplyEngine::new(pool.clone(), cipher);
    let progress = engine
        .run_blocking(AutoApplyOptions {
            scan_id: Some(scan_id),
            skip_unmatched: true,
            min_score: 0,
        })
        .await
        .unwrap();

    assert_eq!(progress.skipped, 1);
    assert_eq!(progress.applied, 0);
    assert_eq!(
        issues.get(unmatched).await.unwrap().unwrap().status,
        IssueStatus::Pending
    );
    assert!(server.requests_matching("POST", "/library/metadata/200/posters").is_empty());
}

#[tokio::test]
async fn issues_without_suggestions_are_skipped() {
    let server = FakeServer::new("Movies", vec![]);
    let url = spawn(server).await;
    let (pool, cipher, scan_id) = seeded_pool(&url).await;

    let issues = IssueRepository::new(pool.clone());
    issues
        .insert(scan_id, &issue("300", "Bare", DefectKind::NoBackground))
        .await
        .unwrap();

    let engine = AutoApplyEngine::new(pool.clone(), cipher);
    let progress = engine
        .run_blocking(AutoApplyOptions::default())
        .await
        .unwrap();

    assert_eq!(progress.processed, 1);
    assert_eq!(progress.skipped, 1);
}

#[tokio::test]
async fn only_one_run_at_a_time() {
    let server = FakeServer::new("Movies", vec![]);
    let url = spawn(server).await;
    let (pool, cipher, scan_id) = seeded_pool(&url).await;

    let issues = IssueRepository::new(pool.clone());
    for index in 0..5 {
        let id = issues
            .insert(scan_id, &issue(&format!("4{index}"), "Movie", DefectKind::NoPoster))
            .await
            .unwrap();
        issues
            .insert_suggestions(id, &[poster_candidate(80, "https://img/p.jpg")])
            .await
            .unwrap();
    }

    let engine = AutoApplyEngine::new(pool.clone(), cipher);
    engine.start(AutoApplyOptions::default()).unwrap();
    assert!(matches!(
        engine.start(AutoApplyOptions::default()),
        Err(CoreError::AutoApplyAlreadyRunning)
    ));

    for _ in 0..200 {
        if !engine.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!engine.is_running());
    assert_eq!(engine.progress().applied, 5);
}
