//! sqlx persistence layer: pool construction, embedded migrations, and one
//! repository per aggregate.

pub mod editions;
pub mod issues;
pub mod scans;
pub mod schedules;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;

pub use editions::EditionRepository;
pub use issues::IssueRepository;
pub use scans::ScanRepository;
pub use schedules::ScheduleRepository;

/// Open (creating if missing) the database at `url` and run migrations.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// An isolated in-memory database with the schema applied. A single
/// connection is pinned so every checkout sees the same memory store.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
