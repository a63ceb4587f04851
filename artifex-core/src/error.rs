use thiserror::Error;

use crate::media_server::MediaServerError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    MediaServer(#[from] MediaServerError),

    #[error("media server is not configured")]
    NotConfigured,

    #[error("a scan is already in progress")]
    ScanAlreadyRunning,

    #[error("an interrupted scan must be discarded before a new scan can start")]
    InterruptedScanPending,

    #[error("auto-apply is already in progress")]
    AutoApplyAlreadyRunning,

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
