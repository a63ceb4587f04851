//! Typed client for the media server's HTTP API.

mod client;
mod types;

pub use client::{MediaServerClient, create_pin, check_pin, resources};
pub use types::{AvailableArt, Library, MediaItem, PinResource, ServerInfo};

use thiserror::Error;

/// Failure taxonomy for media server requests.
#[derive(Error, Debug)]
pub enum MediaServerError {
    #[error("media server rejected the token")]
    Unauthorized,

    #[error("cannot reach media server: {0}")]
    Unreachable(String),

    #[error("media server API error: status {0}")]
    Protocol(u16),

    #[error("unexpected media server response: {0}")]
    Decode(String),

    #[error("http client error: {0}")]
    Http(String),
}

impl MediaServerError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unreachable("request timed out".to_string())
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
