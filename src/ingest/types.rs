// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One upcoming meetup event as returned by the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub time: i64, // unix millis, UTC
}

/// Why a single source could not be fetched this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no data for source '{0}'")]
    UnknownSource(String),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
            Self::UnknownSource(_) => "unknown_source",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Retrieves upcoming events for one source (meetup group).
///
/// Implementations return events in upstream order and never retry.
#[async_trait::async_trait]
pub trait EventProvider: Send + Sync {
    async fn fetch_events(&self, source: &str) -> Result<Vec<Event>, FetchError>;
    fn name(&self) -> &'static str;
}
