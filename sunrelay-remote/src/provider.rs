use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ChannelFeed, EntryId, Fields};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("channel not found")]
    NotFound,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: String },
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("write timed out")]
    Timeout,

    #[error("write rejected after {attempts} attempts: {last}")]
    Rejected { attempts: u32, last: String },
}

/// A remote source of channel telemetry that accepts relay writes
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Read the channel metadata and the most recent feed entry
    async fn fetch_latest(&self) -> Result<ChannelFeed, FetchError>;

    /// Write a full snapshot of the eight channel fields, returning the
    /// entry id assigned by the provider
    async fn write_fields(&self, fields: &Fields) -> Result<EntryId, WriteError>;
}
