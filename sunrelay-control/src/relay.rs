use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{Instrument, Span, debug, error, field, info, instrument};

use crate::model::{
    ChannelFeed, ChannelId, ChannelMetadata, EntryId, FeedRecord, FieldNumber, Fields, sanitize,
};
use crate::remote::{FetchError, TelemetryProvider, WriteError};
use crate::store::TelemetryStore;

use super::command::{InvalidCommand, RelayCommand};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    InvalidCommand(#[from] InvalidCommand),

    #[error("another relay command is in progress")]
    CommandInProgress,

    #[error("failed to read the current channel state: {0}")]
    UpstreamUnavailable(#[source] FetchError),

    #[error("failed to write relay state: {0}")]
    CommandFailed(#[source] WriteError),

    #[error("relay command was interrupted")]
    Interrupted,
}

/// Result of an applied relay command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub field: FieldNumber,
    pub value: u8,
    pub entry_id: EntryId,

    /// The full field snapshot written to the provider
    pub fields: Fields,
}

// Steps of a relay command, recorded on the command span
#[derive(Debug, Clone, Copy)]
enum Step {
    Reading,
    Writing,
    Settling,
    Merging,
}

fn enter(step: Step) {
    Span::current().record("step", field::debug(step));
    debug!("{step:?}");
}

/// Applies relay commands to the remote device.
///
/// Only one command runs at a time, commands arriving while another is
/// running are rejected with [`RelayError::CommandInProgress`]. The guard
/// is held until the settle delay has passed and the written entry has
/// been merged into the store.
#[derive(Clone)]
pub struct RelayController {
    provider: Arc<dyn TelemetryProvider>,
    store: Arc<TelemetryStore>,
    channel_id: ChannelId,
    settle_delay: Duration,
    guard: Arc<Mutex<()>>,
}

impl RelayController {
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        store: Arc<TelemetryStore>,
        channel_id: ChannelId,
        settle_delay: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            channel_id,
            settle_delay,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Set relay `field` to `value`.
    ///
    /// Invalid commands are rejected before contacting the provider. Once
    /// accepted, the command runs on its own task and completes even if
    /// the returned future is dropped.
    pub async fn toggle(&self, field: i64, value: i64) -> Result<RelayOutcome, RelayError> {
        let command = RelayCommand::try_new(field, value)?;

        let Ok(guard) = self.guard.clone().try_lock_owned() else {
            return Err(RelayError::CommandInProgress);
        };

        let controller = self.clone();
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                controller.apply(command).await
            }
            .instrument(Span::current()),
        );

        match task.await {
            Ok(res) => res,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(RelayError::Interrupted),
        }
    }

    /// Wait until no relay command is running.
    ///
    /// Commands are not rejected after this returns, callers stop accepting
    /// new commands first.
    pub async fn wait_idle(&self) {
        let _guard = self.guard.lock().await;
    }

    #[instrument(
        name = "relay",
        skip_all,
        fields(field = %command.field, value = command.value, step = field::Empty)
    )]
    async fn apply(&self, command: RelayCommand) -> Result<RelayOutcome, RelayError> {
        enter(Step::Reading);
        let ChannelFeed { channel, feeds } = self
            .provider
            .fetch_latest()
            .await
            .map_err(RelayError::UpstreamUnavailable)?;

        // the provider answers with an empty feed list for a new channel
        let mut fields = feeds
            .last()
            .map(|raw| sanitize(raw).fields)
            .unwrap_or_default();

        enter(Step::Writing);
        fields.set(command.field, command.value.to_string());
        let entry_id = self
            .provider
            .write_fields(&fields)
            .await
            .map_err(RelayError::CommandFailed)?;
        info!("entry {entry_id} written");

        enter(Step::Settling);
        sleep(self.settle_delay).await;

        enter(Step::Merging);
        let now = Utc::now();
        let record = FeedRecord {
            created_at: now,
            entry_id: Some(entry_id),
            fields: fields.clone(),
        };
        // a poll may have merged newer metadata while settling
        let refresh = |current: Option<ChannelMetadata>| {
            let mut channel = current.unwrap_or(channel);
            channel.last_entry_id = channel.last_entry_id.max(Some(entry_id));
            channel.updated_at = Some(now);
            channel
        };
        if let Err(e) = self
            .store
            .upsert_merge_with(self.channel_id, [record], refresh)
            .await
        {
            // the device already has the new state, the next poll will
            // bring the store up to date
            error!("failed to merge entry {entry_id}: {e}");
        }

        Ok(RelayOutcome {
            field: command.field,
            value: command.value,
            entry_id,
            fields,
        })
    }
}
