use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use sunrelay_model::{ChannelId, ChannelMetadata, ChannelState, FeedRecord};
use sunrelay_util::store::{Store, StoreError};

const CHANNELS: &str = "/channels";

#[derive(Debug, Error)]
pub enum TelemetryStoreError {
    #[error("no data available for channel {0}")]
    NoData(ChannelId),

    #[error("failed to persist channel state: {0}")]
    Persist(#[from] StoreError),
}

/// Per channel metadata and feed history
#[derive(Debug)]
pub struct TelemetryStore {
    /// One merge lock per channel, created on first use
    locks: Mutex<HashMap<ChannelId, Arc<AsyncMutex<()>>>>,

    /// Committed snapshots. Readers never see a partially merged state
    states: RwLock<HashMap<ChannelId, ChannelState>>,

    documents: Option<Store>,
}

impl TelemetryStore {
    /// Create a store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            documents: None,
        }
    }

    /// Open a store persisted under `root`, loading every channel found
    /// there
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, TelemetryStoreError> {
        let documents = Store::new(root);

        let mut states = HashMap::new();
        for key in documents.list(CHANNELS).await? {
            let Ok(channel_id) = key.parse::<ChannelId>() else {
                warn!("ignoring unexpected document {key} in channel storage");
                continue;
            };

            if let Some(state) = documents.read::<_, ChannelState>(CHANNELS, &key).await? {
                debug!(
                    "loaded channel {channel_id} with {} feed records",
                    state.feeds.len()
                );
                states.insert(channel_id, state);
            }
        }

        Ok(Self {
            locks: Mutex::new(HashMap::new()),
            states: RwLock::new(states),
            documents: Some(documents),
        })
    }

    fn channel_lock(&self, channel_id: ChannelId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(channel_id).or_default().clone()
    }

    /// Return a copy of the current state of a channel
    pub fn get(&self, channel_id: ChannelId) -> Option<ChannelState> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(&channel_id).cloned()
    }

    /// Return the channel metadata and the most recently appended record
    pub fn latest(
        &self,
        channel_id: ChannelId,
    ) -> Result<(ChannelMetadata, FeedRecord), TelemetryStoreError> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states
            .get(&channel_id)
            .and_then(|state| {
                state
                    .latest()
                    .map(|record| (state.channel.clone(), record.clone()))
            })
            .ok_or(TelemetryStoreError::NoData(channel_id))
    }

    /// Merge feed records into the channel state.
    ///
    /// Records without an entry id are always appended, records with an
    /// entry id are appended only if that id is not already part of the
    /// history. The stored metadata is replaced with `metadata`.
    ///
    /// Merges on the same channel are serialized. If the store is
    /// persistent, the new state is written to disk before it becomes
    /// visible and a write failure leaves the previous state in place.
    ///
    /// Every merge copies the full feed history of the channel and, for a
    /// persistent store, rewrites the whole channel document. History is
    /// never pruned, so the cost of a merge grows with the number of
    /// records kept for the channel.
    pub async fn upsert_merge<I>(
        &self,
        channel_id: ChannelId,
        metadata: ChannelMetadata,
        feeds: I,
    ) -> Result<ChannelState, TelemetryStoreError>
    where
        I: IntoIterator<Item = FeedRecord>,
    {
        self.upsert_merge_with(channel_id, feeds, |_| metadata).await
    }

    /// Merge feed records into the channel state, deriving the new metadata
    /// from the stored one.
    ///
    /// `update` receives the metadata currently stored for the channel, or
    /// `None` for a new channel. It runs while the channel merge lock is
    /// held, so no other merge can land between reading the stored metadata
    /// and replacing it. Deduplication, persistence and cost are the same
    /// as for [`TelemetryStore::upsert_merge`].
    #[instrument(skip_all, fields(channel_id = channel_id, appended = tracing::field::Empty))]
    pub async fn upsert_merge_with<I, F>(
        &self,
        channel_id: ChannelId,
        feeds: I,
        update: F,
    ) -> Result<ChannelState, TelemetryStoreError>
    where
        I: IntoIterator<Item = FeedRecord>,
        F: FnOnce(Option<ChannelMetadata>) -> ChannelMetadata,
    {
        let lock = self.channel_lock(channel_id);
        let _guard = lock.lock().await;

        let (current, mut history) = match self.get(channel_id) {
            Some(ChannelState { channel, feeds }) => (Some(channel), feeds),
            None => (None, Vec::new()),
        };

        let mut known: HashSet<_> = history.iter().filter_map(|r| r.entry_id).collect();
        let before = history.len();
        for record in feeds {
            match record.entry_id {
                // insert returns false if the id was already known
                Some(id) if !known.insert(id) => {}
                _ => history.push(record),
            }
        }
        let state = ChannelState {
            channel: update(current),
            feeds: history,
        };

        let appended = state.feeds.len() - before;
        tracing::Span::current().record("appended", appended);

        if let Some(documents) = &self.documents {
            documents
                .write(CHANNELS, &channel_id.to_string(), &state)
                .await?;
        }

        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.insert(channel_id, state.clone());
        debug!("merged {appended} new feed records");

        Ok(state)
    }
}
