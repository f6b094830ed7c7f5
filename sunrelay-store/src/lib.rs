//! Channel state storage.
//!
//! [`TelemetryStore`] owns the state of every known channel: its metadata
//! and the append-ordered feed history. The only way to mutate a channel is
//! [`TelemetryStore::upsert_merge`], which is serialized per channel, so
//! merges coming from the poll loop and from relay commands never
//! interleave.
//!
//! The store can be purely in memory or backed by a directory, in which
//! case each channel is kept as one JSON document that is atomically
//! replaced on every merge.
//!
//! # Example
//!
//! ```ignore
//! use sunrelay_model::{ChannelMetadata, FeedRecord};
//! use sunrelay_store::TelemetryStore;
//!
//! let store = TelemetryStore::in_memory();
//! let state = store
//!     .upsert_merge(42, ChannelMetadata::new(42), Vec::<FeedRecord>::new())
//!     .await
//!     .unwrap();
//! assert!(state.feeds.is_empty());
//! ```

mod telemetry;

pub use telemetry::{TelemetryStore, TelemetryStoreError};
