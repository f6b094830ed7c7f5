use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, instrument, warn};

use crate::model::{ChannelFeed, ChannelId, ChannelState, sanitize};
use crate::store::{TelemetryStore, TelemetryStoreError};

use super::provider::{FetchError, TelemetryProvider};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] TelemetryStoreError),
}

/// Fetches the latest channel feed and merges it into the store.
///
/// At most one poll runs at any time. Scheduled ticks are skipped while a
/// poll is in flight, manual polls wait for it.
pub struct Poller {
    provider: Arc<dyn TelemetryProvider>,
    store: Arc<TelemetryStore>,
    channel_id: ChannelId,
    in_flight: Mutex<()>,
}

impl Poller {
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        store: Arc<TelemetryStore>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            provider,
            store,
            channel_id,
            in_flight: Mutex::new(()),
        }
    }

    async fn fetch_and_merge(&self) -> Result<ChannelState, PollError> {
        let ChannelFeed { channel, feeds } = self.provider.fetch_latest().await?;
        let records: Vec<_> = feeds.iter().map(sanitize).collect();
        let state = self
            .store
            .upsert_merge(self.channel_id, channel, records)
            .await?;
        Ok(state)
    }

    /// Run a scheduled poll.
    ///
    /// Returns `false` without contacting the provider if another poll is
    /// still in flight. Errors are logged and never returned.
    #[instrument(name = "tick", skip_all)]
    pub async fn tick(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("previous poll still in flight, skipping");
            return false;
        };

        match self.fetch_and_merge().await {
            Ok(state) => debug!("channel has {} feed records", state.feeds.len()),
            Err(e) => warn!("poll failed: {e}"),
        }
        true
    }

    /// Poll immediately, waiting for any in flight poll to finish first
    #[instrument(name = "poll_now", skip_all, err)]
    pub async fn poll_now(&self) -> Result<ChannelState, PollError> {
        let _guard = self.in_flight.lock().await;
        self.fetch_and_merge().await
    }
}

/// Poll the provider every `interval` until `shutdown` is signaled.
///
/// The first poll happens right away. Ticks that come due while a poll is
/// running are dropped, not queued. A poll in progress when shutdown is
/// requested is allowed to finish.
#[instrument(name = "poll", skip_all)]
pub async fn start_poll(
    poller: Arc<Poller>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = interval.max(MIN_POLL_INTERVAL);
    info!("polling every {interval:?}");

    let mut next_tick = Instant::now();
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = sleep_until(next_tick) => {}
        }

        poller.tick().await;

        let now = Instant::now();
        next_tick += interval;
        while next_tick <= now {
            debug!("poll took longer than {interval:?}, skipping tick");
            next_tick += interval;
        }
    }

    info!("stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;
    use tokio::time::sleep;

    use crate::model::{EntryId, Fields};
    use crate::provider::WriteError;

    const CHANNEL: ChannelId = 42;

    #[derive(Default)]
    struct FakeProvider {
        delay: Duration,
        fail_first: u32,
        calls: AtomicU32,
        active: AtomicU32,
        max_active: AtomicU32,
    }

    #[async_trait]
    impl TelemetryProvider for FakeProvider {
        async fn fetch_latest(&self) -> Result<ChannelFeed, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if call <= self.fail_first {
                return Err(FetchError::Timeout);
            }

            Ok(serde_json::from_value(json!({
                "channel": {"id": CHANNEL, "name": "bench"},
                "feeds": [{"entry_id": 100 + call, "field1": "13.1", "field5": null}]
            }))
            .unwrap())
        }

        async fn write_fields(&self, _: &Fields) -> Result<EntryId, WriteError> {
            unreachable!("the poller never writes")
        }
    }

    fn setup(provider: Arc<FakeProvider>) -> (Arc<Poller>, Arc<TelemetryStore>) {
        let store = Arc::new(TelemetryStore::in_memory());
        let poller = Arc::new(Poller::new(provider, store.clone(), CHANNEL));
        (poller, store)
    }

    #[tokio::test]
    async fn test_poll_now_merges_sanitized_feeds() {
        let provider = Arc::new(FakeProvider::default());
        let (poller, store) = setup(provider);

        let state = poller.poll_now().await.unwrap();
        assert_eq!(state.channel.name.as_deref(), Some("bench"));

        let (_, latest) = store.latest(CHANNEL).unwrap();
        assert_eq!(latest.entry_id, Some(101));
        assert_eq!(latest.fields.field1, "13.1");
        assert_eq!(latest.fields.field5, "0");
        assert_eq!(latest.fields.field8, "0");
    }

    #[tokio::test]
    async fn test_poll_now_reports_errors() {
        let provider = Arc::new(FakeProvider {
            fail_first: 1,
            ..Default::default()
        });
        let (poller, store) = setup(provider);

        let res = poller.poll_now().await;
        assert!(matches!(res, Err(PollError::Fetch(FetchError::Timeout))));
        assert!(store.get(CHANNEL).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_survives_failed_ticks() {
        let provider = Arc::new(FakeProvider {
            fail_first: 1,
            ..Default::default()
        });
        let (poller, store) = setup(provider.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(start_poll(
            poller,
            Duration::from_secs(15),
            shutdown_rx,
        ));

        // first tick at 0s fails, second at 15s succeeds
        sleep(Duration::from_secs(20)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let (_, latest) = store.latest(CHANNEL).unwrap();
        assert_eq!(latest.entry_id, Some(102));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_survives_store_failures() {
        let dir = tempdir().unwrap();
        let store = Arc::new(TelemetryStore::open(dir.path()).await.unwrap());

        // a file where the channel collection should be makes every write fail
        std::fs::write(dir.path().join("channels"), b"").unwrap();

        let provider = Arc::new(FakeProvider::default());
        let poller = Arc::new(Poller::new(provider.clone(), store.clone(), CHANNEL));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(start_poll(
            poller,
            Duration::from_secs(15),
            shutdown_rx,
        ));

        // ticks at 0s and 15s both fail to persist
        sleep(Duration::from_secs(20)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(store.get(CHANNEL).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_poll_waits_for_scheduled_tick() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(10),
            ..Default::default()
        });
        let (poller, store) = setup(provider.clone());

        let start = Instant::now();
        let tick = tokio::spawn({
            let poller = poller.clone();
            async move { poller.tick().await }
        });
        sleep(Duration::from_secs(1)).await;

        let state = poller.poll_now().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(20));
        assert!(tick.await.unwrap());

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);

        let ids: Vec<_> = state.feeds.iter().map(|r| r.entry_id).collect();
        assert_eq!(ids, vec![Some(101), Some(102)]);
        assert_eq!(store.get(CHANNEL), Some(state));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_skips_overdue_ticks() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(40),
            ..Default::default()
        });
        let (poller, _) = setup(provider.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(start_poll(
            poller,
            Duration::from_secs(15),
            shutdown_rx,
        ));

        // polls start at 0s, 45s and 90s, the one in flight at shutdown
        // finishes before the loop exits
        sleep(Duration::from_secs(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(provider.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_tick_is_skipped_during_manual_poll() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(10),
            ..Default::default()
        });
        let (poller, _) = setup(provider.clone());

        let manual = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_now().await }
        });
        sleep(Duration::from_secs(1)).await;

        assert!(!poller.tick().await);
        assert!(manual.await.unwrap().is_ok());
        assert!(poller.tick().await);

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_stops_when_shutdown_sender_is_dropped() {
        let provider = Arc::new(FakeProvider::default());
        let (poller, _) = setup(provider.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(start_poll(
            poller,
            Duration::from_secs(15),
            shutdown_rx,
        ));
        sleep(Duration::from_secs(1)).await;
        drop(shutdown_tx);
        handle.await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
