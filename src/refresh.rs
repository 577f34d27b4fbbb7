//! Background task that keeps story statistics current.
//!
//! One task owns the [`StatsAggregator`]. Timer ticks, manual triggers and
//! target changes are handled one at a time in its loop, so two recomputes
//! never overlap. A manual trigger arriving mid-refresh is queued once;
//! further triggers are coalesced into it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::catalog::GeoCatalog;
use crate::error::{StatsError, StatsResult};
use crate::source::EventSource;
use crate::stats::{StatsAggregator, StatsSettings, StatsSnapshot, StatsTarget};

/// Advisory errors kept for a consumer that is not draining them.
const ERROR_BUFFER: usize = 16;

/// What a consumer sees: the last good snapshot plus refresh health.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsStatus {
    pub snapshot: Option<StatsSnapshot>,
    /// Most recent failure, cleared by the next success
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<StatsError>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub cycles: u64,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<StatsError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Why a cycle ran; only used for logging.
#[derive(Debug, Clone, Copy)]
enum Reason {
    Tick,
    Manual,
    Target,
}

/// Client side of a running refresher.
pub struct StatsHandle {
    status_rx: watch::Receiver<StatsStatus>,
    target_tx: watch::Sender<Option<StatsTarget>>,
    trigger_tx: flume::Sender<()>,
    errors_rx: flume::Receiver<StatsError>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl StatsHandle {
    /// Latest published status.
    pub fn status(&self) -> StatsStatus {
        self.status_rx.borrow().clone()
    }

    /// Latest good snapshot, if any cycle has succeeded.
    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        self.status_rx.borrow().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatsStatus> {
        self.status_rx.clone()
    }

    /// Advisory channel of refresh failures.
    pub fn errors(&self) -> flume::Receiver<StatsError> {
        self.errors_rx.clone()
    }

    /// Bind the stats to a new sibling set, or unbind with `None`.
    ///
    /// Triggers a refresh; the latest target wins if several arrive while a
    /// fetch is in flight.
    pub fn set_target(&self, target: Option<StatsTarget>) {
        self.target_tx.send_if_modified(|current| {
            if *current == target {
                false
            } else {
                *current = target;
                true
            }
        });
    }

    /// Request an immediate refresh. Returns `false` when an earlier request
    /// is still pending and this one was folded into it.
    pub fn refresh_now(&self) -> StatsResult<bool> {
        match self.trigger_tx.try_send(()) {
            Ok(()) => Ok(true),
            Err(flume::TrySendError::Full(())) => {
                debug!("Manual refresh coalesced with pending request");
                Ok(false)
            }
            Err(flume::TrySendError::Disconnected(())) => Err(StatsError::ShutDown),
        }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            debug!(error = %e, "Stats refresher join failed");
        }
    }
}

/// The background refresh loop.
pub struct StatsRefresher {
    aggregator: StatsAggregator,
    status_tx: watch::Sender<StatsStatus>,
    target_rx: watch::Receiver<Option<StatsTarget>>,
    trigger_rx: flume::Receiver<()>,
    errors_tx: flume::Sender<StatsError>,
    shutdown_rx: broadcast::Receiver<()>,
    cycles: u64,
}

impl StatsRefresher {
    /// Spawn the refresher on the current tokio runtime.
    ///
    /// The first cycle runs immediately, then every `refresh_interval`.
    pub fn spawn(
        catalog: Arc<GeoCatalog>,
        source: Arc<dyn EventSource>,
        settings: StatsSettings,
        initial_target: Option<StatsTarget>,
    ) -> StatsHandle {
        let (status_tx, status_rx) = watch::channel(StatsStatus::default());
        let (target_tx, target_rx) = watch::channel(initial_target);
        let (trigger_tx, trigger_rx) = flume::bounded(1);
        let (errors_tx, errors_rx) = flume::bounded(ERROR_BUFFER);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let refresher = Self {
            aggregator: StatsAggregator::new(catalog, source, settings),
            status_tx,
            target_rx,
            trigger_rx,
            errors_tx,
            shutdown_rx,
            cycles: 0,
        };

        let task = tokio::spawn(async move {
            refresher.run().await;
        });

        StatsHandle {
            status_rx,
            target_tx,
            trigger_tx,
            errors_rx,
            shutdown_tx,
            task,
        }
    }

    async fn run(mut self) {
        let period = self.aggregator.settings().refresh_interval;
        info!(interval_secs = period.as_secs(), "Stats refresher started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Stats refresher shutting down");
                    break;
                }
                _ = interval.tick() => self.cycle(Reason::Tick).await,
                Ok(()) = self.trigger_rx.recv_async() => self.cycle(Reason::Manual).await,
                Ok(()) = self.target_rx.changed() => self.cycle(Reason::Target).await,
            }
        }
    }

    async fn cycle(&mut self, reason: Reason) {
        if self.target_rx.borrow().is_none() {
            debug!(?reason, "No stats target bound, skipping refresh");
            return;
        }

        self.cycles += 1;
        let now = Utc::now();
        debug!(?reason, cycle = self.cycles, "Refreshing stats");

        match self.aggregator.fetch_window(now).await {
            Ok(events) => {
                // Read the target after the fetch so a change made meanwhile wins.
                let target = self.target_rx.borrow_and_update().clone();
                if let Some(target) = target {
                    self.aggregator.apply(target, &events, now);
                }
            }
            Err(e) => {
                self.aggregator.record_failure(e.clone());
                if self.errors_tx.try_send(e).is_err() {
                    debug!("Advisory error channel full, dropping error");
                }
            }
        }

        self.status_tx.send_replace(StatsStatus {
            snapshot: self.aggregator.snapshot().cloned(),
            last_error: self.aggregator.last_error().cloned(),
            last_attempt: Some(now),
            cycles: self.cycles,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeDelta;

    use super::*;
    use crate::catalog::GeoLevel;
    use crate::data::StoryEvent;
    use crate::source::StaticEventSource;

    /// Serves `events`, except on the listed call numbers where it answers 503.
    struct FlakySource {
        events: Vec<StoryEvent>,
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventSource for FlakySource {
        async fn fetch_since(&self, _since: DateTime<Utc>) -> StatsResult<Vec<StoryEvent>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                Err(StatsError::Status(503))
            } else {
                Ok(self.events.clone())
            }
        }
    }

    fn event(code: &str, headline: &str) -> StoryEvent {
        StoryEvent {
            country_code: Some(code.to_string()),
            city_text: None,
            headline: headline.to_string(),
            created_at: Utc::now() - TimeDelta::minutes(5),
        }
    }

    fn settings() -> StatsSettings {
        StatsSettings {
            refresh_interval: Duration::from_secs(3600),
            ..StatsSettings::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_on_start_and_manual_trigger() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let source = Arc::new(StaticEventSource::new(vec![event("IN", "first")]));
        let target = StatsTarget::new(GeoLevel::Country, vec!["IN".to_string()]);

        let handle = StatsRefresher::spawn(catalog, source.clone(), settings(), Some(target));
        let mut rx = handle.subscribe();

        let status = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.snapshot.is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(status.snapshot.unwrap().stats["IN"].story_count, 1);

        source.replace(vec![event("IN", "a"), event("IN", "b")]);
        handle.refresh_now().unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| {
                s.snapshot
                    .as_ref()
                    .is_some_and(|snap| snap.stats["IN"].story_count == 2)
            }),
        )
        .await
        .unwrap()
        .unwrap();

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_target_change_recomputes() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let source = Arc::new(StaticEventSource::new(vec![event("IN", "x"), event("FR", "y")]));

        let handle = StatsRefresher::spawn(catalog, source, settings(), None);
        assert!(handle.snapshot().is_none());

        let target = StatsTarget::new(GeoLevel::Continent, vec!["asia".into(), "europe".into()]);
        handle.set_target(Some(target.clone()));

        let mut rx = handle.subscribe();
        let status = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.snapshot.as_ref().is_some_and(|snap| snap.target == target)),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        let snapshot = status.snapshot.unwrap();
        assert_eq!(snapshot.stats["asia"].story_count, 1);
        assert_eq!(snapshot.stats["europe"].story_count, 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_refresh_after_shutdown_errors() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let source = Arc::new(StaticEventSource::default());
        let handle = StatsRefresher::spawn(catalog, source, settings(), None);
        let trigger = handle.trigger_tx.clone();
        handle.shutdown().await;
        assert!(trigger.try_send(()).is_err());
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_snapshot_and_recovers() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let source = Arc::new(FlakySource {
            events: vec![event("IN", "steady")],
            fail_on: vec![2],
            calls: AtomicUsize::new(0),
        });
        let target = StatsTarget::new(GeoLevel::Country, vec!["IN".to_string()]);
        let handle = StatsRefresher::spawn(catalog, source, settings(), Some(target));
        let mut rx = handle.subscribe();
        let errors = handle.errors();

        let wait = Duration::from_secs(5);
        let first = tokio::time::timeout(wait, rx.wait_for(|s| s.cycles >= 1))
            .await
            .unwrap()
            .unwrap()
            .clone();
        let first_snapshot = first.snapshot.unwrap();
        assert_eq!(first_snapshot.stats["IN"].story_count, 1);
        assert!(first.last_error.is_none());

        handle.refresh_now().unwrap();
        let failed = tokio::time::timeout(wait, rx.wait_for(|s| s.cycles >= 2))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(failed.last_error, Some(StatsError::Status(503)));
        assert_eq!(failed.snapshot.as_ref(), Some(&first_snapshot));

        let advisory = tokio::time::timeout(wait, errors.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(advisory, StatsError::Status(503));

        handle.refresh_now().unwrap();
        let recovered = tokio::time::timeout(wait, rx.wait_for(|s| s.cycles >= 3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert!(recovered.last_error.is_none());
        let snapshot = recovered.snapshot.unwrap();
        assert_eq!(snapshot.stats, first_snapshot.stats);
        assert!(snapshot.last_updated >= first_snapshot.last_updated);

        handle.shutdown().await;
    }
}
