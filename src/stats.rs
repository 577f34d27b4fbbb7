//! Story statistics for the currently visible sibling nodes.
//!
//! Events arrive as flat records keyed by country code and free-text city.
//! [`compute_stats`] maps them onto catalog nodes; [`StatsAggregator`] owns
//! the fetch-then-recompute cycle and the last good snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{GeoCatalog, GeoLevel};
use crate::data::StoryEvent;
use crate::error::{StatsError, StatsResult};
use crate::source::EventSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStats {
    pub story_count: usize,
    pub trend: Trend,
    pub top_headline: Option<String>,
}

impl LocationStats {
    fn empty() -> Self {
        Self {
            story_count: 0,
            trend: Trend::Stable,
            top_headline: None,
        }
    }
}

/// Story counts above which a node is trending up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
    pub continent_up: usize,
    pub country_up: usize,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            continent_up: 50,
            country_up: 20,
        }
    }
}

impl TrendThresholds {
    fn classify(&self, level: GeoLevel, count: usize) -> Trend {
        let threshold = match level {
            GeoLevel::Continent => self.continent_up,
            GeoLevel::Country => self.country_up,
            // Free-text matching below country level is too noisy to call a trend.
            _ => return Trend::Stable,
        };
        if count > threshold {
            Trend::Up
        } else {
            Trend::Stable
        }
    }
}

/// What the stats are computed for: the level of the visible items and
/// their keys (continent slugs, country codes, or state/city/locality ids).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsTarget {
    pub level: GeoLevel,
    pub keys: Vec<String>,
}

impl StatsTarget {
    pub fn new(level: GeoLevel, keys: Vec<String>) -> Self {
        Self { level, keys }
    }
}

pub type StatsMap = HashMap<String, LocationStats>;

/// Aggregate `events` (newest first) onto `keys` at `level`.
///
/// Every requested key is present in the result. The output depends only on
/// the arguments.
pub fn compute_stats(
    catalog: &GeoCatalog,
    level: GeoLevel,
    keys: &[String],
    events: &[StoryEvent],
    thresholds: &TrendThresholds,
) -> StatsMap {
    // bucket -> (count, index of the first matching event)
    let mut buckets: HashMap<String, (usize, usize)> = HashMap::new();
    let mut bump = |bucket: String, index: usize| {
        // Input is newest first, so the first event seen carries the headline.
        buckets.entry(bucket).or_insert((0, index)).0 += 1;
    };

    match level {
        GeoLevel::Continent => {
            for (index, event) in events.iter().enumerate() {
                let Some(continent) = event
                    .country_code
                    .as_deref()
                    .and_then(|code| catalog.continent_for_code(code))
                else {
                    continue;
                };
                bump(continent.as_str().to_string(), index);
            }
        }
        GeoLevel::Country => {
            for (index, event) in events.iter().enumerate() {
                if let Some(code) = event.country_code.as_deref() {
                    bump(code.trim().to_ascii_uppercase(), index);
                }
            }
        }
        GeoLevel::State | GeoLevel::City | GeoLevel::Locality => {
            let needles: Vec<(String, String)> = keys
                .iter()
                .map(|key| (bucket_key(level, key), normalize_place(key)))
                .filter(|(_, needle)| !needle.is_empty())
                .collect();
            for (index, event) in events.iter().enumerate() {
                let Some(city) = event.city_text.as_deref() else {
                    continue;
                };
                let city = normalize_place(city);
                for (bucket, needle) in &needles {
                    if city.contains(needle.as_str()) {
                        bump(bucket.clone(), index);
                    }
                }
            }
        }
    }

    keys.iter()
        .map(|key| {
            let stats = match buckets.get(&bucket_key(level, key)) {
                Some(&(count, first)) => LocationStats {
                    story_count: count,
                    trend: thresholds.classify(level, count),
                    top_headline: Some(events[first].headline.clone()),
                },
                None => LocationStats::empty(),
            };
            (key.clone(), stats)
        })
        .collect()
}

fn bucket_key(level: GeoLevel, key: &str) -> String {
    match level {
        GeoLevel::Country => key.trim().to_ascii_uppercase(),
        _ => key.trim().to_lowercase(),
    }
}

/// Lowercase and treat slug hyphens as spaces so `new-delhi` finds "New Delhi".
fn normalize_place(text: &str) -> String {
    text.trim().to_lowercase().replace('-', " ")
}

/// Tunables for the aggregator and its refresh loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSettings {
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub window: TimeDelta,
    pub thresholds: TrendThresholds,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            window: TimeDelta::hours(48),
            thresholds: TrendThresholds::default(),
        }
    }
}

/// Result of one successful recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub target: StatsTarget,
    pub stats: StatsMap,
    pub events_considered: usize,
    pub last_updated: DateTime<Utc>,
}

/// Owns the event source and the last good snapshot.
///
/// Failures never touch the snapshot; they are recorded in `last_error`
/// until the next success.
pub struct StatsAggregator {
    catalog: Arc<GeoCatalog>,
    source: Arc<dyn EventSource>,
    settings: StatsSettings,
    snapshot: Option<StatsSnapshot>,
    last_error: Option<StatsError>,
}

impl StatsAggregator {
    pub fn new(
        catalog: Arc<GeoCatalog>,
        source: Arc<dyn EventSource>,
        settings: StatsSettings,
    ) -> Self {
        Self {
            catalog,
            source,
            settings,
            snapshot: None,
            last_error: None,
        }
    }

    pub fn settings(&self) -> &StatsSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> Option<&StatsSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&StatsError> {
        self.last_error.as_ref()
    }

    /// Fetch the trailing window ending at `now`, newest first.
    pub async fn fetch_window(&self, now: DateTime<Utc>) -> StatsResult<Vec<StoryEvent>> {
        let since = now
            .checked_sub_signed(self.settings.window)
            .ok_or(StatsError::Window(self.settings.window.num_hours()))?;
        let timeout = self.settings.fetch_timeout;
        let mut events = tokio::time::timeout(timeout, self.source.fetch_since(since))
            .await
            .map_err(|_| StatsError::Timeout(timeout.as_secs()))??;

        events.retain(|e| e.created_at >= since);
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(count = events.len(), %since, "Fetched story window");
        Ok(events)
    }

    /// Replace the snapshot with a full recompute over `events`.
    pub fn apply(
        &mut self,
        target: StatsTarget,
        events: &[StoryEvent],
        now: DateTime<Utc>,
    ) -> &StatsSnapshot {
        let stats = compute_stats(
            &self.catalog,
            target.level,
            &target.keys,
            events,
            &self.settings.thresholds,
        );
        self.last_error = None;
        self.snapshot.insert(StatsSnapshot {
            target,
            stats,
            events_considered: events.len(),
            last_updated: now,
        })
    }

    /// Record a failed cycle, keeping the previous snapshot.
    pub fn record_failure(&mut self, error: StatsError) {
        warn!(error = %error, "Stats refresh failed, keeping previous snapshot");
        self.last_error = Some(error);
    }

    /// Fetch and recompute in one step.
    pub async fn refresh(&mut self, target: StatsTarget) -> StatsResult<&StatsSnapshot> {
        let now = Utc::now();
        match self.fetch_window(now).await {
            Ok(events) => Ok(self.apply(target, &events, now)),
            Err(e) => {
                self.record_failure(e.clone());
                Err(e)
            }
        }
    }
}
