//! Where story events come from.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::data::{EventsResponse, StoryEvent};
use crate::error::{StatsError, StatsResult};

/// Read-only access to recent story events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// All events created at or after `since`, newest first.
    async fn fetch_since(&self, since: DateTime<Utc>) -> StatsResult<Vec<StoryEvent>>;
}

/// Event source backed by an HTTP endpoint returning JSON.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: reqwest::Client,
    url: String,
}

impl HttpEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn request_url(&self, since: DateTime<Utc>) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}since={}",
            self.url,
            separator,
            urlencoding::encode(&since.to_rfc3339())
        )
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_since(&self, since: DateTime<Utc>) -> StatsResult<Vec<StoryEvent>> {
        let url = self.request_url(since);
        debug!(%url, "Fetching story events");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        parse_events(&text)
    }
}

/// Accepts `{"events": [...]}`, a bare array, or an empty/`null` body.
pub fn parse_events(text: &str) -> StatsResult<Vec<StoryEvent>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<EventsResponse>(trimmed) {
        Ok(data) => Ok(data.events),
        Err(e) => match serde_json::from_str::<Vec<StoryEvent>>(trimmed) {
            Ok(events) => Ok(events),
            Err(_) => Err(e.into()),
        },
    }
}

/// In-memory event source; contents can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticEventSource {
    events: Mutex<Vec<StoryEvent>>,
}

impl StaticEventSource {
    pub fn new(events: Vec<StoryEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    pub fn replace(&self, events: Vec<StoryEvent>) {
        match self.events.lock() {
            Ok(mut guard) => *guard = events,
            Err(poisoned) => *poisoned.into_inner() = events,
        }
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn fetch_since(&self, since: DateTime<Utc>) -> StatsResult<Vec<StoryEvent>> {
        let guard = self
            .events
            .lock()
            .map_err(|_| StatsError::Fetch("event store lock poisoned".to_string()))?;
        let mut events: Vec<StoryEvent> = guard
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}
