use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "geoatlas";
pub const DEFAULT_EVENT_SOURCE_URL: &str = "http://localhost:8080/api/stories/recent";

/// A flat story record as published by the event source.
///
/// Records carry a country code and a free-text city, never a hierarchy id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryEvent {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city_text: Option<String>,
    pub headline: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<StoryEvent>,
}
