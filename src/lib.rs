//! Geographic intelligence directory.
//!
//! A static continent/country/state/city/locality catalog with search, a
//! drill-down navigation state machine, and a story statistics overlay that
//! refreshes in the background.

pub mod catalog;
pub mod config;
pub mod coordinates;
pub mod data;
pub mod error;
pub mod navigation;
pub mod realtime;
pub mod refresh;
pub mod search;
pub mod source;
pub mod stats;

pub use catalog::{CatalogSummary, ContinentId, GeoCatalog, GeoKey, GeoLevel, GeoNode};
pub use config::Config;
pub use coordinates::{CoordinateResolver, ResolvedLocation};
pub use data::StoryEvent;
pub use error::{CatalogError, ConfigError, StatsError};
pub use navigation::{NavAddress, NavLevel, NavigationStateMachine, StoryFilter, Transition};
pub use realtime::ConnectionMonitor;
pub use refresh::{StatsHandle, StatsRefresher, StatsStatus};
pub use search::{LocationSearchIndex, SearchResult};
pub use source::{EventSource, HttpEventSource, StaticEventSource};
pub use stats::{
    compute_stats, LocationStats, StatsAggregator, StatsSettings, StatsTarget, Trend,
    TrendThresholds,
};
