//! Error types for geoatlas

use thiserror::Error;

/// Errors raised while loading or validating the catalog.
///
/// The catalog is trusted static data, so these only surface at load time.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read a catalog file
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog document is not valid JSON for the expected shape
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Same continent listed twice
    #[error("duplicate continent id: {0}")]
    DuplicateContinent(String),

    /// Country id reused anywhere in the catalog
    #[error("duplicate country id: {0}")]
    DuplicateCountry(String),

    /// Country code reused anywhere in the catalog (case-insensitive)
    #[error("duplicate country code: {0}")]
    DuplicateCountryCode(String),

    /// Country code is not two ASCII letters
    #[error("invalid country code {code:?} for country {country}")]
    InvalidCountryCode { country: String, code: String },

    /// Child id reused within the same parent
    #[error("duplicate {kind} id {id:?} under {parent}")]
    DuplicateChild {
        kind: &'static str,
        parent: String,
        id: String,
    },
}

/// Errors from fetching or aggregating story statistics.
///
/// These never reach navigation or search; the refresher reports them as
/// advisories and keeps the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Event source could not be reached
    #[error("event fetch failed: {0}")]
    Fetch(String),

    /// Event source answered with a non-success status
    #[error("event source returned HTTP {0}")]
    Status(u16),

    /// Event source did not answer in time
    #[error("event fetch timed out after {0}s")]
    Timeout(u64),

    /// Event payload could not be decoded
    #[error("malformed event payload: {0}")]
    Malformed(String),

    /// Refresh task is no longer running
    #[error("stats refresher has shut down")]
    ShutDown,

    /// Window start falls outside the representable date range
    #[error("stats window of {0}h reaches past the supported date range")]
    Window(i64),
}

impl From<reqwest::Error> for StatsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StatsError::Malformed(e.to_string())
        } else {
            StatsError::Fetch(e.to_string())
        }
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self {
        StatsError::Malformed(e.to_string())
    }
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is outside its allowed range
    #[error("config value {field} = {value} is out of range ({allowed})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        allowed: &'static str,
    },
}

/// Result type for stats operations
pub type StatsResult<T> = Result<T, StatsError>;
