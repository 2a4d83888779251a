use std::time::Duration;

use serde::Deserialize;

use crate::geometry::Projection;

/// Settings shared by the stores and the aggregator.
///
/// Deserializes from any serde format; missing fields take their defaults.
///
/// ```
/// use std::time::Duration;
/// use vineyard_sync::SyncConfig;
///
/// let config: SyncConfig = serde_json::from_str(r#"{"shared_fetch_timeout_ms": 250}"#).unwrap();
/// assert_eq!(config.shared_fetch_timeout, Duration::from_millis(250));
/// assert_eq!(config.reference_year, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Projection of persisted boundaries.
    pub storage_projection: Projection,
    /// Projection of resident boundaries.
    pub working_projection: Projection,
    /// Upper bound on each one-time shared-parcel fetch.
    #[serde(rename = "shared_fetch_timeout_ms", with = "millis")]
    pub shared_fetch_timeout: Duration,
    /// Year every date is rewritten onto for season overlays.
    pub reference_year: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_projection: Projection::Wgs84,
            working_projection: Projection::WebMercator,
            shared_fetch_timeout: Duration::from_secs(5),
            reference_year: 2000,
        }
    }
}

impl SyncConfig {
    pub fn with_projections(mut self, storage: Projection, working: Projection) -> Self {
        self.storage_projection = storage;
        self.working_projection = working;
        self
    }

    pub fn with_shared_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.shared_fetch_timeout = timeout;
        self
    }

    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
