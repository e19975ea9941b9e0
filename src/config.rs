//! Pipeline configuration: ghost-trip thresholds, the congestion-zone
//! LocationID set, and the surcharge policy window.
//!
//! The config is an explicit immutable value threaded through the stages that
//! need it. Stored as plain JSON on disk:
//! ```json
//! {
//!   "min_fare_threshold": 2.5,
//!   "max_plausible_distance_miles": 100.0,
//!   "max_plausible_speed_mph": 65.0,
//!   "min_trip_duration_secs": 60,
//!   "congestion_zone_ids": [4, 12, 13],
//!   "surcharge_hours_start": "05:00:00",
//!   "surcharge_hours_end": "21:00:00"
//! }
//! ```

use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// TLC LocationIDs inside the Manhattan congestion zone: every Manhattan
/// zone except Harlem, Inwood, Washington Heights and Marble Hill.
static DEFAULT_CONGESTION_ZONE_IDS: &[u32] = &[
    4, 12, 13, 24, 43, 45, 48, 50, 68, 79, 87, 88, 90, 100, 103, 104, 105, 107, 113, 114, 125,
    137, 140, 141, 142, 143, 144, 148, 151, 158, 161, 162, 163, 164, 170, 186, 194, 202, 209, 211,
    224, 229, 230, 231, 232, 233, 234, 236, 237, 238, 239, 246, 249, 261, 262, 263,
];

/// Zone-name fragments excluded from the congestion zone when deriving it
/// from the official TLC lookup table.
static EXCLUDED_ZONE_NAMES: &[&str] = &["Harlem", "Inwood", "Washington Heights", "Marble Hill"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Zero-distance trips with a fare above this are ghosts.
    pub min_fare_threshold: f64,

    /// Trips longer than this are treated as GPS/sensor error.
    pub max_plausible_distance_miles: f64,

    /// Trips faster than this are treated as clock/sensor error.
    pub max_plausible_speed_mph: f64,

    /// Trips shorter than this are excluded from speed aggregates
    /// (but kept for revenue aggregates).
    pub min_trip_duration_secs: i64,

    /// LocationIDs subject to the congestion surcharge policy.
    pub congestion_zone_ids: HashSet<u32>,

    /// Start of the surcharge active-hours window (inclusive).
    pub surcharge_hours_start: NaiveTime,

    /// End of the surcharge active-hours window (exclusive).
    pub surcharge_hours_end: NaiveTime,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            min_fare_threshold: 2.50,
            max_plausible_distance_miles: 100.0,
            max_plausible_speed_mph: 65.0,
            min_trip_duration_secs: 60,
            congestion_zone_ids: DEFAULT_CONGESTION_ZONE_IDS.iter().copied().collect(),
            surcharge_hours_start: NaiveTime::from_hms_opt(5, 0, 0).unwrap(),
            surcharge_hours_end: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Missing fields fall back
    /// to the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn is_congestion_zone(&self, zone: u32) -> bool {
        self.congestion_zone_ids.contains(&zone)
    }

    /// Replaces the congestion-zone set with one derived from the official
    /// TLC `taxi_zone_lookup.csv`.
    pub fn with_zone_lookup(mut self, lookup_csv_path: &str) -> Result<Self> {
        self.congestion_zone_ids = congestion_zone_from_lookup(lookup_csv_path)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct ZoneLookupRow {
    #[serde(rename = "LocationID")]
    location_id: u32,
    #[serde(rename = "Borough")]
    borough: String,
    #[serde(rename = "Zone")]
    zone: String,
}

/// Derives the congestion-zone LocationID set from the official TLC zone
/// lookup table: Manhattan minus the uptown neighborhoods named in
/// [`EXCLUDED_ZONE_NAMES`].
pub fn congestion_zone_from_lookup(path: &str) -> Result<HashSet<u32>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut ids = HashSet::new();
    for result in rdr.deserialize() {
        let row: ZoneLookupRow = result?;
        if row.borough != "Manhattan" {
            continue;
        }
        if EXCLUDED_ZONE_NAMES.iter().any(|name| row.zone.contains(name)) {
            continue;
        }
        ids.insert(row.location_id);
    }

    Ok(ids)
}
