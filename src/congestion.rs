//! Per-trip congestion enrichment: average speed, zone membership, and
//! surcharge-leakage flags.
//!
//! Enrichment never drops rows; trips too short for a meaningful speed are
//! flagged out of speed aggregates but keep contributing to revenue.

use chrono::{NaiveTime, Timelike};
use tracing::info;

use crate::config::PipelineConfig;
use crate::schema::CanonicalTripRecord;

/// A canonical trip plus the derived congestion fields.
#[derive(Debug, Clone)]
pub struct EnrichedTripRecord {
    pub trip: CanonicalTripRecord,

    /// `None` when the trip is too short for a stable speed; such rows are
    /// excluded from speed aggregates but retained everywhere else.
    pub avg_speed_mph: Option<f64>,
    pub in_congestion_zone: bool,
    pub surcharge_expected: bool,
    pub surcharge_leak: bool,
}

/// True when `t` falls inside the policy window. A window with
/// `start > end` wraps past midnight.
fn in_active_hours(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

/// Computes the derived fields for every surviving trip. Output row count
/// always equals input row count.
pub fn enrich_trips(
    trips: Vec<CanonicalTripRecord>,
    config: &PipelineConfig,
) -> Vec<EnrichedTripRecord> {
    let enriched: Vec<EnrichedTripRecord> = trips
        .into_iter()
        .map(|trip| {
            let avg_speed_mph = if trip.duration_secs() >= config.min_trip_duration_secs {
                trip.speed_mph()
            } else {
                None
            };

            let in_congestion_zone = trip
                .pickup_zone
                .is_some_and(|zone| config.is_congestion_zone(zone));

            let surcharge_expected = in_congestion_zone
                && in_active_hours(
                    trip.pickup_ts.time(),
                    config.surcharge_hours_start,
                    config.surcharge_hours_end,
                );

            let surcharge_leak = surcharge_expected && trip.congestion_surcharge == 0.0;

            EnrichedTripRecord {
                trip,
                avg_speed_mph,
                in_congestion_zone,
                surcharge_expected,
                surcharge_leak,
            }
        })
        .collect();

    let leaks = enriched.iter().filter(|t| t.surcharge_leak).count();
    let speed_excluded = enriched.iter().filter(|t| t.avg_speed_mph.is_none()).count();
    info!(
        rows = enriched.len(),
        leaks, speed_excluded, "Congestion enrichment complete"
    );

    enriched
}

impl EnrichedTripRecord {
    /// Pickup hour of day, for the velocity heatmap.
    pub fn pickup_hour(&self) -> u32 {
        self.trip.pickup_ts.hour()
    }
}
