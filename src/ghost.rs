//! Ghost trip detection: rows whose fields are internally inconsistent
//! enough to indicate sensor or billing error rather than a real ride.
//!
//! Rules fire independently; a row matching any rule is removed exactly once
//! but every fired rule increments its own audit counter, so rule counters
//! can sum above the removed total. The filter is idempotent and never fatal.

use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::schema::CanonicalTripRecord;

/// Per-rule removal counts, reported as a side output for auditing.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GhostAudit {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Rows removed, each counted once regardless of how many rules fired.
    pub removed: usize,

    // per-rule fired counts
    pub non_positive_duration: usize,
    pub zero_distance_fare: usize,
    pub implausible_distance: usize,
    pub free_trip: usize,
    pub implausible_speed: usize,
    pub negative_value: usize,
}

fn is_ghost(trip: &CanonicalTripRecord, config: &PipelineConfig, audit: &mut GhostAudit) -> bool {
    let mut ghost = false;

    // Canonical invariant: distance and fare are never negative. A negative
    // value is a billing/sensor error and would poison the speed and revenue
    // means downstream.
    if trip.distance_miles < 0.0 || trip.fare_amount < 0.0 {
        audit.negative_value += 1;
        ghost = true;
    }

    if trip.duration_secs() <= 0 {
        audit.non_positive_duration += 1;
        ghost = true;
    }

    if trip.distance_miles == 0.0 && trip.fare_amount > config.min_fare_threshold {
        audit.zero_distance_fare += 1;
        ghost = true;
    }

    if trip.distance_miles > config.max_plausible_distance_miles {
        audit.implausible_distance += 1;
        ghost = true;
    }

    if trip.fare_amount <= 0.0 && trip.distance_miles > 0.0 {
        audit.free_trip += 1;
        ghost = true;
    }

    if let Some(speed) = trip.speed_mph() {
        if speed > config.max_plausible_speed_mph {
            audit.implausible_speed += 1;
            ghost = true;
        }
    }

    ghost
}

/// Removes ghost trips from the canonical table, returning the surviving rows
/// and the audit counts. Clean tables pass through untouched.
pub fn filter_ghost_trips(
    trips: Vec<CanonicalTripRecord>,
    config: &PipelineConfig,
) -> (Vec<CanonicalTripRecord>, GhostAudit) {
    let mut audit = GhostAudit {
        rows_in: trips.len(),
        ..GhostAudit::default()
    };

    let surviving: Vec<CanonicalTripRecord> = trips
        .into_iter()
        .filter(|trip| {
            let ghost = is_ghost(trip, config, &mut audit);
            if ghost {
                audit.removed += 1;
            }
            !ghost
        })
        .collect();

    audit.rows_out = surviving.len();

    info!(
        rows_in = audit.rows_in,
        removed = audit.removed,
        non_positive_duration = audit.non_positive_duration,
        zero_distance_fare = audit.zero_distance_fare,
        implausible_distance = audit.implausible_distance,
        free_trip = audit.free_trip,
        implausible_speed = audit.implausible_speed,
        negative_value = audit.negative_value,
        "Ghost trip filter complete"
    );

    (surviving, audit)
}
