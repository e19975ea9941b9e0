//! KPI aggregation over enriched trips: monthly and zone-level tables plus
//! the weekday/hour velocity heatmap for congestion-zone pickups.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::congestion::EnrichedTripRecord;

/// One aggregated KPI row. `zone` is `None` for the monthly table and for
/// trips whose pickup zone was missing in the raw data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiRow {
    pub month: NaiveDate,
    pub zone: Option<u32>,
    pub trip_count: usize,
    pub total_revenue: f64,
    /// Mean over speed-eligible rows only; `None` (empty CSV field) when the
    /// group has no eligible rows.
    pub avg_speed_mph: Option<f64>,
    pub leak_count: usize,
    pub leak_rate: f64,
}

impl KpiRow {
    /// CSV column set, in serialization order. The dashboard preparer
    /// validates file headers against this list.
    pub const COLUMNS: &'static [&'static str] = &[
        "month",
        "zone",
        "trip_count",
        "total_revenue",
        "avg_speed_mph",
        "leak_count",
        "leak_rate",
    ];
}

/// One cell of the congestion-zone velocity heatmap.
/// `weekday` is 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub weekday: u32,
    pub hour: u32,
    pub avg_speed_mph: f64,
    pub trip_count: usize,
}

/// Zones ranked by surcharge leakage, worst first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageZoneRow {
    pub zone: u32,
    pub leak_count: usize,
    pub trip_count: usize,
}

#[derive(Default)]
struct GroupAccumulator {
    trip_count: usize,
    total_revenue: f64,
    speed_sum: f64,
    speed_count: usize,
    leak_count: usize,
}

impl GroupAccumulator {
    fn push(&mut self, trip: &EnrichedTripRecord) {
        self.trip_count += 1;
        self.total_revenue += trip.trip.fare_amount + trip.trip.congestion_surcharge;
        if let Some(speed) = trip.avg_speed_mph {
            self.speed_sum += speed;
            self.speed_count += 1;
        }
        if trip.surcharge_leak {
            self.leak_count += 1;
        }
    }

    fn into_row(self, month: NaiveDate, zone: Option<u32>) -> KpiRow {
        let avg_speed_mph = if self.speed_count == 0 {
            None
        } else {
            Some(self.speed_sum / self.speed_count as f64)
        };
        let leak_rate = if self.trip_count == 0 {
            0.0
        } else {
            self.leak_count as f64 / self.trip_count as f64
        };
        KpiRow {
            month,
            zone,
            trip_count: self.trip_count,
            total_revenue: self.total_revenue,
            avg_speed_mph,
            leak_count: self.leak_count,
            leak_rate,
        }
    }
}

fn month_of(ts: NaiveDateTime) -> NaiveDate {
    NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).unwrap()
}

/// Groups trips by pickup month. Every month present in the input yields
/// exactly one row, in ascending month order.
pub fn monthly_kpis(trips: &[EnrichedTripRecord]) -> Vec<KpiRow> {
    let mut groups: BTreeMap<NaiveDate, GroupAccumulator> = BTreeMap::new();
    for trip in trips {
        groups.entry(month_of(trip.trip.pickup_ts)).or_default().push(trip);
    }

    let rows: Vec<KpiRow> = groups
        .into_iter()
        .map(|(month, acc)| acc.into_row(month, None))
        .collect();

    info!(months = rows.len(), "Monthly KPI aggregation complete");
    rows
}

/// Groups trips by pickup month and pickup zone. Trips with no recorded
/// pickup zone group under `zone = None`.
pub fn zone_kpis(trips: &[EnrichedTripRecord]) -> Vec<KpiRow> {
    let mut groups: BTreeMap<(NaiveDate, Option<u32>), GroupAccumulator> = BTreeMap::new();
    for trip in trips {
        let key = (month_of(trip.trip.pickup_ts), trip.trip.pickup_zone);
        groups.entry(key).or_default().push(trip);
    }

    let rows: Vec<KpiRow> = groups
        .into_iter()
        .map(|((month, zone), acc)| acc.into_row(month, zone))
        .collect();

    info!(groups = rows.len(), "Zone KPI aggregation complete");
    rows
}

/// Average speed by weekday and hour over congestion-zone pickups, skipping
/// speed-excluded rows. Cells with no eligible trips are absent, not zero.
pub fn velocity_heatmap(trips: &[EnrichedTripRecord]) -> Vec<HeatmapCell> {
    let mut groups: BTreeMap<(u32, u32), (f64, usize)> = BTreeMap::new();
    for trip in trips {
        if !trip.in_congestion_zone {
            continue;
        }
        let Some(speed) = trip.avg_speed_mph else {
            continue;
        };
        let key = (
            trip.trip.pickup_ts.weekday().num_days_from_sunday(),
            trip.pickup_hour(),
        );
        let cell = groups.entry(key).or_insert((0.0, 0));
        cell.0 += speed;
        cell.1 += 1;
    }

    groups
        .into_iter()
        .map(|((weekday, hour), (sum, n))| HeatmapCell {
            weekday,
            hour,
            avg_speed_mph: sum / n as f64,
            trip_count: n,
        })
        .collect()
}

/// Ranks pickup zones by total leak count, worst first, keeping the top `n`.
pub fn top_leakage_zones(zone_rows: &[KpiRow], n: usize) -> Vec<LeakageZoneRow> {
    let mut totals: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    for row in zone_rows {
        let Some(zone) = row.zone else { continue };
        let entry = totals.entry(zone).or_insert((0, 0));
        entry.0 += row.leak_count;
        entry.1 += row.trip_count;
    }

    let mut ranked: Vec<LeakageZoneRow> = totals
        .into_iter()
        .map(|(zone, (leak_count, trip_count))| LeakageZoneRow {
            zone,
            leak_count,
            trip_count,
        })
        .collect();
    ranked.sort_by(|a, b| b.leak_count.cmp(&a.leak_count).then(a.zone.cmp(&b.zone)));
    ranked.truncate(n);
    ranked
}
