//! Dashboard view preparation: pure reshapes of KPI tables into the exact
//! column sets each dashboard view reads. No computation happens here; row
//! counts pass through unchanged.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use tracing::debug;

use crate::aggregate::KpiRow;
use crate::errors::PipelineError;

/// Monthly trend view: trips, revenue and speed over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrendRow {
    pub month: NaiveDate,
    pub trips: usize,
    pub revenue: f64,
    pub avg_speed_mph: Option<f64>,
}

/// Zone activity view: per-month, per-zone demand and revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneActivityRow {
    pub month: NaiveDate,
    pub zone: Option<u32>,
    pub trips: usize,
    pub revenue: f64,
}

/// Leakage view: surcharge leakage per month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageRow {
    pub month: NaiveDate,
    pub leak_trips: usize,
    pub leak_rate: f64,
}

pub fn monthly_trend(kpis: &[KpiRow]) -> Vec<MonthlyTrendRow> {
    kpis.iter()
        .map(|row| MonthlyTrendRow {
            month: row.month,
            trips: row.trip_count,
            revenue: row.total_revenue,
            avg_speed_mph: row.avg_speed_mph,
        })
        .collect()
}

pub fn zone_activity(kpis: &[KpiRow]) -> Vec<ZoneActivityRow> {
    kpis.iter()
        .map(|row| ZoneActivityRow {
            month: row.month,
            zone: row.zone,
            trips: row.trip_count,
            revenue: row.total_revenue,
        })
        .collect()
}

pub fn leakage_view(kpis: &[KpiRow]) -> Vec<LeakageRow> {
    kpis.iter()
        .map(|row| LeakageRow {
            month: row.month,
            leak_trips: row.leak_count,
            leak_rate: row.leak_rate,
        })
        .collect()
}

/// Reads a previously written KPI CSV back, validating its header against
/// [`KpiRow::COLUMNS`] before deserializing.
///
/// # Errors
///
/// Returns [`PipelineError::MissingColumn`] naming the first absent column,
/// so a stale or hand-edited KPI file fails loudly instead of producing a
/// view with missing fields.
pub fn load_kpi_rows(path: &str) -> Result<Vec<KpiRow>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers()?.clone();
    for expected in KpiRow::COLUMNS {
        if !headers.iter().any(|h| h == *expected) {
            return Err(PipelineError::MissingColumn {
                stage: "dashboard",
                column: expected.to_string(),
            }
            .into());
        }
    }

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: KpiRow = result?;
        rows.push(row);
    }

    debug!(path, rows = rows.len(), "KPI table loaded");
    Ok(rows)
}
