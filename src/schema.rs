//! Canonical trip schema and the per-taxi-type raw record variants.
//!
//! Each taxi type ships its own column names (`tpep_*` for yellow, `lpep_*`
//! for green, `trip_miles`/`base_passenger_fare` for high-volume FHV). The
//! unifier maps every variant onto one [`CanonicalTripRecord`] shape and is
//! the only place raw schemas are interpreted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::PipelineError;

/// The closed set of supported taxi types, in unification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxiType {
    Yellow,
    Green,
    Fhv,
}

impl TaxiType {
    /// Infers the taxi type from a TLC trip-data file name
    /// (e.g. `yellow_tripdata_2025-01.csv`).
    pub fn from_source_name(name: &str) -> Result<Self, PipelineError> {
        let stem = name.rsplit('/').next().unwrap_or(name);
        if stem.starts_with("yellow_") {
            Ok(TaxiType::Yellow)
        } else if stem.starts_with("green_") {
            Ok(TaxiType::Green)
        } else if stem.starts_with("fhvhv_") || stem.starts_with("fhv_") {
            Ok(TaxiType::Fhv)
        } else {
            Err(PipelineError::data_format(
                name,
                "unrecognized taxi type prefix (expected yellow_, green_ or fhvhv_)",
            ))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxiType::Yellow => "yellow",
            TaxiType::Green => "green",
            TaxiType::Fhv => "fhv",
        }
    }
}

/// TLC files write timestamps as `2025-01-01 08:00:00`; exports occasionally
/// use the `T` separator instead.
fn de_tlc_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(serde::de::Error::custom)
}

/// One row of a yellow-taxi trip file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawYellowTrip {
    #[serde(rename = "tpep_pickup_datetime", deserialize_with = "de_tlc_datetime")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(rename = "tpep_dropoff_datetime", deserialize_with = "de_tlc_datetime")]
    pub dropoff_datetime: NaiveDateTime,
    #[serde(rename = "PULocationID")]
    pub pu_location_id: Option<u32>,
    #[serde(rename = "DOLocationID")]
    pub do_location_id: Option<u32>,
    pub trip_distance: f64,
    pub fare_amount: f64,
    pub congestion_surcharge: Option<f64>,
}

/// One row of a green-taxi trip file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGreenTrip {
    #[serde(rename = "lpep_pickup_datetime", deserialize_with = "de_tlc_datetime")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(rename = "lpep_dropoff_datetime", deserialize_with = "de_tlc_datetime")]
    pub dropoff_datetime: NaiveDateTime,
    #[serde(rename = "PULocationID")]
    pub pu_location_id: Option<u32>,
    #[serde(rename = "DOLocationID")]
    pub do_location_id: Option<u32>,
    pub trip_distance: f64,
    pub fare_amount: f64,
    pub congestion_surcharge: Option<f64>,
}

/// One row of a high-volume FHV trip file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFhvTrip {
    #[serde(rename = "pickup_datetime", deserialize_with = "de_tlc_datetime")]
    pub pickup_datetime: NaiveDateTime,
    #[serde(rename = "dropoff_datetime", deserialize_with = "de_tlc_datetime")]
    pub dropoff_datetime: NaiveDateTime,
    #[serde(rename = "PULocationID")]
    pub pu_location_id: Option<u32>,
    #[serde(rename = "DOLocationID")]
    pub do_location_id: Option<u32>,
    pub trip_miles: f64,
    pub base_passenger_fare: f64,
    pub congestion_surcharge: Option<f64>,
}

/// A fully parsed raw table, tagged with its taxi type.
#[derive(Debug, Clone)]
pub enum RawTripTable {
    Yellow(Vec<RawYellowTrip>),
    Green(Vec<RawGreenTrip>),
    Fhv(Vec<RawFhvTrip>),
}

impl RawTripTable {
    pub fn taxi_type(&self) -> TaxiType {
        match self {
            RawTripTable::Yellow(_) => TaxiType::Yellow,
            RawTripTable::Green(_) => TaxiType::Green,
            RawTripTable::Fhv(_) => TaxiType::Fhv,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawTripTable::Yellow(rows) => rows.len(),
            RawTripTable::Green(rows) => rows.len(),
            RawTripTable::Fhv(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A raw table together with the source it came from, for error reporting.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub source_name: String,
    pub table: RawTripTable,
}

/// One trip in the canonical schema shared by every taxi type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTripRecord {
    /// Derived identifier, deterministic but not necessarily unique.
    pub trip_id: String,
    pub pickup_ts: NaiveDateTime,
    pub dropoff_ts: NaiveDateTime,
    pub pickup_zone: Option<u32>,
    pub dropoff_zone: Option<u32>,
    pub distance_miles: f64,
    pub fare_amount: f64,
    pub congestion_surcharge: f64,
    pub taxi_type: TaxiType,
}

impl CanonicalTripRecord {
    pub fn duration_secs(&self) -> i64 {
        (self.dropoff_ts - self.pickup_ts).num_seconds()
    }

    /// Average speed over the whole trip, or `None` when duration is not
    /// positive.
    pub fn speed_mph(&self) -> Option<f64> {
        let secs = self.duration_secs();
        if secs <= 0 {
            return None;
        }
        Some(self.distance_miles / (secs as f64 / 3600.0))
    }
}

fn canonical(
    taxi_type: TaxiType,
    seq: usize,
    pickup_ts: NaiveDateTime,
    dropoff_ts: NaiveDateTime,
    pickup_zone: Option<u32>,
    dropoff_zone: Option<u32>,
    distance_miles: f64,
    fare_amount: f64,
    congestion_surcharge: Option<f64>,
) -> CanonicalTripRecord {
    CanonicalTripRecord {
        trip_id: format!("{}-{:07}", taxi_type.as_str(), seq),
        pickup_ts,
        dropoff_ts,
        pickup_zone,
        dropoff_zone,
        distance_miles,
        fare_amount,
        congestion_surcharge: congestion_surcharge.unwrap_or(0.0),
        taxi_type,
    }
}

/// Concatenates all raw sources into one canonical table.
///
/// Sources are processed in taxi-type order (yellow, green, fhv), then in the
/// order given, so output row order is deterministic for the same input set.
/// Empty tables contribute zero rows. Never drops a row: output length equals
/// the sum of input lengths.
pub fn unify_sources(mut sources: Vec<RawSource>) -> Vec<CanonicalTripRecord> {
    sources.sort_by_key(|s| s.table.taxi_type());

    let mut out = Vec::with_capacity(sources.iter().map(|s| s.table.len()).sum());
    let mut seq_per_type = [0usize; 3];

    for source in sources {
        let seq = &mut seq_per_type[source.table.taxi_type() as usize];
        match source.table {
            RawTripTable::Yellow(rows) => {
                for row in rows {
                    *seq += 1;
                    out.push(canonical(
                        TaxiType::Yellow,
                        *seq,
                        row.pickup_datetime,
                        row.dropoff_datetime,
                        row.pu_location_id,
                        row.do_location_id,
                        row.trip_distance,
                        row.fare_amount,
                        row.congestion_surcharge,
                    ));
                }
            }
            RawTripTable::Green(rows) => {
                for row in rows {
                    *seq += 1;
                    out.push(canonical(
                        TaxiType::Green,
                        *seq,
                        row.pickup_datetime,
                        row.dropoff_datetime,
                        row.pu_location_id,
                        row.do_location_id,
                        row.trip_distance,
                        row.fare_amount,
                        row.congestion_surcharge,
                    ));
                }
            }
            RawTripTable::Fhv(rows) => {
                for row in rows {
                    *seq += 1;
                    out.push(canonical(
                        TaxiType::Fhv,
                        *seq,
                        row.pickup_datetime,
                        row.dropoff_datetime,
                        row.pu_location_id,
                        row.do_location_id,
                        row.trip_miles,
                        row.base_passenger_fare,
                        row.congestion_surcharge,
                    ));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn yellow_row(distance: f64, fare: f64) -> RawYellowTrip {
        RawYellowTrip {
            pickup_datetime: ts(8, 0),
            dropoff_datetime: ts(8, 20),
            pu_location_id: Some(161),
            do_location_id: Some(234),
            trip_distance: distance,
            fare_amount: fare,
            congestion_surcharge: Some(2.5),
        }
    }

    #[test]
    fn test_taxi_type_from_source_name() {
        assert_eq!(
            TaxiType::from_source_name("yellow_tripdata_2025-01.csv").unwrap(),
            TaxiType::Yellow
        );
        assert_eq!(
            TaxiType::from_source_name("data/green_tripdata_2025-03.csv.gz").unwrap(),
            TaxiType::Green
        );
        assert_eq!(
            TaxiType::from_source_name("fhvhv_tripdata_2025-01.csv").unwrap(),
            TaxiType::Fhv
        );
    }

    #[test]
    fn test_unknown_source_is_a_format_error() {
        let err = TaxiType::from_source_name("purple_tripdata_2025-01.csv").unwrap_err();
        assert!(err.to_string().contains("purple_tripdata_2025-01.csv"));
    }

    #[test]
    fn test_unify_preserves_row_count() {
        let sources = vec![
            RawSource {
                source_name: "green_tripdata_2025-01.csv".to_string(),
                table: RawTripTable::Green(vec![
                    RawGreenTrip {
                        pickup_datetime: ts(9, 0),
                        dropoff_datetime: ts(9, 30),
                        pu_location_id: Some(74),
                        do_location_id: Some(75),
                        trip_distance: 3.0,
                        fare_amount: 14.0,
                        congestion_surcharge: None,
                    };
                    2
                ]),
            },
            RawSource {
                source_name: "yellow_tripdata_2025-01.csv".to_string(),
                table: RawTripTable::Yellow(vec![yellow_row(2.0, 12.0); 3]),
            },
        ];

        let unified = unify_sources(sources);
        assert_eq!(unified.len(), 5);
    }

    #[test]
    fn test_unify_orders_by_taxi_type() {
        let sources = vec![
            RawSource {
                source_name: "fhvhv_tripdata_2025-01.csv".to_string(),
                table: RawTripTable::Fhv(vec![RawFhvTrip {
                    pickup_datetime: ts(10, 0),
                    dropoff_datetime: ts(10, 25),
                    pu_location_id: Some(79),
                    do_location_id: Some(148),
                    trip_miles: 2.2,
                    base_passenger_fare: 18.0,
                    congestion_surcharge: None,
                }]),
            },
            RawSource {
                source_name: "yellow_tripdata_2025-01.csv".to_string(),
                table: RawTripTable::Yellow(vec![yellow_row(1.0, 8.0)]),
            },
        ];

        let unified = unify_sources(sources);
        assert_eq!(unified[0].taxi_type, TaxiType::Yellow);
        assert_eq!(unified[1].taxi_type, TaxiType::Fhv);
        assert_eq!(unified[0].trip_id, "yellow-0000001");
    }

    #[test]
    fn test_missing_surcharge_fills_zero() {
        let sources = vec![RawSource {
            source_name: "green_tripdata_2025-01.csv".to_string(),
            table: RawTripTable::Green(vec![RawGreenTrip {
                pickup_datetime: ts(9, 0),
                dropoff_datetime: ts(9, 10),
                pu_location_id: Some(74),
                do_location_id: Some(41),
                trip_distance: 1.5,
                fare_amount: 9.0,
                congestion_surcharge: None,
            }]),
        }];

        let unified = unify_sources(sources);
        assert_eq!(unified[0].congestion_surcharge, 0.0);
    }

    #[test]
    fn test_empty_table_contributes_nothing() {
        let sources = vec![RawSource {
            source_name: "yellow_tripdata_2025-02.csv".to_string(),
            table: RawTripTable::Yellow(vec![]),
        }];
        assert!(unify_sources(sources).is_empty());
    }

    #[test]
    fn test_speed_mph_none_for_non_positive_duration() {
        let mut sources = unify_sources(vec![RawSource {
            source_name: "yellow_tripdata_2025-01.csv".to_string(),
            table: RawTripTable::Yellow(vec![yellow_row(2.0, 12.0)]),
        }]);
        let mut trip = sources.remove(0);
        trip.dropoff_ts = trip.pickup_ts;
        assert!(trip.speed_mph().is_none());
    }
}
