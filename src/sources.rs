//! Discovery and reading of raw trip tables from the local data directory.
//!
//! File names follow the TLC convention (`yellow_tripdata_2025-01.csv`,
//! optionally gzipped). The taxi type is inferred from the prefix; anything
//! else under the `_tripdata_` pattern is rejected before any parsing runs.

use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::schema::{RawFhvTrip, RawGreenTrip, RawSource, RawTripTable, RawYellowTrip, TaxiType};

/// Lists trip-data files in `data_dir`, sorted by file name so the unifier
/// sees sources in a reproducible order.
pub fn discover_sources(data_dir: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.contains("_tripdata_") {
            continue;
        }
        if !(name.ends_with(".csv") || name.ends_with(".csv.gz")) {
            continue;
        }

        paths.push(path);
    }

    paths.sort();
    debug!(data_dir, count = paths.len(), "Trip-data sources discovered");
    Ok(paths)
}

fn read_raw_bytes(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(bytes)
    }
}

fn deserialize_rows<T: serde::de::DeserializeOwned>(
    source_name: &str,
    bytes: &[u8],
) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T =
            result.map_err(|e| PipelineError::data_format(source_name, e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads one raw trip file into its tagged table. An empty file yields an
/// empty table, not an error.
pub fn read_source(path: &Path) -> Result<RawSource> {
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let taxi_type = TaxiType::from_source_name(&source_name)?;
    let bytes = read_raw_bytes(path)?;

    let table = match taxi_type {
        TaxiType::Yellow => RawTripTable::Yellow(deserialize_rows::<RawYellowTrip>(
            &source_name,
            &bytes,
        )?),
        TaxiType::Green => {
            RawTripTable::Green(deserialize_rows::<RawGreenTrip>(&source_name, &bytes)?)
        }
        TaxiType::Fhv => RawTripTable::Fhv(deserialize_rows::<RawFhvTrip>(&source_name, &bytes)?),
    };

    debug!(source = %source_name, rows = table.len(), "Source read");
    Ok(RawSource { source_name, table })
}

/// Reads every discovered source in `data_dir`.
pub fn read_all_sources(data_dir: &str) -> Result<Vec<RawSource>> {
    let paths = discover_sources(data_dir)?;
    let mut sources = Vec::with_capacity(paths.len());
    for path in &paths {
        sources.push(read_source(path)?);
    }

    info!(
        data_dir,
        sources = sources.len(),
        rows = sources.iter().map(|s| s.table.len()).sum::<usize>(),
        "Raw sources loaded"
    );
    Ok(sources)
}
