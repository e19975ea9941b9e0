//! CSV and JSON persistence for pipeline tables and audit records.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Writes a full table to `path`, replacing any existing file. Column names
/// come from the row type and are stable run-to-run.
pub fn write_table<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path, rows = rows.len(), "Table written");
    Ok(())
}

/// Appends a single record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &str, record: &T) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ghost::GhostAudit;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let audit = GhostAudit::default();
        print_json(&audit).unwrap();
    }

    #[test]
    fn test_write_table_replaces_file() {
        let path = temp_path("congestion_audit_test_table.csv");
        let _ = fs::remove_file(&path);

        let audit = GhostAudit::default();
        write_table(&path, &[audit.clone(), audit.clone()]).unwrap();
        write_table(&path, &[audit]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // 1 header + 1 data row after the second write
        assert_eq!(content.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("congestion_audit_test_append.csv");
        let _ = fs::remove_file(&path);

        let audit = GhostAudit::default();
        append_record(&path, &audit).unwrap();
        append_record(&path, &audit).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("rows_in")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }
}
