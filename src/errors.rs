//! Error taxonomy for the audit pipeline.
//!
//! Structural problems (unknown source shape, missing columns) are fatal and
//! abort the run before any dashboard output is written. Data-quality
//! problems (ghost trips, undefined speed means) are never errors; they are
//! counted and excluded by the stages that detect them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A raw source has a shape the unifier cannot map: unrecognized taxi
    /// type or a required raw column missing.
    #[error("bad source format in '{source_name}': {reason}")]
    DataFormat { source_name: String, reason: String },

    /// The ingestion collaborator could not produce a raw trip table.
    #[error("source unavailable '{source_name}': {reason}")]
    DataUnavailable { source_name: String, reason: String },

    /// A stage expected a KPI column that is not present in its input.
    #[error("{stage}: expected column '{column}' is missing")]
    MissingColumn { stage: &'static str, column: String },
}

impl PipelineError {
    pub fn data_format(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataFormat {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn data_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}
