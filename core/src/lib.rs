//! Orchestration core for temporal filtering of multichannel MEG/EEG recordings.
//!
//! A declarative configuration is resolved into per-stage parameter bundles,
//! channel and time-segment subsets are derived from the recording, and the
//! filter → notch → resample stages are sequenced against a pluggable
//! [`engine::DspEngine`]. The numeric work itself lives behind that trait.

pub mod config;
pub mod engine;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod recording;
pub mod report;
pub mod segment;
pub mod selection;
pub mod telemetry;

pub use engine::{DspEngine, EngineDiagnostics, EngineError, EngineOutput, FftEngine};
pub use processing::{process, PipelineOrchestrator, PipelineResult, PipelineState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The three processing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Filter,
    Notch,
    Resample,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Filter => "filter",
            StageKind::Notch => "notch",
            StageKind::Resample => "resample",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common error type for configuration resolution and stage execution.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("channel index error: {0}")]
    ChannelIndex(String),
    #[error("conflicting channel selection: {0}")]
    ConflictingSelection(String),
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),
    #[error("filter design error: {0}")]
    FilterDesign(String),
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
    #[error("engine timed out after {0:?}")]
    EngineTimeout(Duration),
}

impl From<EngineError> for FilterError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::FilterDesign(msg) => FilterError::FilterDesign(msg),
            EngineError::NumericalInstability(msg) => FilterError::NumericalInstability(msg),
            EngineError::Timeout(elapsed) => FilterError::EngineTimeout(elapsed),
        }
    }
}

pub type FilterResult<T> = Result<T, FilterError>;
