//! Boundary to the numeric DSP engine.
//!
//! The orchestrator decides what to compute and on which rows and samples;
//! implementors of [`DspEngine`] decide how. Every call receives an owned
//! `[channel, sample]` block containing only the selected rows of one keep
//! segment (or one trial) and must return a block of the same shape, except
//! for resampling where the sample count changes.

pub mod fft;

pub use fft::FftEngine;

use crate::config::{FilterConfig, NotchConfig, ResampleConfig};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failure surfaced by an engine; mapped one-to-one onto
/// [`crate::FilterError`].
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("filter design failed: {0}")]
    FilterDesign(String),
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
    #[error("engine timed out after {0:?}")]
    Timeout(Duration),
}

/// What the engine actually used, for the stage report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l_trans_bandwidth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_trans_bandwidth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_frequencies: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resample_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub data: Array2<f32>,
    pub diagnostics: EngineDiagnostics,
}

pub type EngineResult = Result<EngineOutput, EngineError>;

/// External filter-design and application engine.
pub trait DspEngine {
    fn filter(&self, data: Array2<f32>, sfreq: f64, config: &FilterConfig) -> EngineResult;

    fn notch(&self, data: Array2<f32>, sfreq: f64, config: &NotchConfig) -> EngineResult;

    /// Resamples every row; rows listed in `stim_rows` carry triggers and
    /// must keep their discrete values.
    fn resample(
        &self,
        data: Array2<f32>,
        sfreq: f64,
        config: &ResampleConfig,
        stim_rows: &[usize],
    ) -> EngineResult;
}
