use crate::config::stage::{
    FilterMethod, FirDesign, FirWindow, IirParams, NotchMethod, Phase, ResampleWindow,
};
use crate::math::pad::PadMode;
use crate::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};

/// Number or keyword, as found in hand-written configuration files
/// (`2.0` vs `"auto"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTunable<T> {
    Value(T),
    Keyword(String),
}

/// `"auto"`, an integer tap count, or a duration string such as `"10s"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilterLength {
    Taps(i64),
    Text(String),
}

/// Integer worker count or the `"cuda"` keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawJobs {
    Count(i64),
    Keyword(String),
}

/// Explicit index list or a Python-style slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawIndexSpec {
    List(Vec<i64>),
    Slice {
        #[serde(default)]
        start: Option<i64>,
        #[serde(default)]
        stop: Option<i64>,
        #[serde(default)]
        step: Option<i64>,
    },
}

/// Half-open arithmetic series of notch targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNotchFreqs {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWidths {
    Single(f64),
    Many(Vec<f64>),
}

/// Declarative pipeline configuration exactly as read from disk. Every key is
/// optional; defaults are applied by [`crate::config::ParameterResolver`].
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub fif: Option<String>,
    pub epoched_data: Option<bool>,

    pub l_freq: Option<f64>,
    pub h_freq: Option<f64>,
    pub picks_by_type_or_name: Option<Vec<String>>,
    pub picks_by_index: Option<RawIndexSpec>,
    pub filter_length: Option<RawFilterLength>,
    pub l_trans_bandwidth: Option<RawTunable<f64>>,
    pub h_trans_bandwidth: Option<RawTunable<f64>>,
    pub n_jobs: Option<RawJobs>,
    pub method: Option<FilterMethod>,
    pub iir_params: Option<IirParams>,
    pub phase: Option<Phase>,
    pub fir_window: Option<FirWindow>,
    pub fir_design: Option<FirDesign>,
    pub skip_by_annotation: Option<Vec<String>>,
    pub pad: Option<PadMode>,

    pub apply_notch: Option<bool>,
    pub notch_freqs: Option<RawNotchFreqs>,
    pub notch_picks_by_type_or_name: Option<Vec<String>>,
    pub notch_picks_by_index: Option<RawIndexSpec>,
    pub notch_filter_length: Option<RawFilterLength>,
    pub notch_widths: Option<RawWidths>,
    pub notch_trans_bandwidth: Option<f64>,
    pub notch_n_jobs: Option<RawJobs>,
    pub notch_method: Option<NotchMethod>,
    pub notch_iir_params: Option<IirParams>,
    pub notch_mt_bandwidth: Option<f64>,
    pub notch_p_value: Option<f64>,
    pub notch_phase: Option<Phase>,
    pub notch_fir_window: Option<FirWindow>,
    pub notch_fir_design: Option<FirDesign>,
    pub notch_skip_by_annotation: Option<Vec<String>>,
    pub notch_pad: Option<PadMode>,

    pub apply_resample: Option<bool>,
    pub target_sfreq: Option<f64>,
    pub resample_allow_upsampling: Option<bool>,
    pub resample_npad: Option<RawTunable<i64>>,
    pub resample_window: Option<ResampleWindow>,
    pub resample_stim_picks: Option<Vec<i64>>,
    pub resample_n_jobs: Option<RawJobs>,
    pub resample_events: Option<Vec<[i64; 3]>>,
    pub resample_pad: Option<PadMode>,
}

impl RawConfig {
    pub fn from_json_str(text: &str) -> FilterResult<Self> {
        serde_json::from_str(text).map_err(|err| FilterError::Configuration(err.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> FilterResult<Self> {
        serde_json::from_value(value).map_err(|err| FilterError::Configuration(err.to_string()))
    }
}
