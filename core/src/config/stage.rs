use crate::math::pad::PadMode;
use crate::selection::{ChannelSpec, IndexSpec};
use serde::{Deserialize, Serialize};

/// A parameter that is either pinned by the configuration or left for the
/// DSP engine to choose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tunable<T> {
    Explicit(T),
    DeferToEngine,
}

impl<T> Tunable<T> {
    pub fn explicit(&self) -> Option<&T> {
        match self {
            Tunable::Explicit(value) => Some(value),
            Tunable::DeferToEngine => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Tunable::DeferToEngine)
    }
}

impl<T: Copy> Tunable<T> {
    pub fn unwrap_or_else(&self, fallback: impl FnOnce() -> T) -> T {
        match self {
            Tunable::Explicit(value) => *value,
            Tunable::DeferToEngine => fallback(),
        }
    }
}

/// FIR kernel length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterLength {
    Taps(usize),
    Seconds(f64),
}

impl FilterLength {
    pub fn samples(&self, sfreq: f64) -> usize {
        match self {
            FilterLength::Taps(taps) => *taps,
            FilterLength::Seconds(secs) => (secs * sfreq).ceil() as usize,
        }
    }
}

/// Worker hint forwarded verbatim to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    Workers(usize),
    AllCores,
    Cuda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    Fir,
    Iir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotchMethod {
    Fir,
    Iir,
    SpectrumFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Zero,
    ZeroDouble,
    Minimum,
    MinimumHalf,
    /// Single causal pass; IIR only.
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirWindow {
    Hamming,
    Hann,
    Blackman,
}

impl FirWindow {
    /// Length multiplier used when the kernel length is derived from the
    /// transition bandwidth.
    pub fn length_factor(&self) -> f64 {
        match self {
            FirWindow::Hann => 3.1,
            FirWindow::Hamming => 3.3,
            FirWindow::Blackman => 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirDesign {
    Firwin,
    Firwin2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleWindow {
    Boxcar,
    Hann,
    Hamming,
    Blackman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IirFamily {
    Butter,
    Cheby1,
    Cheby2,
    Ellip,
    Bessel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IirOutput {
    Ba,
    Sos,
}

/// IIR design or coefficient bundle. Unset fields fall back to engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IirParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ftype: Option<IirFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<IirOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sos: Option<Vec<[f64; 6]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padlen: Option<usize>,
}

impl IirParams {
    pub fn is_empty(&self) -> bool {
        *self == IirParams::default()
    }

    pub fn has_coefficients(&self) -> bool {
        self.b.is_some() || self.sos.is_some()
    }
}

/// Shape of the temporal filter, derived from `l_freq`/`h_freq`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterBand {
    Identity,
    Highpass { l_freq: f64 },
    Lowpass { h_freq: f64 },
    Bandpass { l_freq: f64, h_freq: f64 },
    /// Rejects `h_freq..l_freq` (`l_freq > h_freq`).
    Bandstop { l_freq: f64, h_freq: f64 },
}

impl FilterBand {
    pub fn is_identity(&self) -> bool {
        matches!(self, FilterBand::Identity)
    }

    pub fn l_freq(&self) -> Option<f64> {
        match self {
            FilterBand::Highpass { l_freq }
            | FilterBand::Bandpass { l_freq, .. }
            | FilterBand::Bandstop { l_freq, .. } => Some(*l_freq),
            _ => None,
        }
    }

    pub fn h_freq(&self) -> Option<f64> {
        match self {
            FilterBand::Lowpass { h_freq }
            | FilterBand::Bandpass { h_freq, .. }
            | FilterBand::Bandstop { h_freq, .. } => Some(*h_freq),
            _ => None,
        }
    }

    /// Human-readable description used in the report and product log.
    pub fn summary(&self) -> String {
        match self {
            FilterBand::Identity => "No temporal filter was applied.".to_string(),
            FilterBand::Highpass { l_freq } => {
                format!("Highpass filter was applied at {}Hz.", l_freq)
            }
            FilterBand::Lowpass { h_freq } => {
                format!("Lowpass filter was applied at {}Hz.", h_freq)
            }
            FilterBand::Bandpass { l_freq, h_freq } => {
                format!("Data was filtered between {} and {}Hz.", l_freq, h_freq)
            }
            FilterBand::Bandstop { l_freq, h_freq } => format!(
                "Band-stop filter was applied between {} and {}Hz.",
                h_freq, l_freq
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub band: FilterBand,
    pub picks: ChannelSpec,
    pub filter_length: Tunable<FilterLength>,
    pub l_trans_bandwidth: Tunable<f64>,
    pub h_trans_bandwidth: Tunable<f64>,
    pub n_jobs: Parallelism,
    pub method: FilterMethod,
    pub iir_params: Tunable<IirParams>,
    pub phase: Phase,
    pub fir_window: FirWindow,
    pub fir_design: FirDesign,
    pub skip_by_annotation: Vec<String>,
    pub pad: PadMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotchWidths {
    Uniform(f64),
    PerFrequency(Vec<f64>),
}

impl NotchWidths {
    pub fn width_at(&self, index: usize) -> Option<f64> {
        match self {
            NotchWidths::Uniform(width) => Some(*width),
            NotchWidths::PerFrequency(widths) => widths.get(index).copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotchConfig {
    /// Ascending, deduplicated target frequencies, or engine line detection.
    pub freqs: Tunable<Vec<f64>>,
    pub picks: ChannelSpec,
    pub filter_length: Tunable<FilterLength>,
    pub widths: Tunable<NotchWidths>,
    pub trans_bandwidth: f64,
    pub n_jobs: Parallelism,
    pub method: NotchMethod,
    pub iir_params: Tunable<IirParams>,
    pub mt_bandwidth: Tunable<f64>,
    pub p_value: f64,
    pub phase: Phase,
    pub fir_window: FirWindow,
    pub fir_design: FirDesign,
    pub skip_by_annotation: Vec<String>,
    pub pad: PadMode,
}

impl NotchConfig {
    pub fn summary(&self) -> String {
        match self.freqs.explicit().and_then(|freqs| freqs.first()) {
            Some(first) => format!("{}Hz and its harmonics.", first),
            None => "Line frequencies detected by spectrum fit.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleConfig {
    pub target_sfreq: f64,
    pub npad: Tunable<usize>,
    pub window: ResampleWindow,
    /// Rows treated as trigger channels; `None` selects every stim channel.
    pub stim_picks: Option<IndexSpec>,
    pub n_jobs: Parallelism,
    /// Event triplets `[sample, previous, id]` relocated onto the new grid.
    pub events: Option<Vec<[i64; 3]>>,
    pub pad: PadMode,
}

impl ResampleConfig {
    pub fn summary(&self) -> String {
        format!("Data was resampled at {}Hz.", self.target_sfreq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_summaries_name_the_edges() {
        assert_eq!(
            FilterBand::Bandpass {
                l_freq: 1.0,
                h_freq: 40.0
            }
            .summary(),
            "Data was filtered between 1 and 40Hz."
        );
        assert_eq!(
            FilterBand::Lowpass { h_freq: 40.0 }.summary(),
            "Lowpass filter was applied at 40Hz."
        );
        assert_eq!(
            FilterBand::Highpass { l_freq: 0.5 }.summary(),
            "Highpass filter was applied at 0.5Hz."
        );
    }

    #[test]
    fn phase_uses_hyphenated_names() {
        let phase: Phase = serde_json::from_str("\"zero-double\"").unwrap();
        assert_eq!(phase, Phase::ZeroDouble);
    }

    #[test]
    fn filter_length_in_seconds_rounds_up() {
        assert_eq!(FilterLength::Seconds(0.0105).samples(1000.0), 11);
        assert_eq!(FilterLength::Taps(101).samples(1000.0), 101);
    }

    #[test]
    fn iir_params_reject_unknown_keys() {
        let parsed: Result<IirParams, _> = serde_json::from_str(r#"{"order": 4, "kind": "x"}"#);
        assert!(parsed.is_err());
    }
}
