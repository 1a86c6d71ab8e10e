use crate::recording::{Annotation, ChannelInfo};
use crate::{FilterError, FilterResult};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Continuous multichannel recording, `data` laid out as `[channel, sample]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingHandle {
    pub sfreq: f64,
    pub channels: Vec<ChannelInfo>,
    pub data: Array2<f32>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Lower edge of the pass band the data currently carries.
    #[serde(default)]
    pub highpass: f64,
    /// Upper edge of the pass band; `None` means Nyquist.
    #[serde(default)]
    pub lowpass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RecordingHandle {
    pub fn new(sfreq: f64, channels: Vec<ChannelInfo>, data: Array2<f32>) -> FilterResult<Self> {
        let handle = Self {
            sfreq,
            channels,
            data,
            annotations: Vec::new(),
            highpass: 0.0,
            lowpass: None,
            source: None,
        };
        handle.validate()?;
        Ok(handle)
    }

    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn validate(&self) -> FilterResult<()> {
        validate_layout(self.sfreq, &self.channels, self.data.nrows())
    }
}

/// Trigger associated with one trial of an epoched recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpochEvent {
    pub sample: i64,
    pub id: i32,
}

/// Stack of equal-length trials, `data` laid out as `[trial, channel, sample]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochedHandle {
    pub sfreq: f64,
    pub channels: Vec<ChannelInfo>,
    pub data: Array3<f32>,
    #[serde(default)]
    pub events: Vec<EpochEvent>,
    #[serde(default)]
    pub tmin: f64,
    #[serde(default)]
    pub highpass: f64,
    #[serde(default)]
    pub lowpass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EpochedHandle {
    pub fn new(
        sfreq: f64,
        channels: Vec<ChannelInfo>,
        data: Array3<f32>,
        events: Vec<EpochEvent>,
    ) -> FilterResult<Self> {
        let handle = Self {
            sfreq,
            channels,
            data,
            events,
            tmin: 0.0,
            highpass: 0.0,
            lowpass: None,
            source: None,
        };
        handle.validate()?;
        Ok(handle)
    }

    pub fn n_trials(&self) -> usize {
        self.data.dim().0
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    pub fn validate(&self) -> FilterResult<()> {
        validate_layout(self.sfreq, &self.channels, self.data.dim().1)?;
        if !self.events.is_empty() && self.events.len() != self.n_trials() {
            return Err(FilterError::Configuration(format!(
                "{} events supplied for {} trials",
                self.events.len(),
                self.n_trials()
            )));
        }
        Ok(())
    }
}

fn validate_layout(sfreq: f64, channels: &[ChannelInfo], rows: usize) -> FilterResult<()> {
    if !sfreq.is_finite() || sfreq <= 0.0 {
        return Err(FilterError::Configuration(format!(
            "sampling frequency must be positive, got {}",
            sfreq
        )));
    }
    if channels.len() != rows {
        return Err(FilterError::Configuration(format!(
            "{} channel descriptors for {} data rows",
            channels.len(),
            rows
        )));
    }
    Ok(())
}

/// A recording in either modality; the pipeline owns it for the duration of
/// one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recording {
    Continuous(RecordingHandle),
    Epoched(EpochedHandle),
}

impl Recording {
    pub fn is_epoched(&self) -> bool {
        matches!(self, Recording::Epoched(_))
    }

    pub fn sfreq(&self) -> f64 {
        match self {
            Recording::Continuous(handle) => handle.sfreq,
            Recording::Epoched(handle) => handle.sfreq,
        }
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        match self {
            Recording::Continuous(handle) => &handle.channels,
            Recording::Epoched(handle) => &handle.channels,
        }
    }

    /// Samples per channel (per trial for epoched data).
    pub fn n_times(&self) -> usize {
        match self {
            Recording::Continuous(handle) => handle.n_times(),
            Recording::Epoched(handle) => handle.n_times(),
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Recording::Continuous(handle) => handle.source.as_deref(),
            Recording::Epoched(handle) => handle.source.as_deref(),
        }
    }

    pub fn highpass(&self) -> f64 {
        match self {
            Recording::Continuous(handle) => handle.highpass,
            Recording::Epoched(handle) => handle.highpass,
        }
    }

    pub fn lowpass(&self) -> f64 {
        let (lowpass, sfreq) = match self {
            Recording::Continuous(handle) => (handle.lowpass, handle.sfreq),
            Recording::Epoched(handle) => (handle.lowpass, handle.sfreq),
        };
        lowpass.unwrap_or(sfreq / 2.0)
    }

    pub fn bad_channels(&self) -> Vec<String> {
        self.channels()
            .iter()
            .filter(|channel| channel.bad)
            .map(|channel| channel.name.clone())
            .collect()
    }

    pub fn validate(&self) -> FilterResult<()> {
        match self {
            Recording::Continuous(handle) => handle.validate(),
            Recording::Epoched(handle) => handle.validate(),
        }
    }

    /// Raises the recorded highpass edge; it never moves down.
    pub fn record_highpass(&mut self, freq: f64) {
        let current = self.highpass();
        let updated = current.max(freq);
        match self {
            Recording::Continuous(handle) => handle.highpass = updated,
            Recording::Epoched(handle) => handle.highpass = updated,
        }
    }

    /// Lowers the recorded lowpass edge; it never moves up.
    pub fn record_lowpass(&mut self, freq: f64) {
        let updated = self.lowpass().min(freq);
        match self {
            Recording::Continuous(handle) => handle.lowpass = Some(updated),
            Recording::Epoched(handle) => handle.lowpass = Some(updated),
        }
    }
}
