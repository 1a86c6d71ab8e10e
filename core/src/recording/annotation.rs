use crate::math::grid::rescale_sample;
use serde::{Deserialize, Serialize};

/// Labeled interval on the sample grid of a continuous recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Annotation {
    pub label: String,
    /// First sample covered by the annotation.
    pub onset: usize,
    /// Number of samples covered.
    pub duration: usize,
}

impl Annotation {
    pub fn new(label: impl Into<String>, onset: usize, duration: usize) -> Self {
        Self {
            label: label.into(),
            onset,
            duration,
        }
    }

    /// Exclusive end sample.
    pub fn end(&self) -> usize {
        self.onset.saturating_add(self.duration)
    }

    pub fn has_prefix(&self, prefixes: &[String]) -> bool {
        prefixes.iter().any(|prefix| self.label.starts_with(prefix.as_str()))
    }

    /// Maps the annotation onto a grid scaled by `ratio`; both edges are
    /// rounded so that the relocated span stays aligned with the new grid.
    pub fn rescaled(&self, ratio: f64) -> Self {
        let onset = rescale_sample(self.onset, ratio);
        let end = rescale_sample(self.end(), ratio);
        Self {
            label: self.label.clone(),
            onset,
            duration: end.saturating_sub(onset),
        }
    }
}
