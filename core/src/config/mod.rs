//! Declarative configuration: the raw on-disk surface and the resolved,
//! fully-typed per-stage bundles.

pub mod raw;
pub mod resolve;
pub mod stage;

pub use crate::math::pad::PadMode;
pub use raw::{RawConfig, RawFilterLength, RawIndexSpec, RawJobs, RawNotchFreqs, RawTunable};
pub use resolve::{expand_notch_series, ParameterResolver, ResolvedConfig};
pub use stage::{
    FilterBand, FilterConfig, FilterLength, FilterMethod, FirDesign, FirWindow, IirFamily,
    IirOutput, IirParams, NotchConfig, NotchMethod, NotchWidths, Parallelism, Phase,
    ResampleConfig, ResampleWindow, Tunable,
};
