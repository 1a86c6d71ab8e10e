pub mod fft;
pub mod grid;
pub mod pad;
pub mod psd;
pub mod stats;

pub use fft::FftHelper;
pub use psd::Spectrum;
pub use stats::StatsHelper;
