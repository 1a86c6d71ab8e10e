pub mod orchestrator;
pub mod runner;

pub use orchestrator::{PipelineOrchestrator, PipelineResult, PipelineState};
pub use runner::{StageRequest, StageRunner};

use crate::config::{ParameterResolver, RawConfig};
use crate::engine::DspEngine;
use crate::recording::Recording;
use crate::FilterResult;

/// Resolves `raw` against `recording` and runs every enabled stage.
pub fn process<E: DspEngine + ?Sized>(
    recording: Recording,
    raw: &RawConfig,
    engine: &E,
) -> FilterResult<PipelineResult> {
    let resolved = ParameterResolver::for_recording(&recording).resolve(raw)?;
    PipelineOrchestrator::new(engine).run(recording, &resolved)
}
