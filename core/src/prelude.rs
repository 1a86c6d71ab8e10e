//! Frequently used types, re-exported for callers driving the pipeline.

pub use crate::config::{
    FilterBand, FilterConfig, NotchConfig, ParameterResolver, RawConfig, ResampleConfig,
    ResolvedConfig, Tunable,
};
pub use crate::engine::{DspEngine, EngineDiagnostics, EngineError, EngineOutput, FftEngine};
pub use crate::processing::{process, PipelineOrchestrator, PipelineResult, PipelineState};
pub use crate::recording::{
    Annotation, ChannelInfo, ChannelType, EpochEvent, EpochedHandle, Recording, RecordingHandle,
};
pub use crate::report::{PipelineReport, ReportAccumulator, StageReport, StageScope};
pub use crate::segment::{Segment, SegmentKind, SegmentPartitioner};
pub use crate::selection::{ChannelSelection, ChannelSelector, ChannelSpec, IndexSpec};
pub use crate::{FilterError, FilterResult, StageKind};
