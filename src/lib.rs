//! Vidconv applies a small square convolution kernel to every frame of an RGBA8 video stream,
//! fast enough for interactive playback.
//!
//! Two interchangeable engines produce identical bytes: a scalar [`ReferenceEngine`] and a
//! row-parallel [`AcceleratedEngine`]. A [`FrameLoop`] pulls frames from a [`FrameSource`],
//! filters them with whichever engine the [`FilterSelector`] picks for that tick, hands them to
//! a [`FrameSink`], and keeps a separate FPS record per mode so both paths can be compared live.
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod filter;
pub mod frame_loop;
pub mod kernel;
pub mod perf;
pub mod selector;
pub mod sink;
pub mod source;

pub use crate::config::SessionConfig;
pub use crate::filter::{
    AcceleratedEngine, ConvolutionEngine, EngineSettings, FilterMode, FilterSet,
    PassthroughEngine, ReferenceEngine, create_engine,
};
pub use crate::foundation::core::{CHANNELS, Frame, FrameIndex, check_rgba_len, rgba_len};
pub use crate::foundation::error::{VidconvError, VidconvResult};
pub use crate::frame_loop::{FrameLoop, LoopStats, TickOutcome, TickReport};
pub use crate::kernel::{AppliedKernel, DEFAULT_DIVISOR, Kernel, SHARPEN_3X3, prepare};
pub use crate::perf::{DEFAULT_FPS_WINDOW, FpsEstimate, PerformanceSampler, TimingRecord};
pub use crate::selector::{FilterSelector, FixedSelector, ModeSwitch, ScheduledSelector};
pub use crate::sink::{FrameSink, InMemorySink, NullSink, PngSequenceSink};
pub use crate::source::{
    FrameSource, ImageSequenceSource, MemorySource, SourceFrame, SyntheticSource,
};
