//! Convolution engines and the runtime switch between them.
//!
//! Every engine rewrites the interior of an RGBA8 frame in place:
//!
//! - pixels within `half` of any edge are left untouched
//! - R, G and B are each `clamp(sum(kernel * neighbourhood) / divisor, 0, 255)`, where the sum
//!   reads the frame as it was before the call and `/` truncates toward zero
//! - alpha is never written
//!
//! Neighbourhoods always come from the unfiltered frame. This deliberately departs from in-place
//! accumulation, where pixels later in scan order read neighbours that were already rewritten.
//!
//! [`ReferenceEngine`] is the straightforward scalar loop. [`AcceleratedEngine`] owns a private
//! working region and splits rows across a rayon pool. Both must produce identical bytes.

mod accelerated;
mod passthrough;
mod reference;

use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{VidconvError, VidconvResult};
use crate::kernel::{AppliedKernel, DEFAULT_DIVISOR};

pub use accelerated::AcceleratedEngine;
pub use passthrough::PassthroughEngine;
pub use reference::ReferenceEngine;

/// Which filter path a tick runs through.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Passthrough: the displayed frame equals the captured frame.
    None,
    /// Scalar reference engine.
    Reference,
    /// Row-parallel engine with a private working region.
    #[default]
    Accelerated,
}

impl FilterMode {
    /// All modes, in a fixed order.
    pub const ALL: [FilterMode; 3] = [
        FilterMode::None,
        FilterMode::Reference,
        FilterMode::Accelerated,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::None => "none",
            FilterMode::Reference => "reference",
            FilterMode::Accelerated => "accelerated",
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            FilterMode::None => 0,
            FilterMode::Reference => 1,
            FilterMode::Accelerated => 2,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = VidconvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(FilterMode::None),
            "reference" | "ref" => Ok(FilterMode::Reference),
            "accelerated" | "accel" => Ok(FilterMode::Accelerated),
            other => Err(VidconvError::validation(format!(
                "unknown filter mode '{other}' (expected none, reference or accelerated)"
            ))),
        }
    }
}

/// Settings shared by all engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Fixed normalization divisor. Must be non-zero.
    pub divisor: i32,
    /// Worker threads for the accelerated engine. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DIVISOR,
            threads: None,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> VidconvResult<()> {
        if self.divisor == 0 {
            return Err(VidconvError::validation("divisor must be non-zero"));
        }
        if self.threads == Some(0) {
            return Err(VidconvError::validation(
                "accelerated engine 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// One implementation of the per-frame convolution.
pub trait ConvolutionEngine: Send {
    /// The mode this engine serves.
    fn mode(&self) -> FilterMode;

    /// Filter `data` (a `width x height` RGBA8 frame) in place.
    ///
    /// Fails with [`VidconvError::DimensionMismatch`] before touching `data` when its length is
    /// not `width * height * 4`.
    fn apply(
        &mut self,
        data: &mut [u8],
        width: u32,
        height: u32,
        kernel: &AppliedKernel,
    ) -> VidconvResult<()>;
}

/// Create the engine for `mode`.
pub fn create_engine(
    mode: FilterMode,
    settings: &EngineSettings,
) -> VidconvResult<Box<dyn ConvolutionEngine>> {
    settings.validate()?;
    match mode {
        FilterMode::None => Ok(Box::new(PassthroughEngine)),
        FilterMode::Reference => Ok(Box::new(ReferenceEngine::new(settings.divisor)?)),
        FilterMode::Accelerated => Ok(Box::new(AcceleratedEngine::new(settings)?)),
    }
}

/// One engine per mode, dispatched by [`FilterMode`].
pub struct FilterSet {
    engines: [Box<dyn ConvolutionEngine>; 3],
}

impl FilterSet {
    /// Build all three engines up front.
    pub fn new(settings: &EngineSettings) -> VidconvResult<Self> {
        let engines = [
            create_engine(FilterMode::None, settings)?,
            create_engine(FilterMode::Reference, settings)?,
            create_engine(FilterMode::Accelerated, settings)?,
        ];
        tracing::debug!(
            divisor = settings.divisor,
            threads = ?settings.threads,
            "filter engines created"
        );
        Ok(Self { engines })
    }

    /// Borrow the engine serving `mode`.
    pub fn engine_mut(&mut self, mode: FilterMode) -> &mut dyn ConvolutionEngine {
        self.engines[mode.slot()].as_mut()
    }

    /// Run `data` through the engine for `mode`.
    pub fn apply(
        &mut self,
        mode: FilterMode,
        data: &mut [u8],
        width: u32,
        height: u32,
        kernel: &AppliedKernel,
    ) -> VidconvResult<()> {
        self.engine_mut(mode).apply(data, width, height, kernel)
    }
}

/// Divide, truncating toward zero, and clamp to a sample.
#[inline]
pub(crate) fn normalize(sum: i32, divisor: i32) -> u8 {
    (sum / divisor).clamp(0, 255) as u8
}

/// Row range `[half, height - half)` that gets recomputed, or `None` when the frame has no
/// interior pixels.
pub(crate) fn interior(width: u32, height: u32, half: usize) -> Option<(usize, usize)> {
    let (w, h) = (width as usize, height as usize);
    if w <= 2 * half || h <= 2 * half {
        return None;
    }
    Some((half, h - half))
}
