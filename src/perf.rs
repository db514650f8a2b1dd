use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::filter::FilterMode;
use crate::foundation::error::{VidconvError, VidconvResult};

/// Samples a record must exceed before it reports a rate.
pub const DEFAULT_FPS_WINDOW: usize = 20;

/// Lower bound on the averaged frame time, so an all-zero record still yields a finite rate.
const MIN_AVERAGE_MS: f64 = 1e-6;

/// Smoothed frames-per-second, derived on demand from a [`TimingRecord`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FpsEstimate {
    /// Not enough samples yet. Displays as `NaN`.
    WarmingUp,
    /// `1000 / mean(ms)` over the retained window. Always finite and strictly positive.
    Fps(f64),
}

impl FpsEstimate {
    pub fn value(self) -> Option<f64> {
        match self {
            FpsEstimate::WarmingUp => None,
            FpsEstimate::Fps(v) => Some(v),
        }
    }
}

impl fmt::Display for FpsEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FpsEstimate::WarmingUp => f.write_str("NaN"),
            FpsEstimate::Fps(v) => write!(f, "{v:.2}"),
        }
    }
}

/// Rolling record of per-frame durations in milliseconds.
///
/// Holds at most `window` samples. The estimate stays [`FpsEstimate::WarmingUp`] until more than
/// `window` samples have been recorded in total.
#[derive(Clone, Debug)]
pub struct TimingRecord {
    window: usize,
    samples: VecDeque<f64>,
    recorded: u64,
}

impl TimingRecord {
    pub fn new(window: usize) -> VidconvResult<Self> {
        if window == 0 {
            return Err(VidconvError::validation("fps window must be >= 1"));
        }
        Ok(Self {
            window,
            samples: VecDeque::with_capacity(window + 1),
            recorded: 0,
        })
    }

    pub fn push_ms(&mut self, ms: f64) {
        let ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        self.samples.push_back(ms);
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }
        self.recorded += 1;
    }

    /// Total samples ever recorded, including evicted ones.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn estimate(&self) -> FpsEstimate {
        if self.recorded <= self.window as u64 {
            return FpsEstimate::WarmingUp;
        }
        match self.mean_ms() {
            Some(mean) => FpsEstimate::Fps(1000.0 / mean.max(MIN_AVERAGE_MS)),
            None => FpsEstimate::WarmingUp,
        }
    }
}

/// Per-mode frame timing. Each [`FilterMode`] has its own record, so switching modes never mixes
/// one path's samples into another's average.
#[derive(Clone, Debug)]
pub struct PerformanceSampler {
    records: [TimingRecord; 3],
}

impl Default for PerformanceSampler {
    fn default() -> Self {
        let record = TimingRecord {
            window: DEFAULT_FPS_WINDOW,
            samples: VecDeque::with_capacity(DEFAULT_FPS_WINDOW + 1),
            recorded: 0,
        };
        Self {
            records: [record.clone(), record.clone(), record],
        }
    }
}

impl PerformanceSampler {
    pub fn new(window: usize) -> VidconvResult<Self> {
        Ok(Self {
            records: [
                TimingRecord::new(window)?,
                TimingRecord::new(window)?,
                TimingRecord::new(window)?,
            ],
        })
    }

    pub fn record(&mut self, mode: FilterMode, elapsed: Duration) {
        self.record_ms(mode, elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_ms(&mut self, mode: FilterMode, ms: f64) {
        self.records[mode.slot()].push_ms(ms);
    }

    pub fn estimate_fps(&self, mode: FilterMode) -> FpsEstimate {
        self.records[mode.slot()].estimate()
    }

    pub fn timing(&self, mode: FilterMode) -> &TimingRecord {
        &self.records[mode.slot()]
    }
}
