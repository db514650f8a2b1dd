use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::filter::{
    ConvolutionEngine, EngineSettings, FilterMode, FilterSet, ReferenceEngine, interior,
};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::VidconvResult;
use crate::kernel::AppliedKernel;
use crate::perf::{FpsEstimate, PerformanceSampler};
use crate::selector::FilterSelector;
use crate::sink::FrameSink;
use crate::source::{FrameSource, SourceFrame};

/// What one displayed tick cost, and the FPS readout after it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub index: FrameIndex,
    pub mode: FilterMode,
    /// Capture + filter + display, wall clock.
    pub elapsed: Duration,
    /// Estimate for `mode` including this tick's sample.
    pub fps: FpsEstimate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Displayed(TickReport),
    /// The source had no frame; nothing was filtered, displayed or timed.
    Skipped,
    /// The source is exhausted.
    Ended,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub frames_displayed: u64,
    pub frames_skipped: u64,
    pub verify_mismatches: u64,
    per_mode: [u64; 3],
}

impl LoopStats {
    /// Frames displayed while `mode` was selected.
    pub fn displayed_in(&self, mode: FilterMode) -> u64 {
        self.per_mode[mode.slot()]
    }
}

/// Drives source -> filter -> sink, one frame per tick, with no overlap between ticks.
///
/// Owns the session state: the prepared kernel, one engine per mode and the per-mode timing
/// records. The frame is exclusively owned by the tick while it is filtered.
pub struct FrameLoop {
    kernel: AppliedKernel,
    filters: FilterSet,
    sampler: PerformanceSampler,
    verifier: Option<ReferenceEngine>,
    max_frames: Option<u64>,
    next_tick: FrameIndex,
    stats: LoopStats,
}

impl FrameLoop {
    /// Build a loop from a validated config. Kernel and settings errors surface here, never
    /// per frame.
    pub fn new(cfg: &SessionConfig) -> VidconvResult<Self> {
        cfg.validate()?;
        let mut lp = Self::with_parts(
            cfg.applied_kernel()?,
            &cfg.engine_settings(),
            PerformanceSampler::new(cfg.fps_window)?,
        )?;
        if cfg.verify {
            lp.verifier = Some(ReferenceEngine::new(cfg.divisor)?);
        }
        Ok(lp)
    }

    pub fn with_parts(
        kernel: AppliedKernel,
        settings: &EngineSettings,
        sampler: PerformanceSampler,
    ) -> VidconvResult<Self> {
        Ok(Self {
            kernel,
            filters: FilterSet::new(settings)?,
            sampler,
            verifier: None,
            max_frames: None,
            next_tick: FrameIndex(0),
            stats: LoopStats::default(),
        })
    }

    /// Stop [`FrameLoop::run`] after this many displayed frames.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn kernel(&self) -> &AppliedKernel {
        &self.kernel
    }

    pub fn sampler(&self) -> &PerformanceSampler {
        &self.sampler
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Whether a `width x height` frame has any pixel the kernel can rewrite.
    pub fn covers_interior(&self, width: u32, height: u32) -> bool {
        interior(width, height, self.kernel.half()).is_some()
    }

    /// Run exactly one tick.
    ///
    /// An engine or sink error aborts the tick and is returned as-is; the loop never falls back
    /// to passthrough on its own.
    pub fn tick(
        &mut self,
        source: &mut dyn FrameSource,
        selector: &mut dyn FilterSelector,
        sink: &mut dyn FrameSink,
    ) -> VidconvResult<TickOutcome> {
        let index = self.next_tick;
        let mode = selector.current_mode(index);
        let started = Instant::now();

        let mut frame = match source.next_frame()? {
            SourceFrame::Ready(frame) => frame,
            SourceFrame::Stalled => {
                tracing::warn!(tick = index.0, "source stalled, skipping tick");
                self.next_tick = index.next();
                self.stats.ticks += 1;
                self.stats.frames_skipped += 1;
                return Ok(TickOutcome::Skipped);
            }
            SourceFrame::Ended => return Ok(TickOutcome::Ended),
        };

        let (width, height) = (frame.width(), frame.height());
        let unfiltered = match (&self.verifier, mode) {
            (Some(_), FilterMode::Accelerated) => Some(frame.data().to_vec()),
            _ => None,
        };

        self.filters
            .apply(mode, frame.data_mut(), width, height, &self.kernel)?;
        sink.push_frame(index, &frame)?;

        let elapsed = started.elapsed();
        self.sampler.record(mode, elapsed);
        let fps = self.sampler.estimate_fps(mode);

        if let (Some(verifier), Some(mut expected)) = (self.verifier.as_mut(), unfiltered) {
            verifier.apply(&mut expected, width, height, &self.kernel)?;
            if expected != frame.data() {
                self.stats.verify_mismatches += 1;
                tracing::warn!(tick = index.0, "accelerated output differs from reference");
            }
        }

        self.next_tick = index.next();
        self.stats.ticks += 1;
        self.stats.frames_displayed += 1;
        self.stats.per_mode[mode.slot()] += 1;
        tracing::trace!(tick = index.0, %mode, ?elapsed, %fps, "tick");

        Ok(TickOutcome::Displayed(TickReport {
            index,
            mode,
            elapsed,
            fps,
        }))
    }

    /// Tick until the source ends (or `max_frames` frames have been displayed).
    ///
    /// `on_tick` sees every displayed tick, e.g. to refresh an FPS readout.
    #[tracing::instrument(skip_all, fields(max_frames = ?self.max_frames))]
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        selector: &mut dyn FilterSelector,
        sink: &mut dyn FrameSink,
        mut on_tick: impl FnMut(&TickReport),
    ) -> VidconvResult<LoopStats> {
        if let Some((width, height)) = source.dimensions() {
            tracing::debug!(width, height, kernel = self.kernel.size(), "frame loop starting");
            if !self.covers_interior(width, height) {
                tracing::warn!(
                    width,
                    height,
                    kernel = self.kernel.size(),
                    "frames have no interior for this kernel; filtering leaves them unchanged"
                );
            }
        }
        sink.begin()?;
        loop {
            if let Some(limit) = self.max_frames
                && self.stats.frames_displayed >= limit
            {
                break;
            }
            match self.tick(source, selector, sink)? {
                TickOutcome::Displayed(report) => on_tick(&report),
                TickOutcome::Skipped => {}
                TickOutcome::Ended => break,
            }
        }
        sink.end()?;

        tracing::info!(
            ticks = self.stats.ticks,
            displayed = self.stats.frames_displayed,
            skipped = self.stats.frames_skipped,
            "frame loop finished"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Frame;
    use crate::selector::{FixedSelector, ScheduledSelector};
    use crate::sink::InMemorySink;
    use crate::source::MemorySource;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::filled(6, 5, [i as u8 * 10, 100, 200, 255]).unwrap())
            .collect()
    }

    #[test]
    fn none_mode_passes_frames_through() {
        let mut lp = FrameLoop::new(&SessionConfig::default()).unwrap();
        let input = frames(3);
        let mut src = MemorySource::new(input.clone());
        let mut sink = InMemorySink::new();
        let stats = lp
            .run(&mut src, &mut FixedSelector(FilterMode::None), &mut sink, |_| {})
            .unwrap();

        assert_eq!(stats.frames_displayed, 3);
        assert_eq!(stats.displayed_in(FilterMode::None), 3);
        for ((idx, out), expected) in sink.frames().iter().zip(&input) {
            assert_eq!(out, expected, "tick {}", idx.0);
        }
    }

    #[test]
    fn stalled_ticks_are_skipped_and_not_timed() {
        let mut lp = FrameLoop::new(&SessionConfig::default()).unwrap();
        let f = Frame::filled(4, 4, [1, 1, 1, 255]).unwrap();
        let mut src = MemorySource::scripted([
            SourceFrame::Stalled,
            SourceFrame::Ready(f.clone()),
            SourceFrame::Stalled,
            SourceFrame::Ready(f),
        ]);
        let mut sink = InMemorySink::new();
        let stats = lp
            .run(
                &mut src,
                &mut FixedSelector(FilterMode::Reference),
                &mut sink,
                |_| {},
            )
            .unwrap();

        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.frames_skipped, 2);
        assert_eq!(stats.frames_displayed, 2);
        let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
        assert_eq!(idx, vec![1, 3]);
        assert_eq!(lp.sampler().timing(FilterMode::Reference).recorded(), 2);
    }

    #[test]
    fn schedule_switches_engines_mid_run() {
        let mut lp = FrameLoop::new(&SessionConfig::default()).unwrap();
        let mut src = MemorySource::new(frames(6));
        let mut sel = ScheduledSelector::parse("0:reference,2:accelerated,4:none").unwrap();
        let mut sink = InMemorySink::new();
        let mut modes = Vec::new();
        let stats = lp
            .run(&mut src, &mut sel, &mut sink, |r| modes.push(r.mode))
            .unwrap();

        assert_eq!(
            modes,
            vec![
                FilterMode::Reference,
                FilterMode::Reference,
                FilterMode::Accelerated,
                FilterMode::Accelerated,
                FilterMode::None,
                FilterMode::None,
            ]
        );
        for mode in FilterMode::ALL {
            assert_eq!(stats.displayed_in(mode), 2);
            assert_eq!(lp.sampler().timing(mode).recorded(), 2);
        }
    }

    #[test]
    fn max_frames_stops_an_endless_source() {
        let mut lp = FrameLoop::new(&SessionConfig::default())
            .unwrap()
            .with_max_frames(Some(5));
        let mut src = crate::source::SyntheticSource::new(8, 8, None).unwrap();
        let mut sink = crate::sink::NullSink::default();
        let stats = lp
            .run(
                &mut src,
                &mut FixedSelector(FilterMode::Accelerated),
                &mut sink,
                |_| {},
            )
            .unwrap();
        assert_eq!(stats.frames_displayed, 5);
        assert_eq!(sink.frames, 5);
    }

    #[test]
    fn interior_check_uses_source_dimensions() {
        let lp = FrameLoop::new(&SessionConfig::default()).unwrap();
        let small = crate::source::SyntheticSource::new(2, 9, Some(1)).unwrap();
        let (w, h) = small.dimensions().unwrap();
        assert!(!lp.covers_interior(w, h));
        let big = crate::source::SyntheticSource::new(3, 3, Some(1)).unwrap();
        let (w, h) = big.dimensions().unwrap();
        assert!(lp.covers_interior(w, h));
    }

    #[test]
    fn verify_mode_reports_no_mismatches() {
        let cfg = SessionConfig {
            verify: true,
            threads: Some(2),
            ..SessionConfig::default()
        };
        let mut lp = FrameLoop::new(&cfg).unwrap().with_max_frames(Some(3));
        let mut src = crate::source::SyntheticSource::new(33, 17, None).unwrap();
        let mut sink = crate::sink::NullSink::default();
        let stats = lp
            .run(
                &mut src,
                &mut FixedSelector(FilterMode::Accelerated),
                &mut sink,
                |_| {},
            )
            .unwrap();
        assert_eq!(stats.verify_mismatches, 0);
    }
}
