use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::filter::FilterMode;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VidconvError, VidconvResult};

/// Decides which filter path a tick uses. Read once, at the start of every tick.
pub trait FilterSelector {
    fn current_mode(&mut self, tick: FrameIndex) -> FilterMode;
}

/// Always the same mode.
#[derive(Clone, Copy, Debug)]
pub struct FixedSelector(pub FilterMode);

impl FilterSelector for FixedSelector {
    fn current_mode(&mut self, _tick: FrameIndex) -> FilterMode {
        self.0
    }
}

/// Switches mode at fixed tick indices.
///
/// Before the first switch point the mode is [`FilterMode::None`].
#[derive(Clone, Debug)]
pub struct ScheduledSelector {
    points: Vec<(FrameIndex, FilterMode)>,
}

impl ScheduledSelector {
    pub fn new(mut points: Vec<(FrameIndex, FilterMode)>) -> VidconvResult<Self> {
        if points.is_empty() {
            return Err(VidconvError::validation("mode schedule must not be empty"));
        }
        points.sort_by_key(|(at, _)| *at);
        if let Some(pair) = points.windows(2).find(|p| p[0].0 == p[1].0) {
            return Err(VidconvError::validation(format!(
                "mode schedule switches twice at tick {}",
                pair[0].0.0
            )));
        }
        Ok(Self { points })
    }

    /// Parse `"0:reference,120:accelerated,240:none"`.
    pub fn parse(text: &str) -> VidconvResult<Self> {
        let mut points: Vec<(FrameIndex, FilterMode)> = Vec::new();
        for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (at, mode) = item.split_once(':').ok_or_else(|| {
                VidconvError::validation(format!("schedule entry '{item}' must be TICK:MODE"))
            })?;
            let at: u64 = at.trim().parse().map_err(|_| {
                VidconvError::validation(format!("schedule tick '{at}' is not an integer"))
            })?;
            points.push((FrameIndex(at), mode.parse()?));
        }
        Self::new(points)
    }
}

impl FilterSelector for ScheduledSelector {
    fn current_mode(&mut self, tick: FrameIndex) -> FilterMode {
        self.points
            .iter()
            .take_while(|(at, _)| *at <= tick)
            .last()
            .map(|(_, mode)| *mode)
            .unwrap_or(FilterMode::None)
    }
}

/// A mode switch that can be flipped from another thread while the loop runs.
///
/// Clones share the same state.
#[derive(Clone, Debug)]
pub struct ModeSwitch {
    mode: Arc<AtomicU8>,
}

impl ModeSwitch {
    pub fn new(initial: FilterMode) -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(encode(initial))),
        }
    }

    pub fn set(&self, mode: FilterMode) {
        self.mode.store(encode(mode), Ordering::Release);
    }

    pub fn get(&self) -> FilterMode {
        decode(self.mode.load(Ordering::Acquire))
    }
}

impl FilterSelector for ModeSwitch {
    fn current_mode(&mut self, _tick: FrameIndex) -> FilterMode {
        self.get()
    }
}

fn encode(mode: FilterMode) -> u8 {
    mode.slot() as u8
}

fn decode(v: u8) -> FilterMode {
    FilterMode::ALL
        .get(v as usize)
        .copied()
        .unwrap_or(FilterMode::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_picks_latest_point() {
        let mut s = ScheduledSelector::parse("10:accelerated, 2:reference").unwrap();
        assert_eq!(s.current_mode(FrameIndex(0)), FilterMode::None);
        assert_eq!(s.current_mode(FrameIndex(2)), FilterMode::Reference);
        assert_eq!(s.current_mode(FrameIndex(9)), FilterMode::Reference);
        assert_eq!(s.current_mode(FrameIndex(10)), FilterMode::Accelerated);
        assert_eq!(s.current_mode(FrameIndex(1000)), FilterMode::Accelerated);
    }

    #[test]
    fn schedule_rejects_garbage() {
        assert!(ScheduledSelector::parse("").is_err());
        assert!(ScheduledSelector::parse("x:reference").is_err());
        assert!(ScheduledSelector::parse("3").is_err());
        assert!(ScheduledSelector::parse("3:turbo").is_err());
        assert!(ScheduledSelector::parse("3:none,3:reference").is_err());
    }

    #[test]
    fn mode_switch_is_shared_across_threads() {
        let switch = ModeSwitch::new(FilterMode::Reference);
        let remote = switch.clone();
        std::thread::spawn(move || remote.set(FilterMode::None))
            .join()
            .unwrap();
        let mut local = switch;
        assert_eq!(local.current_mode(FrameIndex(0)), FilterMode::None);
    }

    #[test]
    fn fixed_selector_never_changes() {
        let mut s = FixedSelector(FilterMode::Accelerated);
        assert_eq!(s.current_mode(FrameIndex(5)), FilterMode::Accelerated);
    }
}
