use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::foundation::core::{CHANNELS, Frame};
use crate::foundation::error::{VidconvError, VidconvResult};

/// What a source yields for one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceFrame {
    /// A freshly captured frame.
    Ready(Frame),
    /// No new frame this tick (decoder stall). The driver skips the tick.
    Stalled,
    /// The source is exhausted; the loop ends.
    Ended,
}

/// Produces one RGBA8 frame per tick.
pub trait FrameSource {
    fn next_frame(&mut self) -> VidconvResult<SourceFrame>;

    /// Frame dimensions, when known ahead of the first frame.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Deterministic moving test pattern: diagonal colour gradients scrolling one pixel per frame,
/// with a checkerboard in the blue channel and opaque alpha.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frames: Option<u64>,
    produced: u64,
}

impl SyntheticSource {
    /// `frames: None` produces frames forever.
    pub fn new(width: u32, height: u32, frames: Option<u64>) -> VidconvResult<Self> {
        if width == 0 || height == 0 {
            return Err(VidconvError::validation(
                "synthetic source dimensions must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            frames,
            produced: 0,
        })
    }

    fn render(&self, t: u64) -> VidconvResult<Frame> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = t as usize;
        let mut data = Vec::with_capacity(w * h * CHANNELS);
        for y in 0..h {
            for x in 0..w {
                let r = ((x + shift) * 255 / w.max(1)) as u8;
                let g = ((y + shift / 2) * 255 / h.max(1)) as u8;
                let b = if ((x + shift) / 8 + y / 8) % 2 == 0 { 40 } else { 210 };
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
        Frame::new(self.width, self.height, data)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> VidconvResult<SourceFrame> {
        if let Some(limit) = self.frames
            && self.produced >= limit
        {
            return Ok(SourceFrame::Ended);
        }
        let frame = self.render(self.produced)?;
        self.produced += 1;
        Ok(SourceFrame::Ready(frame))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

/// Decodes a directory of still images, in file-name order, as consecutive frames.
///
/// Every image must have the same dimensions as the first one.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    dims: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    const EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

    pub fn open(dir: impl AsRef<Path>) -> VidconvResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            VidconvError::source(format!("read frame directory '{}': {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VidconvError::source(e.to_string()))?;
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| Self::EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(VidconvError::source(format!(
                "no image frames found in '{}'",
                dir.display()
            )));
        }
        paths.sort();
        tracing::debug!(frames = paths.len(), dir = %dir.display(), "image sequence opened");

        Ok(Self {
            paths: paths.into(),
            dims: None,
        })
    }

    /// Frames not yet decoded.
    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> VidconvResult<SourceFrame> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(SourceFrame::Ended);
        };
        let img = image::open(&path)
            .map_err(|e| VidconvError::source(format!("decode '{}': {e}", path.display())))?
            .into_rgba8();
        let (w, h) = img.dimensions();
        match self.dims {
            None => self.dims = Some((w, h)),
            Some((ew, eh)) if (ew, eh) != (w, h) => {
                return Err(VidconvError::source(format!(
                    "frame '{}' is {w}x{h}, expected {ew}x{eh}",
                    path.display()
                )));
            }
            Some(_) => {}
        }
        Ok(SourceFrame::Ready(Frame::new(w, h, img.into_raw())?))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dims
    }
}

/// Pre-built ticks, replayed in order. Useful for tests and for re-running captured frames.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    ticks: VecDeque<SourceFrame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            ticks: frames.into_iter().map(SourceFrame::Ready).collect(),
        }
    }

    /// Replay an explicit script of ticks, including stalls.
    pub fn scripted(ticks: impl IntoIterator<Item = SourceFrame>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> VidconvResult<SourceFrame> {
        Ok(self.ticks.pop_front().unwrap_or(SourceFrame::Ended))
    }
}
