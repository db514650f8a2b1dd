use std::path::PathBuf;

use crate::foundation::core::{Frame, FrameIndex};
use crate::foundation::error::{VidconvError, VidconvResult};

/// Display side of the loop. Receives every displayed frame in tick order.
///
/// Ordering contract: `push_frame` is called with strictly increasing `FrameIndex` between one
/// `begin` and the matching `end`.
pub trait FrameSink {
    /// Called once before any frames are pushed.
    fn begin(&mut self) -> VidconvResult<()> {
        Ok(())
    }
    /// Present one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VidconvResult<()>;
    /// Called once after the last frame.
    fn end(&mut self) -> VidconvResult<()> {
        Ok(())
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    frames: Vec<(FrameIndex, Frame)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, Frame)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self) -> VidconvResult<()> {
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VidconvResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }
}

/// Discards frames but counts them. Used when only throughput matters.
#[derive(Debug, Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn push_frame(&mut self, _idx: FrameIndex, _frame: &Frame) -> VidconvResult<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Writes each frame as `frame_NNNNNN.png` into a directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path_for(&self, idx: FrameIndex) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", idx.0))
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self) -> VidconvResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            VidconvError::sink(format!("create output dir '{}': {e}", self.dir.display()))
        })
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> VidconvResult<()> {
        let path = self.path_for(idx);
        image::save_buffer_with_format(
            &path,
            frame.data(),
            frame.width(),
            frame.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| VidconvError::sink(format!("write png '{}': {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> VidconvResult<()> {
        tracing::info!(frames = self.written, dir = %self.dir.display(), "png sequence written");
        Ok(())
    }
}
