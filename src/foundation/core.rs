use crate::foundation::error::{VidconvError, VidconvResult};

/// Samples per pixel in every frame buffer (R, G, B, A).
pub const CHANNELS: usize = 4;

/// 0-based index of an animation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Index of the following tick.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Byte length of a tightly packed `width x height` RGBA8 buffer.
///
/// Fails when the size does not fit in `usize`.
pub fn rgba_len(width: u32, height: u32) -> VidconvResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| VidconvError::validation(format!("{width}x{height} frame size overflows")))
}

/// Fail unless `data` is exactly `width * height * 4` bytes long.
pub fn check_rgba_len(data: &[u8], width: u32, height: u32) -> VidconvResult<()> {
    let expected = rgba_len(width, height)?;
    if data.len() != expected {
        return Err(VidconvError::dimension_mismatch(
            width,
            height,
            expected,
            data.len(),
        ));
    }
    Ok(())
}

/// A video frame as straight RGBA8 pixels.
///
/// Owned by whichever stage currently holds it: a source produces it, the filter stage rewrites
/// it in place, and a sink consumes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an RGBA8 buffer, checking its length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VidconvResult<Self> {
        check_rgba_len(&data, width, height)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> VidconvResult<Self> {
        let len = rgba_len(width, height)?;
        let data = rgba.repeat(len / CHANNELS);
        Self::new(width, height, data)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Borrow the packed RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutably borrow the packed RGBA8 bytes. The length cannot change through this view.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// RGBA value of pixel `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        let px = &self.data[idx..idx + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }
}
