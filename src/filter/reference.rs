use crate::filter::{ConvolutionEngine, FilterMode, interior, normalize};
use crate::foundation::core::{CHANNELS, check_rgba_len};
use crate::foundation::error::{VidconvError, VidconvResult};
use crate::kernel::AppliedKernel;

/// Scalar engine: one pixel, one channel, one kernel tap at a time.
#[derive(Debug)]
pub struct ReferenceEngine {
    divisor: i32,
}

impl ReferenceEngine {
    pub fn new(divisor: i32) -> VidconvResult<Self> {
        if divisor == 0 {
            return Err(VidconvError::validation("divisor must be non-zero"));
        }
        Ok(Self { divisor })
    }
}

impl ConvolutionEngine for ReferenceEngine {
    fn mode(&self) -> FilterMode {
        FilterMode::Reference
    }

    fn apply(
        &mut self,
        data: &mut [u8],
        width: u32,
        height: u32,
        kernel: &AppliedKernel,
    ) -> VidconvResult<()> {
        check_rgba_len(data, width, height)?;
        let half = kernel.half();
        let Some((y0, y1)) = interior(width, height, half) else {
            return Ok(());
        };

        let src = data.to_vec();
        let w = width as usize;
        let n = kernel.size();
        let taps = kernel.kernel();

        for y in y0..y1 {
            for x in half..(w - half) {
                let px = (y * w + x) * CHANNELS;
                let mut acc = [0i32; 3];
                for ky in 0..n {
                    for kx in 0..n {
                        let sy = y + ky - half;
                        let sx = x + kx - half;
                        let cpx = (sy * w + sx) * CHANNELS;
                        let weight = taps.at(ky, kx);
                        for (c, sum) in acc.iter_mut().enumerate() {
                            *sum += i32::from(src[cpx + c]) * weight;
                        }
                    }
                }
                for (c, sum) in acc.into_iter().enumerate() {
                    data[px + c] = normalize(sum, self.divisor);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Frame;
    use crate::kernel::{Kernel, prepare};

    fn sharpen() -> AppliedKernel {
        prepare(&Kernel::sharpen())
    }

    #[test]
    fn uniform_5x5_saturates_centre_only() {
        let mut frame = Frame::filled(5, 5, [128, 128, 128, 255]).unwrap();
        let mut engine = ReferenceEngine::new(4).unwrap();
        engine
            .apply(frame.data_mut(), 5, 5, &sharpen())
            .unwrap();

        for y in 0..5 {
            for x in 0..5 {
                let px = frame.pixel(x, y).unwrap();
                let interior = (1..4).contains(&x) && (1..4).contains(&y);
                if interior {
                    assert_eq!(px, [255, 255, 255, 255], "({x}, {y})");
                } else {
                    assert_eq!(px, [128, 128, 128, 255], "({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn reads_neighbours_from_unmodified_input() {
        // Shift-right kernel: output(x) = input(x - 1) after the 180 degree flip.
        let authored = Kernel::from_rows(&[vec![0, 0, 0], vec![0, 0, 1], vec![0, 0, 0]]).unwrap();
        let kernel = prepare(&authored);
        let (w, h) = (5u32, 3u32);
        let mut data = Vec::new();
        for _y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 10) as u8, 0, 0, 255]);
            }
        }
        let mut engine = ReferenceEngine::new(1).unwrap();
        engine.apply(&mut data, w, h, &kernel).unwrap();

        let row1: Vec<u8> = data[(w as usize * 4)..(2 * w as usize * 4)]
            .chunks_exact(4)
            .map(|px| px[0])
            .collect();
        assert_eq!(row1, vec![0, 0, 10, 20, 40]);
    }

    #[test]
    fn negative_sums_clamp_to_zero() {
        let kernel = prepare(&Kernel::from_rows(&[vec![-1]]).unwrap());
        let mut data = vec![200, 100, 0, 77];
        let mut engine = ReferenceEngine::new(1).unwrap();
        engine.apply(&mut data, 1, 1, &kernel).unwrap();
        assert_eq!(data, vec![0, 0, 0, 77]);
    }

    #[test]
    fn length_mismatch_fails_without_writing() {
        let mut data = vec![9u8; 35];
        let mut engine = ReferenceEngine::new(4).unwrap();
        let err = engine.apply(&mut data, 3, 3, &sharpen()).unwrap_err();
        assert!(matches!(err, VidconvError::DimensionMismatch { .. }));
        assert!(data.iter().all(|&b| b == 9));
    }

    #[test]
    fn too_small_frame_is_left_alone() {
        let mut data = vec![50u8; 2 * 7 * 4];
        let mut engine = ReferenceEngine::new(4).unwrap();
        engine.apply(&mut data, 2, 7, &sharpen()).unwrap();
        assert!(data.iter().all(|&b| b == 50));
    }
}
