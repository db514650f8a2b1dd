use rayon::prelude::*;

use crate::filter::{ConvolutionEngine, EngineSettings, FilterMode, interior, normalize};
use crate::foundation::core::{CHANNELS, check_rgba_len};
use crate::foundation::error::{VidconvError, VidconvResult};
use crate::kernel::AppliedKernel;

/// Row-parallel engine working inside a private region.
///
/// Each call copies the caller's frame into `input`, computes into `output`, and copies the
/// result back. Both buffers are reused across calls and only grow. The copies are part of the
/// measured cost of this path.
pub struct AcceleratedEngine {
    divisor: i32,
    pool: rayon::ThreadPool,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl AcceleratedEngine {
    pub fn new(settings: &EngineSettings) -> VidconvResult<Self> {
        settings.validate()?;
        let pool = build_thread_pool(settings.threads)?;
        tracing::debug!(threads = pool.current_num_threads(), "accelerated engine ready");
        Ok(Self {
            divisor: settings.divisor,
            pool,
            input: Vec::new(),
            output: Vec::new(),
        })
    }

    #[cfg(test)]
    fn region_capacity(&self) -> usize {
        self.input.capacity() + self.output.capacity()
    }

    /// Worker threads in the engine's pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ConvolutionEngine for AcceleratedEngine {
    fn mode(&self) -> FilterMode {
        FilterMode::Accelerated
    }

    fn apply(
        &mut self,
        data: &mut [u8],
        width: u32,
        height: u32,
        kernel: &AppliedKernel,
    ) -> VidconvResult<()> {
        check_rgba_len(data, width, height)?;
        let Some((y0, y1)) = interior(width, height, kernel.half()) else {
            return Ok(());
        };

        // copy-in
        self.input.clear();
        self.input.extend_from_slice(data);
        self.output.clear();
        self.output.extend_from_slice(data);

        let row_bytes = width as usize * CHANNELS;
        let divisor = self.divisor;
        let input = self.input.as_slice();
        let rows = &mut self.output[y0 * row_bytes..y1 * row_bytes];

        self.pool.install(|| {
            rows.par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(i, out_row)| {
                    let y = y0 + i;
                    if kernel.size() == 3 {
                        convolve_row_3x3(input, out_row, y, row_bytes, kernel.weights(), divisor);
                    } else {
                        convolve_row(input, out_row, y, row_bytes, kernel, divisor);
                    }
                });
        });

        // copy-out
        data[y0 * row_bytes..y1 * row_bytes].copy_from_slice(rows);
        Ok(())
    }
}

/// Fully unrolled 3x3 row: three source rows are sliced once and walked in lockstep.
fn convolve_row_3x3(
    input: &[u8],
    out_row: &mut [u8],
    y: usize,
    row_bytes: usize,
    k: &[i32],
    divisor: i32,
) {
    let above = &input[(y - 1) * row_bytes..y * row_bytes];
    let here = &input[y * row_bytes..(y + 1) * row_bytes];
    let below = &input[(y + 1) * row_bytes..(y + 2) * row_bytes];
    let k: [i32; 9] = [k[0], k[1], k[2], k[3], k[4], k[5], k[6], k[7], k[8]];

    let width = row_bytes / CHANNELS;
    for x in 1..width - 1 {
        let l = (x - 1) * CHANNELS;
        let m = x * CHANNELS;
        let r = (x + 1) * CHANNELS;
        for c in 0..3 {
            let sum = k[0] * i32::from(above[l + c])
                + k[1] * i32::from(above[m + c])
                + k[2] * i32::from(above[r + c])
                + k[3] * i32::from(here[l + c])
                + k[4] * i32::from(here[m + c])
                + k[5] * i32::from(here[r + c])
                + k[6] * i32::from(below[l + c])
                + k[7] * i32::from(below[m + c])
                + k[8] * i32::from(below[r + c]);
            out_row[m + c] = normalize(sum, divisor);
        }
    }
}

/// General odd-N row: each kernel row contributes one contiguous source slice.
fn convolve_row(
    input: &[u8],
    out_row: &mut [u8],
    y: usize,
    row_bytes: usize,
    kernel: &AppliedKernel,
    divisor: i32,
) {
    let n = kernel.size();
    let half = kernel.half();
    let width = row_bytes / CHANNELS;

    for x in half..width - half {
        let mut acc = [0i32; 3];
        for (ky, taps) in kernel.weights().chunks_exact(n).enumerate() {
            let sy = y + ky - half;
            let start = sy * row_bytes + (x - half) * CHANNELS;
            let window = &input[start..start + n * CHANNELS];
            for (px, &weight) in window.chunks_exact(CHANNELS).zip(taps) {
                acc[0] += i32::from(px[0]) * weight;
                acc[1] += i32::from(px[1]) * weight;
                acc[2] += i32::from(px[2]) * weight;
            }
        }
        let o = x * CHANNELS;
        out_row[o] = normalize(acc[0], divisor);
        out_row[o + 1] = normalize(acc[1], divisor);
        out_row[o + 2] = normalize(acc[2], divisor);
    }
}

fn build_thread_pool(threads: Option<usize>) -> VidconvResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(VidconvError::validation(
            "accelerated engine 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("vidconv-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| VidconvError::validation(format!("failed to build rayon thread pool: {e}")))
}
