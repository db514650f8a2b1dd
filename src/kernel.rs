use crate::foundation::error::{VidconvError, VidconvResult};

/// The 3x3 sharpening kernel as it is authored (geometric orientation).
pub const SHARPEN_3X3: [[i32; 3]; 3] = [[-1, -1, 1], [-1, 14, -1], [1, -1, -1]];

/// Normalization divisor paired with [`SHARPEN_3X3`].
///
/// This is a fixed constant for that kernel, not the sum of its weights.
pub const DEFAULT_DIVISOR: i32 = 4;

/// Square, odd-sized integer convolution kernel stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    size: usize,
    weights: Vec<i32>,
}

impl Kernel {
    /// Build a kernel from rows. Rejects empty, non-square and even-sized input.
    pub fn from_rows(rows: &[Vec<i32>]) -> VidconvResult<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(VidconvError::kernel_size("kernel must have at least one row"));
        }
        if size % 2 == 0 {
            return Err(VidconvError::kernel_size(format!(
                "kernel size must be odd (got {size})"
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(VidconvError::kernel_size(format!(
                "kernel must be square: row {i} has {} entries, expected {size}",
                row.len()
            )));
        }

        let weights: Vec<i32> = rows.iter().flatten().copied().collect();
        let reach = weights
            .iter()
            .try_fold(0i32, |acc, w| acc.checked_add(w.checked_abs()?))
            .and_then(|abs_sum| abs_sum.checked_mul(255));
        if reach.is_none() {
            return Err(VidconvError::validation(
                "kernel weights are too large: a 255-valued neighbourhood would overflow i32",
            ));
        }

        Ok(Self { size, weights })
    }

    /// The authored sharpening kernel.
    pub fn sharpen() -> Self {
        Self {
            size: 3,
            weights: SHARPEN_3X3.iter().flatten().copied().collect(),
        }
    }

    /// Side length N.
    pub fn size(&self) -> usize {
        self.size
    }

    /// `N / 2`, the reach of the kernel from its centre.
    pub fn half(&self) -> usize {
        self.size / 2
    }

    /// Row-major weights.
    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    /// Weight at row `ky`, column `kx`.
    pub fn at(&self, ky: usize, kx: usize) -> i32 {
        self.weights[ky * self.size + kx]
    }

    /// Sum of all weights.
    pub fn weight_sum(&self) -> i32 {
        self.weights.iter().sum()
    }

    /// Weights as nested rows, for display and serialization.
    pub fn rows(&self) -> Vec<Vec<i32>> {
        self.weights.chunks(self.size).map(<[i32]>::to_vec).collect()
    }

    /// Rotate the kernel by 180 degrees in place.
    ///
    /// Rows above the middle swap cell-for-cell with their mirror below; for odd N the middle row
    /// then swaps its left half with its reversed right half.
    pub fn rotate_180(&mut self) {
        let n = self.size;
        let half = n / 2;
        for i in 0..half {
            for j in 0..n {
                self.weights.swap(i * n + j, (n - 1 - i) * n + (n - 1 - j));
            }
        }
        if n % 2 == 1 {
            for j in 0..half {
                self.weights.swap(half * n + j, half * n + (n - 1 - j));
            }
        }
    }

    /// Return a copy rotated by 180 degrees.
    pub fn rotated_180(&self) -> Self {
        let mut out = self.clone();
        out.rotate_180();
        out
    }

    /// Return `true` when the kernel equals its own 180 degree rotation.
    pub fn is_point_symmetric(&self) -> bool {
        self.weights.iter().eq(self.weights.iter().rev())
    }
}

/// A kernel in correlation orientation, ready for the convolution loop.
///
/// Only [`prepare`] produces one, so an authored kernel can never reach an engine unflipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedKernel(Kernel);

impl AppliedKernel {
    /// Borrow the underlying weights.
    pub fn kernel(&self) -> &Kernel {
        &self.0
    }

    /// Unwrap into a plain kernel.
    pub fn into_kernel(self) -> Kernel {
        self.0
    }

    /// Side length N.
    pub fn size(&self) -> usize {
        self.0.size
    }

    /// `N / 2`.
    pub fn half(&self) -> usize {
        self.0.half()
    }

    /// Row-major weights.
    pub fn weights(&self) -> &[i32] {
        &self.0.weights
    }
}

/// Convert an authored kernel into the orientation the convolution loop expects.
pub fn prepare(authored: &Kernel) -> AppliedKernel {
    let applied = authored.rotated_180();
    tracing::debug!(size = applied.size, weights = ?applied.weights, "kernel prepared");
    AppliedKernel(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(k: &[&[i32]]) -> Vec<Vec<i32>> {
        k.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn sharpen_rotates_to_expected_layout() {
        let applied = prepare(&Kernel::sharpen());
        assert_eq!(
            applied.kernel().rows(),
            rows(&[&[-1, -1, 1], &[-1, 14, -1], &[1, -1, -1]])
        );
        // The sharpen kernel happens to be its own 180 degree rotation.
        assert!(Kernel::sharpen().is_point_symmetric());
    }

    #[test]
    fn asymmetric_kernel_is_flipped() {
        let k = Kernel::from_rows(&rows(&[&[1, 2, 3], &[4, 5, 6], &[7, 8, 9]])).unwrap();
        let applied = prepare(&k);
        assert_eq!(
            applied.kernel().rows(),
            rows(&[&[9, 8, 7], &[6, 5, 4], &[3, 2, 1]])
        );
        assert_ne!(applied.kernel(), &k);
    }

    #[test]
    fn double_prepare_is_identity() {
        for size in [1usize, 3, 5, 7] {
            let weights: Vec<Vec<i32>> = (0..size)
                .map(|y| (0..size).map(|x| (y * size + x) as i32 - 7).collect())
                .collect();
            let k = Kernel::from_rows(&weights).unwrap();
            let twice = prepare(&prepare(&k).into_kernel()).into_kernel();
            assert_eq!(twice, k, "size {size}");
        }
    }

    #[test]
    fn five_by_five_middle_row_is_reversed() {
        let weights: Vec<Vec<i32>> = (0..5)
            .map(|y| (0..5).map(|x| y * 5 + x).collect())
            .collect();
        let k = Kernel::from_rows(&weights).unwrap();
        let applied = prepare(&k);
        assert_eq!(applied.kernel().rows()[2], vec![14, 13, 12, 11, 10]);
        assert_eq!(applied.kernel().at(0, 0), 24);
        assert_eq!(applied.kernel().at(4, 4), 0);
    }

    #[test]
    fn sharpen_weight_sum_is_ten() {
        assert_eq!(Kernel::sharpen().weight_sum(), 10);
    }

    #[test]
    fn rejects_even_kernel() {
        let err = Kernel::from_rows(&rows(&[&[1, 1], &[1, 1]])).unwrap_err();
        assert!(matches!(err, VidconvError::UnsupportedKernelSize(_)));
    }

    #[test]
    fn rejects_ragged_kernel() {
        let err = Kernel::from_rows(&rows(&[&[1, 1, 1], &[1, 1], &[1, 1, 1]])).unwrap_err();
        assert!(err.to_string().contains("square"));
    }

    #[test]
    fn rejects_weights_that_could_overflow() {
        let err = Kernel::from_rows(&rows(&[&[i32::MAX / 100]])).unwrap_err();
        assert!(matches!(err, VidconvError::Validation(_)));
    }

    #[test]
    fn rejects_empty_kernel() {
        assert!(Kernel::from_rows(&[]).is_err());
    }
}
