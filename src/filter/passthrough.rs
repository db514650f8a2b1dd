use crate::filter::{ConvolutionEngine, FilterMode};
use crate::foundation::core::check_rgba_len;
use crate::foundation::error::VidconvResult;
use crate::kernel::AppliedKernel;

/// The unfiltered path. Still validates the frame so a malformed buffer fails the same way in
/// every mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEngine;

impl ConvolutionEngine for PassthroughEngine {
    fn mode(&self) -> FilterMode {
        FilterMode::None
    }

    fn apply(
        &mut self,
        data: &mut [u8],
        width: u32,
        height: u32,
        _kernel: &AppliedKernel,
    ) -> VidconvResult<()> {
        check_rgba_len(data, width, height)
    }
}
