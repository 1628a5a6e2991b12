//! Tuning constants reproduced exactly from the originating renderer. These are
//! compile-time renderer behavior, not scene-file configuration, so they live as
//! plain `pub const`s rather than a runtime config surface.

use crate::core::pbrt::Float;

pub const MEM_BLOCK_SIZE: usize = 32768;
pub const MEM_ALIGN_SIZE: usize = 4;

pub const TOTAL_SSS_INTERSECTION_CNT: usize = 4;

pub const PMAX: usize = 3;

pub const DISNEY_IOR_IN: Float = 1.5;
pub const DISNEY_IOR_EX: Float = 1.0;
pub const DISNEY_SPECULAR_PDF_SCALE: Float = 8.0;
pub const COAT_TIR_COMPENSATION: Float = 0.2;

pub const BURLEY_MAX_R_D: Float = 16.0;

pub const LUMINANCE_R: Float = 0.212671;
pub const LUMINANCE_G: Float = 0.715160;
pub const LUMINANCE_B: Float = 0.072169;

pub const MAX_BXDFS: usize = 8;
pub const MAX_BSSRDFS: usize = 2;

/// `0.25 * (4 - exp(-max_r_d) - 3*exp(-max_r_d/3))`, the normalizer for Burley's
/// truncated CDF; kept as a `fn` rather than a `const` because `Float::exp` is
/// not a `const fn` in stable Rust.
pub fn burley_max_cdf() -> Float {
    0.25 * (4.0 - (-BURLEY_MAX_R_D).exp() - 3.0 * (-BURLEY_MAX_R_D / 3.0).exp())
}

pub fn burley_inv_max_cdf() -> Float {
    1.0 / burley_max_cdf()
}
