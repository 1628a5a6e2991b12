//! Canonical sampling primitives: the `(u, v)` sample carrier and the
//! cosine-weighted / uniform hemisphere and sphere samplers every default
//! `sample_f` falls back to.

use crate::core::geometry::Vector3f;
use crate::core::pbrt::{Float, INV_TWO_PI, PI, TWO_PI};
use crate::core::render_context::RenderContext;

/// Two canonical reals in `[0, 1)²`. Immutable once constructed; either
/// supplied directly or drawn fresh from the context's RNG.
#[derive(Debug, Copy, Clone)]
pub struct BsdfSample {
    pub u: Float,
    pub v: Float,
}

impl BsdfSample {
    pub fn new(u: Float, v: Float) -> BsdfSample {
        BsdfSample { u, v }
    }

    pub fn from_rng(rc: &RenderContext) -> BsdfSample {
        BsdfSample { u: rc.uniform_float(), v: rc.uniform_float() }
    }
}

/// Shirley's concentric mapping from the unit square to the unit disk, used
/// by every cosine-weighted hemisphere sampler so that neighboring samples in
/// `(u, v)` stay neighbors on the disk (low distortion vs. the naive polar
/// mapping).
pub fn concentric_sample_disk(u: Float, v: Float) -> (Float, Float) {
    let ox = 2.0 * u - 1.0;
    let oy = 2.0 * v - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return (0.0, 0.0);
    }
    let (r, theta) = if ox.abs() > oy.abs() {
        (ox, PI / 4.0 * (oy / ox))
    } else {
        (oy, PI / 2.0 - PI / 4.0 * (ox / oy))
    };
    (r * theta.cos(), r * theta.sin())
}

pub fn cosine_sample_hemisphere(u: Float, v: Float) -> Vector3f {
    let (dx, dz) = concentric_sample_disk(u, v);
    let y = (1.0 - dx * dx - dz * dz).max(0.0).sqrt();
    Vector3f::new(dx, y, dz)
}

pub fn cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta.abs() * std::f32::consts::FRAC_1_PI
}

pub fn uniform_sample_hemisphere(u: Float, v: Float) -> Vector3f {
    let z = u;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TWO_PI * v;
    Vector3f::new(r * phi.cos(), z, r * phi.sin())
}

pub fn uniform_hemisphere_pdf() -> Float {
    INV_TWO_PI
}

pub fn uniform_sample_sphere(u: Float, v: Float) -> Vector3f {
    let z = 1.0 - 2.0 * u;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TWO_PI * v;
    Vector3f::new(r * phi.cos(), z, r * phi.sin())
}

pub fn uniform_sphere_pdf() -> Float {
    1.0 / (4.0 * PI)
}

pub fn uniform_cone_pdf(cos_theta_max: Float) -> Float {
    1.0 / (TWO_PI * (1.0 - cos_theta_max))
}

pub fn uniform_sample_cone(u: Float, v: Float, cos_theta_max: Float) -> Vector3f {
    let cos_theta = (1.0 - u) + u * cos_theta_max;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = v * TWO_PI;
    Vector3f::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin())
}

pub fn power_heuristic(nf: i32, f_pdf: Float, ng: i32, g_pdf: Float) -> Float {
    let f = nf as Float * f_pdf;
    let g = ng as Float * g_pdf;
    if (f * f + g * g) == 0.0 {
        0.0
    } else {
        (f * f) / (f * f + g * g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn cosine_samples_land_in_upper_hemisphere(u in 0.0f32..1.0, v in 0.0f32..1.0) {
            let w = cosine_sample_hemisphere(u, v);
            prop_assert!(w.y >= 0.0);
            prop_assert!((w.length_squared() - 1.0).abs() < 1e-3);
        }

        #[test]
        fn uniform_sphere_samples_are_unit_length(u in 0.0f32..1.0, v in 0.0f32..1.0) {
            let w = uniform_sample_sphere(u, v);
            prop_assert!((w.length_squared() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn cosine_pdf_matches_e1_seed() {
        // E1: Lambert pdf at wo = (0,1,0) is 1/pi.
        assert!((cosine_hemisphere_pdf(1.0) - std::f32::consts::FRAC_1_PI).abs() < 1e-5);
    }
}
