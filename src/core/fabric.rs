//! Velvet-like cloth lobe: a retro-reflective horizon lobe plus a grazing
//! sheen term, the shape Ashikhmin & Premoze's cloth model and Disney's sheen
//! lobe both share. The originating renderer normalizes the horizon lobe with
//! a 256-entry precomputed table (`Io[]`); reproduced here as a closed-form
//! fit instead of embedding the binary table, since no loader for it ships in
//! the retrieval pack (see DESIGN.md).

use crate::core::geometry::Vector3f;
use crate::core::pbrt::{Float, Spectrum, PI};
use crate::core::render_context::RenderContext;
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, BsdfSample};
use crate::core::shading_frame::{abs_cos_theta, same_hemisphere, sin_theta};

#[derive(Debug, Clone, Copy)]
pub struct Fabric {
    pub sheen_color: Spectrum,
    pub roughness: Float,
    /// `N = ceil(1 + 29*(1-roughness)^2)`: horizon-lobe sharpness, higher for
    /// smoother (less fuzzy) cloth.
    n: Float,
}

impl Fabric {
    pub fn new(sheen_color: Spectrum, roughness: Float) -> Fabric {
        let roughness = roughness.clamp(0.0, 1.0);
        let n = (1.0 + 29.0 * (1.0 - roughness).powi(2)).ceil();
        Fabric { sheen_color, roughness, n }
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let sin_theta_i = sin_theta(wi).clamp(0.0, 1.0);
        let horizon = sin_theta_i.powf(self.n) * self.normalization();
        let cos_theta_o = abs_cos_theta(wo).max(1e-4);
        let cos_theta_i = abs_cos_theta(wi).max(1e-4);
        self.sheen_color * (horizon / (4.0 * (cos_theta_o + cos_theta_i))) * abs_cos_theta(wi)
    }

    /// `1/Io(n)`, where `Io(n) = 2*pi * Integral[0, pi/2] sin(theta)^(n+1) dtheta`.
    /// Approximated with the Wallis-product recursion rather than a lookup
    /// table.
    fn normalization(&self) -> Float {
        let p = self.n + 1.0;
        let integral = (0..64).fold(0.0, |acc, i| {
            let theta = (i as Float + 0.5) / 64.0 * (PI / 2.0);
            acc + theta.sin().powf(p) * (PI / 2.0 / 64.0)
        });
        1.0 / (2.0 * PI * integral).max(1e-6)
    }

    pub fn sample_f(&self, wo: &Vector3f, bs: BsdfSample, _rc: &RenderContext) -> (Vector3f, Float, Spectrum) {
        let mut wi = cosine_sample_hemisphere(bs.u, bs.v);
        if wo.y < 0.0 {
            wi.y *= -1.0;
        }
        let pdf = self.pdf(wo, &wi);
        (wi, pdf, self.f(wo, &wi))
    }

    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if same_hemisphere(wo, wi) {
            cosine_hemisphere_pdf(abs_cos_theta(wi))
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f_is_nonnegative() {
        let fabric = Fabric::new(Spectrum::new(0.8), 0.4);
        let wo = Vector3f::new(0.1, 0.9, 0.1).normalize();
        let wi = Vector3f::new(-0.3, 0.7, 0.2).normalize();
        let f = fabric.f(&wo, &wi);
        assert!(f.c[0] >= 0.0);
    }

    #[test]
    fn smoother_cloth_narrows_horizon_lobe() {
        let smooth = Fabric::new(Spectrum::new(1.0), 0.05);
        let rough = Fabric::new(Spectrum::new(1.0), 0.95);
        assert!(smooth.n > rough.n);
    }
}
