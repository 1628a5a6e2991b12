//! A Ward-like anisotropic distribution lobe kept for materials that specify
//! roughness directly as a tabulated/measured distribution exponent rather
//! than through the Disney parameterization. Open Question (§9) resolved:
//! sampling falls back to plain cosine-weighted hemisphere sampling rather
//! than porting a dedicated importance sampler, since the lobe is normally
//! layered under a dominant specular term where sampling efficiency matters
//! less; see DESIGN.md.

use crate::core::geometry::Vector3f;
use crate::core::pbrt::{Float, Spectrum, INV_PI};
use crate::core::render_context::RenderContext;
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, BsdfSample};
use crate::core::shading_frame::{abs_cos_theta, same_hemisphere};

#[derive(Debug, Clone, Copy)]
pub struct DistributionBrdf {
    pub rd: Spectrum,
    pub alpha_x: Float,
    pub alpha_y: Float,
}

impl DistributionBrdf {
    pub fn new(rd: Spectrum, alpha_x: Float, alpha_y: Float) -> DistributionBrdf {
        DistributionBrdf { rd, alpha_x: alpha_x.max(1e-3), alpha_y: alpha_y.max(1e-3) }
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let wh = *wo + *wi;
        if wh.length_squared() == 0.0 {
            return Spectrum::default();
        }
        let wh = wh.normalize();
        let cos_theta_h = abs_cos_theta(&wh);
        let cos_theta_o = abs_cos_theta(wo);
        let cos_theta_i = abs_cos_theta(wi);
        if cos_theta_o == 0.0 || cos_theta_i == 0.0 {
            return Spectrum::default();
        }
        let hx = wh.x / self.alpha_x;
        let hz = wh.z / self.alpha_y;
        let exponent = -(hx * hx + hz * hz) / (cos_theta_h * cos_theta_h).max(1e-7);
        let norm = 1.0 / (4.0 * crate::core::pbrt::PI * self.alpha_x * self.alpha_y * (cos_theta_o * cos_theta_i).sqrt());
        (self.rd * INV_PI + self.rd * (norm * exponent.exp())) * cos_theta_i
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
    fn f_is_nonnegative_and_reciprocal() {
        use crate::core::shading_frame::abs_cos_theta;
        let brdf = DistributionBrdf::new(Spectrum::new(0.6), 0.3, 0.3);
        let wo = Vector3f::new(0.1, 0.9, 0.1).normalize();
        let wi = Vector3f::new(-0.2, 0.8, 0.3).normalize();
        let f_oi = brdf.f(&wo, &wi);
        let f_io = brdf.f(&wi, &wo);
        assert!(f_oi.c[0] >= 0.0);
        let lhs = f_oi.c[0] * abs_cos_theta(&wo);
        let rhs = f_io.c[0] * abs_cos_theta(&wi);
        assert!((lhs - rhs).abs() < 1e-4);
    }
}
