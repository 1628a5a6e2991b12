//! Metal/dielectric blend BxDF grounded on `kylin_principle.cpp`: a single
//! Schlick-Fresnel specular lobe whose F0 blends a dielectric baseline toward
//! `base_color` by `metallic`, layered over a Lambertian diffuse term that is
//! energy-weighted against the specular intensity.

use crate::core::fresnel::{fr_schlick_spectrum, schlick_weight};
use crate::core::geometry::{dot, Vector3f};
use crate::core::pbrt::{lerp, Float, Spectrum, INV_PI};
use crate::core::render_context::RenderContext;
use crate::core::reflection::BxdfType;
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, BsdfSample};
use crate::core::shading_frame::{abs_cos_theta, same_hemisphere};

/// `F0 = 0.08 * specular` for the non-metallic dielectric baseline.
pub fn dielectric_specular_to_f0(specular: Float) -> Float {
    0.08 * specular
}

pub fn compute_f0(specular: Float, base_color: Spectrum, metallic: Float) -> Spectrum {
    let dielectric_f0 = Spectrum::new(dielectric_specular_to_f0(specular));
    dielectric_f0 + (base_color - dielectric_f0) * metallic
}

#[derive(Debug, Clone, Copy)]
pub struct KylinPrinciple {
    pub base_color: Spectrum,
    pub specular: Float,
    pub metallic: Float,
    pub roughness: Float,
    f0: Spectrum,
}

impl KylinPrinciple {
    pub fn new(base_color: Spectrum, specular: Float, metallic: Float, roughness: Float) -> KylinPrinciple {
        let f0 = compute_f0(specular, base_color, metallic);
        KylinPrinciple { base_color, specular, metallic, roughness, f0 }
    }

    pub fn get_type(&self) -> BxdfType {
        BxdfType::REFLECTION | BxdfType::GLOSSY
    }

    fn diffuse(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        let fl = schlick_weight(abs_cos_theta(wi));
        let fv = schlick_weight(abs_cos_theta(wo));
        self.base_color * INV_PI * (1.0 - self.metallic) * (1.0 - 0.5 * fl) * (1.0 - 0.5 * fv)
    }

    fn specular(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        let wh = *wo + *wi;
        if wh.length_squared() == 0.0 {
            return Spectrum::default();
        }
        let wh = wh.normalize();
        let dist = crate::core::microfacet::MicrofacetDistribution::ggx(self.roughness, self.roughness);
        let d = dist.d(&wh);
        let g = dist.g(wo, wi);
        let f = fr_schlick_spectrum(self.f0, dot(wi, &wh).abs());
        f * (d * g / (4.0 * abs_cos_theta(wo) * abs_cos_theta(wi)).max(1e-6))
    }

    /// Sampling-only diffuse/specular split. A `+0.1` epsilon nudges the
    /// ratio toward specular relative to the evaluation-time weighting, the
    /// originating code's deliberate firefly-reduction fudge.
    fn sample_diffuse_ratio(&self) -> Float {
        let diffuse_intensity = self.base_color.get_intensity() * (1.0 - self.metallic);
        let f0_intensity = self.f0.get_intensity() + 0.1;
        diffuse_intensity / (diffuse_intensity + f0_intensity).max(1e-6)
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        (self.diffuse(wo, wi) + self.specular(wo, wi)) * abs_cos_theta(wi)
    }

    pub fn sample_f(&self, wo: &Vector3f, bs: BsdfSample, _rc: &RenderContext) -> (Vector3f, Float, Spectrum) {
        let diffuse_ratio = self.sample_diffuse_ratio();
        let wi = if bs.u < diffuse_ratio {
            let u2 = bs.u / diffuse_ratio.max(1e-6);
            let mut wi = cosine_sample_hemisphere(u2, bs.v);
            if wo.y < 0.0 {
                wi.y *= -1.0;
            }
            wi
        } else {
            let u2 = (bs.u - diffuse_ratio) / (1.0 - diffuse_ratio).max(1e-6);
            let dist = crate::core::microfacet::MicrofacetDistribution::ggx(self.roughness, self.roughness);
            let wh = dist.sample_wh(BsdfSample::new(u2, bs.v));
            let wh = if wo.y < 0.0 { -wh } else { wh };
            crate::core::shading_frame::reflect(wo, &wh)
        };
        if !same_hemisphere(wo, &wi) {
            return (wi, 0.0, Spectrum::default());
        }
        let pdf = self.pdf(wo, &wi);
        (wi, pdf, self.f(wo, &wi))
    }

    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if !same_hemisphere(wo, wi) {
            return 0.0;
        }
        let diffuse_ratio = self.sample_diffuse_ratio();
        let diffuse_pdf = cosine_hemisphere_pdf(abs_cos_theta(wi));
        let wh = (*wo + *wi).normalize();
        let dist = crate::core::microfacet::MicrofacetDistribution::ggx(self.roughness, self.roughness);
        let specular_pdf = dist.pdf(&wh) / (4.0 * dot(wo, &wh));
        lerp(diffuse_ratio, specular_pdf, diffuse_pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metal_f0_matches_base_color() {
        let f0 = compute_f0(0.5, Spectrum::rgb(0.8, 0.2, 0.1), 1.0);
        assert_eq!(f0.c, [0.8, 0.2, 0.1]);
    }

    #[test]
    fn dielectric_f0_is_small() {
        let f0 = compute_f0(0.5, Spectrum::rgb(0.8, 0.2, 0.1), 0.0);
        assert!((f0.c[0] - 0.04).abs() < 1e-5);
    }

    #[test]
    fn pdf_is_nonnegative() {
        let brdf = KylinPrinciple::new(Spectrum::rgb(0.6, 0.6, 0.6), 0.5, 0.0, 0.3);
        let wo = Vector3f::new(0.0, 1.0, 0.0);
        let wi = Vector3f::new(0.1, 0.9, 0.1).normalize();
        assert!(brdf.pdf(&wo, &wi) >= 0.0);
    }
}
