//! Layered materials: a clear dielectric coat over an arbitrary bottom
//! layer, and a two-sided material that switches its entire scattering event
//! by which side of the surface `wo` is on. Both nest a full
//! `ScatteringEvent` rather than a single lobe.
//!
//! The nested event is owned (`Box<ScatteringEvent>`) rather than an
//! arena-resident reference with an explicit lifetime parameter threaded
//! through `Bxdf`/`ScatteringEvent`; see DESIGN.md for why the lifetime
//! plumbing wasn't worth it here.
//!
//! A nested `ScatteringEvent` is always evaluated directly in its parent's
//! local (`y` = cosθ) space, so callers must build it with shading normal
//! `(0, 1, 0)` and tangent `(1, 0, 0)` — an identity frame — rather than a
//! world-space normal.

use crate::consts::COAT_TIR_COMPENSATION;
use crate::core::fresnel::fr_dielectric;
use crate::core::geometry::Vector3f;
use crate::core::microfacet::MicrofacetDistribution;
use crate::core::pbrt::{Float, Spectrum};
use crate::core::render_context::RenderContext;
use crate::core::reflection::BxdfType;
use crate::core::sampling::BsdfSample;
use crate::core::scattering_event::ScatteringEvent;
use crate::core::shading_frame::{abs_cos_theta, cos_theta, refract, same_hemisphere};

#[derive(Debug, Clone)]
pub struct Coat {
    pub eta: Float,
    pub roughness: Float,
    pub thickness: Float,
    pub sigma_a: Spectrum,
    bottom: Box<ScatteringEvent>,
}

impl Coat {
    pub fn new(eta: Float, roughness: Float, thickness: Float, sigma_a: Spectrum, bottom: ScatteringEvent) -> Coat {
        Coat { eta, roughness, thickness, sigma_a, bottom: Box::new(bottom) }
    }

    pub fn get_type(&self) -> BxdfType {
        BxdfType::REFLECTION | BxdfType::GLOSSY
    }

    fn top_f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let wh = *wo + *wi;
        if wh.length_squared() == 0.0 {
            return Spectrum::default();
        }
        let wh = wh.normalize();
        let dist = MicrofacetDistribution::ggx(self.roughness, self.roughness);
        let d = dist.d(&wh);
        let g = dist.g(wo, wi);
        let fr = fr_dielectric(crate::core::geometry::dot(wi, &wh), 1.0, self.eta);
        Spectrum::new(fr * d * g / (4.0 * abs_cos_theta(wo)).max(1e-6))
    }

    /// Beer-Lambert attenuation for the round trip through the coat at the
    /// refracted angle, applied to whatever the bottom layer returns.
    fn absorption(&self, cos_theta_refracted: Float) -> Spectrum {
        if self.thickness <= 0.0 || cos_theta_refracted <= 0.0 {
            return Spectrum::new(1.0);
        }
        let path_length = 2.0 * self.thickness / cos_theta_refracted;
        (-self.sigma_a * path_length).exp()
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        let top = self.top_f(wo, wi);
        let (wo_t, tir_o) = refract(wo, &Vector3f::new(0.0, 1.0, 0.0), 1.0 / self.eta);
        let (wi_t, tir_i) = refract(wi, &Vector3f::new(0.0, 1.0, 0.0), 1.0 / self.eta);
        if tir_o || tir_i {
            return top;
        }
        let bottom_f = self.bottom.evaluate_bsdf(&wo_t, &wi_t, BxdfType::ALL);
        let atten = self.absorption(cos_theta(&wo_t).abs()) * self.absorption(cos_theta(&wi_t).abs());
        let fr_o = fr_dielectric(cos_theta(wo), 1.0, self.eta);
        let fr_i = fr_dielectric(cos_theta(wi), 1.0, self.eta);
        top + bottom_f * atten * (1.0 - fr_o) * (1.0 - fr_i)
    }

    pub fn sample_f(&self, wo: &Vector3f, bs: BsdfSample, rc: &RenderContext) -> (Vector3f, Float, Spectrum) {
        let fr_o = fr_dielectric(cos_theta(wo), 1.0, self.eta);
        if rc.uniform_float() < fr_o {
            let dist = MicrofacetDistribution::ggx(self.roughness, self.roughness);
            let wh = dist.sample_wh(bs);
            let wh = if wo.y < 0.0 { -wh } else { wh };
            let wi = crate::core::shading_frame::reflect(wo, &wh);
            if !same_hemisphere(wo, &wi) {
                return (Vector3f::zero(), 0.0, Spectrum::default());
            }
            let pdf = dist.pdf(&wh) / (4.0 * crate::core::geometry::dot(wo, &wh)) * fr_o;
            return (wi, pdf, self.top_f(wo, &wi) * fr_o);
        }

        let (wo_t, tir) = refract(wo, &Vector3f::new(0.0, 1.0, 0.0), 1.0 / self.eta);
        if tir {
            return (Vector3f::zero(), 0.0, Spectrum::default());
        }
        let inner = match self.bottom.sample_bsdf(&wo_t, BxdfType::ALL, rc) {
            Some(inner) => inner,
            None => return (Vector3f::zero(), 0.0, Spectrum::default()),
        };
        let (wi, tir_back) = refract(&inner.wi, &Vector3f::new(0.0, -1.0, 0.0), self.eta);
        if tir_back {
            // Total internal reflection of the returning ray is compensated
            // rather than discarded, the originating renderer's hack for
            // keeping coated diffuse materials from going too dark.
            let wi = crate::core::shading_frame::reflect_about_normal(&inner.wi);
            let f = inner.f * COAT_TIR_COMPENSATION;
            let pdf = inner.pdf * (1.0 - fr_o);
            return (wi, pdf, f);
        }
        let atten = self.absorption(cos_theta(&wo_t).abs()) * self.absorption(cos_theta(&inner.wi).abs());
        let fr_i = fr_dielectric(cos_theta(&wi), 1.0, self.eta);
        let f = inner.f * atten * (1.0 - fr_o) * (1.0 - fr_i);
        let pdf = inner.pdf * (1.0 - fr_o);
        (wi, pdf, f)
    }

    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        let fr_o = fr_dielectric(cos_theta(wo), 1.0, self.eta);
        let wh = (*wo + *wi).normalize();
        let dist = MicrofacetDistribution::ggx(self.roughness, self.roughness);
        let top_pdf = dist.pdf(&wh) / (4.0 * crate::core::geometry::dot(wo, &wh)) * fr_o;
        let (wo_t, tir) = refract(wo, &Vector3f::new(0.0, 1.0, 0.0), 1.0 / self.eta);
        let (wi_t, tir_i) = refract(wi, &Vector3f::new(0.0, 1.0, 0.0), 1.0 / self.eta);
        if tir || tir_i {
            return top_pdf;
        }
        let bottom_pdf = self.bottom.pdf_bsdf(&wo_t, &wi_t, BxdfType::ALL) * (1.0 - fr_o);
        top_pdf + bottom_pdf
    }
}

/// A material with an independent `ScatteringEvent` for each face, picked by
/// the sign of `cos_theta(wo)`. Both child events are arena-owned value
/// types, not references, for the same reason `Coat`'s bottom layer is.
#[derive(Debug, Clone)]
pub struct DoubleSided {
    front: Box<ScatteringEvent>,
    back: Box<ScatteringEvent>,
}

impl DoubleSided {
    pub fn new(front: ScatteringEvent, back: ScatteringEvent) -> DoubleSided {
        DoubleSided { front: Box::new(front), back: Box::new(back) }
    }

    fn select(&self, wo: &Vector3f) -> &ScatteringEvent {
        if wo.y >= 0.0 {
            &self.front
        } else {
            &self.back
        }
    }

    pub fn get_type(&self) -> BxdfType {
        BxdfType::REFLECTION | BxdfType::TRANSMISSION | BxdfType::GLOSSY | BxdfType::DIFFUSE
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        self.select(wo).evaluate_bsdf(wo, wi, BxdfType::ALL)
    }

    pub fn sample_f(&self, wo: &Vector3f, _bs: BsdfSample, rc: &RenderContext) -> (Vector3f, Float, Spectrum) {
        match self.select(wo).sample_bsdf(wo, BxdfType::ALL, rc) {
            Some(result) => (result.wi, result.pdf, result.f),
            None => (Vector3f::zero(), 0.0, Spectrum::default()),
        }
    }

    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        self.select(wo).pdf_bsdf(wo, wi, BxdfType::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reflection::Bxdf;

    fn diffuse_event(r: Float) -> ScatteringEvent {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 1.0, 0.0), Vector3f::new(1.0, 0.0, 0.0));
        se.add_bxdf(Bxdf::LambertianReflection { r: Spectrum::new(r) });
        se
    }

    #[test]
    fn coat_f_is_nonnegative() {
        let coat = Coat::new(1.5, 0.1, 0.0, Spectrum::default(), diffuse_event(0.7));
        let wo = Vector3f::new(0.0, 1.0, 0.0);
        let wi = Vector3f::new(0.1, 0.9, 0.1).normalize();
        let f = coat.f(&wo, &wi);
        assert!(f.c[0] >= 0.0);
    }

    #[test]
    fn double_sided_picks_front_for_positive_cos_theta() {
        let ds = DoubleSided::new(diffuse_event(0.9), diffuse_event(0.1));
        let wo = Vector3f::new(0.0, 1.0, 0.0);
        let wi = Vector3f::new(0.0, 1.0, 0.0);
        let f = ds.f(&wo, &wi);
        assert!(f.c[0] > 0.2);
    }
}
