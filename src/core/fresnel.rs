//! Fresnel reflectance models. Tagged-enum dispatch per design note §9 rather
//! than virtual inheritance: one variant per originating `Fresnel` subclass.

use crate::core::pbrt::{Float, Spectrum};

pub fn schlick_weight(cos_theta: Float) -> Float {
    let m = (1.0 - cos_theta.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    (m * m) * (m * m) * m
}

pub fn fr_schlick(r0: Float, cos_theta: Float) -> Float {
    r0 + (1.0 - r0) * schlick_weight(cos_theta)
}

pub fn fr_schlick_spectrum(r0: Spectrum, cos_theta: Float) -> Spectrum {
    r0 + (Spectrum::new(1.0) - r0) * schlick_weight(cos_theta)
}

/// `DielectricFresnel(cosI, ηi, ηt)`. Handles both sides via the sign of
/// `cos_theta_i`; returns full reflectance (1) under total internal
/// reflection.
pub fn fr_dielectric(cos_theta_i: Float, eta_i: Float, eta_t: Float) -> Float {
    let cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let entering = cos_theta_i > 0.0;
    let (eta_i, eta_t, cos_theta_i) = if !entering {
        (eta_t, eta_i, cos_theta_i.abs())
    } else {
        (eta_i, eta_t, cos_theta_i)
    };

    let sin_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0).sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 {
        return 1.0;
    }
    let cos_theta_t = (1.0 - sin_theta_t * sin_theta_t).max(0.0).sqrt();

    let r_parl = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t)) / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t)) / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));
    (r_parl * r_parl + r_perp * r_perp) / 2.0
}

/// `ConductorFresnel(cosI, η, k)`, the classical RMS of parallel and
/// perpendicular components for a complex index of refraction.
pub fn fr_conductor(cos_theta_i: Float, eta_i: Spectrum, eta_t: Spectrum, k: Spectrum) -> Spectrum {
    let cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let eta = eta_t / eta_i;
    let eta_k = k / eta_i;

    let cos_theta_i2 = cos_theta_i * cos_theta_i;
    let sin_theta_i2 = 1.0 - cos_theta_i2;
    let eta2 = eta * eta;
    let eta_k2 = eta_k * eta_k;

    let t0 = eta2 - eta_k2 - Spectrum::new(sin_theta_i2);
    let a2_plus_b2 = (t0 * t0 + 4.0 * eta2 * eta_k2).sqrt();
    let t1 = a2_plus_b2 + Spectrum::new(cos_theta_i2);
    let a = (0.5 * (a2_plus_b2 + t0)).sqrt();
    let t2 = 2.0 * a * cos_theta_i;
    let rs = (t1 - t2) / (t1 + t2);

    let t3 = cos_theta_i2 * a2_plus_b2 + Spectrum::new(sin_theta_i2 * sin_theta_i2);
    let t4 = t2 * sin_theta_i2;
    let rp = rs * (t3 - t4) / (t3 + t4);

    0.5 * (rp + rs)
}

#[derive(Debug, Clone)]
pub enum Fresnel {
    NoOp,
    Dielectric { eta_i: Float, eta_t: Float },
    Conductor { eta_i: Spectrum, eta_t: Spectrum, k: Spectrum },
    SchlickFloat { r0: Float },
    SchlickSpectrum { r0: Spectrum },
    /// `lerp(metallic, fr_dielectric(...), fr_schlick_spectrum(r0, cos_i))`.
    Disney { r0: Spectrum, eta: Float, metallic: Float },
}

impl Fresnel {
    pub fn evaluate(&self, cos_theta_i: Float) -> Spectrum {
        match self {
            Fresnel::NoOp => Spectrum::new(1.0),
            Fresnel::Dielectric { eta_i, eta_t } => Spectrum::new(fr_dielectric(cos_theta_i, *eta_i, *eta_t)),
            Fresnel::Conductor { eta_i, eta_t, k } => fr_conductor(cos_theta_i, *eta_i, *eta_t, *k),
            Fresnel::SchlickFloat { r0 } => Spectrum::new(fr_schlick(*r0, cos_theta_i.abs())),
            Fresnel::SchlickSpectrum { r0 } => fr_schlick_spectrum(*r0, cos_theta_i.abs()),
            Fresnel::Disney { r0, eta, metallic } => {
                let dielectric = fr_dielectric(cos_theta_i, 1.0, *eta);
                let schlick = fr_schlick_spectrum(*r0, cos_theta_i.abs());
                (1.0 - metallic) * Spectrum::new(dielectric) + *metallic * schlick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dielectric_matches_e3_seed() {
        // E3: eta = 1/1.5, normal incidence reflectance = ((1.5-1)/(1.5+1))^2 = 0.04
        let f = fr_dielectric(1.0, 1.0, 1.5);
        assert!((f - 0.04).abs() < 1e-4);
    }

    #[test]
    fn dielectric_total_internal_reflection_is_one() {
        // Going from dense (1.5) to rare (1.0) medium at a grazing angle.
        let f = fr_dielectric(0.05, 1.5, 1.0);
        assert!((f - 1.0).abs() < 1e-6);
    }

    #[test]
    fn schlick_weight_is_zero_at_normal_incidence() {
        assert!(schlick_weight(1.0).abs() < 1e-6);
        assert!((schlick_weight(0.0) - 1.0).abs() < 1e-6);
    }
}
