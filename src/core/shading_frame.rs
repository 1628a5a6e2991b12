//! Shading-coordinate trigonometry. Every BxDF operates in a frame where the
//! shading normal is +Y, so `cos_theta(w) = w.y` throughout.

use crate::core::geometry::{dot, Vector3f};
use crate::core::pbrt::{safe_sqrt, Float};

pub fn cos_theta(w: &Vector3f) -> Float {
    w.y
}

pub fn cos_2_theta(w: &Vector3f) -> Float {
    w.y * w.y
}

pub fn abs_cos_theta(w: &Vector3f) -> Float {
    w.y.abs()
}

pub fn sin_2_theta(w: &Vector3f) -> Float {
    (1.0 - cos_2_theta(w)).max(0.0)
}

pub fn sin_theta(w: &Vector3f) -> Float {
    sin_2_theta(w).sqrt()
}

pub fn tan_theta(w: &Vector3f) -> Float {
    sin_theta(w) / cos_theta(w)
}

pub fn tan_2_theta(w: &Vector3f) -> Float {
    sin_2_theta(w) / cos_2_theta(w)
}

pub fn cos_phi(w: &Vector3f) -> Float {
    let st = sin_theta(w);
    if st == 0.0 {
        1.0
    } else {
        (w.x / st).clamp(-1.0, 1.0)
    }
}

pub fn sin_phi(w: &Vector3f) -> Float {
    let st = sin_theta(w);
    if st == 0.0 {
        0.0
    } else {
        (w.z / st).clamp(-1.0, 1.0)
    }
}

pub fn cos_2_phi(w: &Vector3f) -> Float {
    cos_phi(w) * cos_phi(w)
}

pub fn sin_2_phi(w: &Vector3f) -> Float {
    sin_phi(w) * sin_phi(w)
}

pub fn cos_d_phi(wa: &Vector3f, wb: &Vector3f) -> Float {
    let waxy = wa.x * wa.x + wa.z * wa.z;
    let wbxy = wb.x * wb.x + wb.z * wb.z;
    if waxy == 0.0 || wbxy == 0.0 {
        return 1.0;
    }
    ((wa.x * wb.x + wa.z * wb.z) / (waxy * wbxy).sqrt()).clamp(-1.0, 1.0)
}

pub fn same_hemisphere(w: &Vector3f, wp: &Vector3f) -> bool {
    w.y * wp.y > 0.0
}

/// Shading-frame fast path: `reflect(v) = (-v.x, v.y, -v.z)`.
pub fn reflect_about_normal(v: &Vector3f) -> Vector3f {
    Vector3f::new(-v.x, v.y, -v.z)
}

pub fn reflect(v: &Vector3f, n: &Vector3f) -> Vector3f {
    2.0 * dot(v, n) * (*n) - *v
}

/// Snell's law refraction. Caller convention: both `v` and the returned
/// vector point away from the surface. Sets `tir = true` and returns zero
/// when the discriminant `1 - eta^2*(1-cos^2)` goes negative.
pub fn refract(v: &Vector3f, n: &Vector3f, eta: Float) -> (Vector3f, bool) {
    let cos_theta_i = dot(n, v);
    let sin_2_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0);
    let sin_2_theta_t = eta * eta * sin_2_theta_i;
    if sin_2_theta_t >= 1.0 {
        return (Vector3f::zero(), true);
    }
    let cos_theta_t = safe_sqrt(1.0 - sin_2_theta_t);
    let wt = eta * (-*v) + (eta * cos_theta_i - cos_theta_t) * (*n);
    (wt, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cos_phi_is_one_when_sin_theta_zero() {
        let w = Vector3f::new(0.0, 1.0, 0.0);
        assert_eq!(cos_phi(&w), 1.0);
        assert_eq!(sin_phi(&w), 0.0);
    }

    #[test]
    fn reflect_fast_path_matches_general_form() {
        let v = Vector3f::new(0.3, 0.7, -0.2).normalize();
        let n = Vector3f::new(0.0, 1.0, 0.0);
        let fast = reflect_about_normal(&v);
        let general = reflect(&v, &n);
        assert!((fast - general).length() < 1e-5);
    }

    #[test]
    fn total_internal_reflection_flags_correctly() {
        // Going from dense to rare medium at a steep angle triggers TIR.
        let v = Vector3f::new(0.95, 0.05f32.max(0.001), 0.0).normalize();
        let n = Vector3f::new(0.0, 1.0, 0.0);
        let (_wt, tir) = refract(&v, &n, 1.5);
        assert!(tir);
    }
}
