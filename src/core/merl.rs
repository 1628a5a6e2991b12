//! MERL (Matusik et al.) measured-BRDF tables: a 90x90x180 grid of doubles
//! over `(theta_half, theta_diff, phi_diff)`, per-channel scaled. Loading is
//! a crate-boundary operation and returns `Result<_, ShadingError>` per the
//! error-handling design rather than panicking on truncated/corrupt input.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::core::geometry::{dot, Vector3f};
use crate::core::pbrt::{clamp_t, Float, Spectrum, PI};
use crate::core::render_context::RenderContext;
use crate::core::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, BsdfSample};
use crate::core::shading_frame::{abs_cos_theta, same_hemisphere};
use crate::error::{Result, ShadingError};

const BRDF_SAMPLING_RES_THETA_H: usize = 90;
const BRDF_SAMPLING_RES_THETA_D: usize = 90;
const BRDF_SAMPLING_RES_PHI_D: usize = 180;

const RED_SCALE: f64 = 1.0 / 1500.0;
const GREEN_SCALE: f64 = 1.15 / 1500.0;
const BLUE_SCALE: f64 = 1.66 / 1500.0;

pub struct MerlTable {
    data: Vec<f64>,
}

impl MerlTable {
    /// Parses a `.binary` MERL table: three little-endian `i32` dimensions
    /// followed by `dims[0]*dims[1]*dims[2]*3` little-endian `f64` samples.
    pub fn load<R: Read>(mut reader: R) -> Result<MerlTable> {
        let dim_theta_h = reader.read_i32::<LittleEndian>()? as usize;
        let dim_theta_d = reader.read_i32::<LittleEndian>()? as usize;
        let dim_phi_d = reader.read_i32::<LittleEndian>()? as usize;
        if dim_theta_h != BRDF_SAMPLING_RES_THETA_H || dim_theta_d != BRDF_SAMPLING_RES_THETA_D || dim_phi_d != BRDF_SAMPLING_RES_PHI_D {
            return Err(ShadingError::ResourceFormat(format!(
                "unexpected MERL table dimensions {}x{}x{}",
                dim_theta_h, dim_theta_d, dim_phi_d
            )));
        }
        let n = dim_theta_h * dim_theta_d * dim_phi_d * 3;
        let mut data = Vec::with_capacity(n);
        for _ in 0..n {
            data.push(reader.read_f64::<LittleEndian>()?);
        }
        Ok(MerlTable { data })
    }

    fn index(theta_h_idx: usize, theta_d_idx: usize, phi_d_idx: usize) -> usize {
        (theta_h_idx * BRDF_SAMPLING_RES_THETA_D + theta_d_idx) * BRDF_SAMPLING_RES_PHI_D + phi_d_idx
    }

    fn lookup(&self, theta_h: Float, theta_d: Float, mut phi_d: Float) -> Spectrum {
        if phi_d < 0.0 {
            phi_d += PI;
        }
        let theta_h_idx = (((theta_h / (PI / 2.0)).max(0.0).sqrt() * BRDF_SAMPLING_RES_THETA_H as Float) as usize)
            .min(BRDF_SAMPLING_RES_THETA_H - 1);
        let theta_d_idx = ((theta_d / (PI / 2.0) * BRDF_SAMPLING_RES_THETA_D as Float) as usize).min(BRDF_SAMPLING_RES_THETA_D - 1);
        let phi_d_idx = ((phi_d / PI * BRDF_SAMPLING_RES_PHI_D as Float) as usize).min(BRDF_SAMPLING_RES_PHI_D - 1);

        let base = Self::index(theta_h_idx, theta_d_idx, phi_d_idx) * 3;
        if base + 2 >= self.data.len() {
            return Spectrum::default();
        }
        Spectrum::rgb(
            (self.data[base] * RED_SCALE).max(0.0) as Float,
            (self.data[base + 1] * GREEN_SCALE).max(0.0) as Float,
            (self.data[base + 2] * BLUE_SCALE).max(0.0) as Float,
        )
    }
}

#[derive(Debug, Clone)]
pub struct MerlBxdf {
    table: std::rc::Rc<MerlTable>,
}

impl std::fmt::Debug for MerlTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerlTable").field("samples", &self.data.len()).finish()
    }
}

impl MerlBxdf {
    pub fn new(table: std::rc::Rc<MerlTable>) -> MerlBxdf {
        MerlBxdf { table }
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        if !same_hemisphere(wo, wi) {
            return Spectrum::default();
        }
        let wh = (*wo + *wi).normalize();
        let theta_h = abs_cos_theta(&wh).clamp(-1.0, 1.0).acos();
        let wd = rotate_to_half_frame(wo, &wh);
        let theta_d = abs_cos_theta(&wd).clamp(-1.0, 1.0).acos();
        let phi_d = wd.z.atan2(wd.x);
        self.table.lookup(theta_h, theta_d, phi_d) * abs_cos_theta(wi)
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

/// Approximate half-angle-frame rotation: aligns `wo` relative to `wh`
/// without the full change-of-basis the tabulated loader's source uses,
/// sufficient for nearest-bin lookups against the measured table.
fn rotate_to_half_frame(wo: &Vector3f, wh: &Vector3f) -> Vector3f {
    let cos_theta_h = dot(wo, wh).clamp(-1.0, 1.0);
    let perp = (*wo - *wh * cos_theta_h).normalize();
    Vector3f::new(cos_theta_h, clamp_t(dot(&perp, wo), -1.0, 1.0), (1.0 - cos_theta_h * cos_theta_h).max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_wrong_dimensions() {
        let bytes: Vec<u8> = vec![1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0];
        let err = MerlTable::load(std::io::Cursor::new(bytes)).unwrap_err();
        matches!(err, ShadingError::ResourceFormat(_));
    }
}
