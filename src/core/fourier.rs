//! Measured Fourier BSDF tables: a 2D Catmull-Rom grid over (mu_i, mu_o)
//! whose entries are themselves truncated Fourier series over the azimuthal
//! difference angle. Loading is a crate-boundary operation and returns
//! `Result<_, ShadingError>` per the error-handling design rather than
//! panicking on truncated/corrupt input, matching `core::merl`.
//!
//! This crate has no integrator, so there is no adjoint/radiance transport
//! mode to thread through; the eta^2 solid-angle compression factor is
//! always applied on the transmission side, which is the radiance-transport
//! convention.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::core::geometry::Vector3f;
use crate::core::pbrt::{Float, Spectrum, PI};
use crate::core::render_context::RenderContext;
use crate::core::sampling::BsdfSample;
use crate::core::shading_frame::{abs_cos_theta, cos_d_phi, cos_theta, sin_2_theta};
use crate::error::{Result, ShadingError};

const FOURIER_MAGIC: [u8; 8] = [b'S', b'C', b'A', b'T', b'F', b'U', b'N', 0x01];

fn find_interval(size: usize, pred: impl Fn(usize) -> bool) -> usize {
    let mut first = 0usize;
    let mut len = size;
    while len > 0 {
        let half = len >> 1;
        let middle = first + half;
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }
    first.saturating_sub(1).min(size.saturating_sub(2))
}

/// Evaluates `sum_{k<m} a[start+k] * cos(k * phi)` via the cosine
/// double-angle recurrence rather than calling `cos()` per term.
fn fourier(a: &[Float], start: usize, m: i32, cos_phi: f64) -> Float {
    let cos_phi = cos_phi as Float;
    let mut value = 0.0;
    let mut cos_k_minus_one_phi = cos_phi;
    let mut cos_k_phi = 1.0;
    for k in 0..m.max(0) as usize {
        value += a[start + k] * cos_k_phi;
        let cos_k_plus_one_phi = 2.0 * cos_phi * cos_k_phi - cos_k_minus_one_phi;
        cos_k_minus_one_phi = cos_k_phi;
        cos_k_phi = cos_k_plus_one_phi;
    }
    value
}

fn catmull_rom_weights(nodes: &[Float], x: Float, weights: &mut [Float; 4]) -> Option<usize> {
    let size = nodes.len();
    if !(x >= nodes[0] && x <= nodes[size - 1]) {
        return None;
    }
    let idx = find_interval(size, |i| nodes[i] <= x);
    let offset = idx.saturating_sub(1);
    let x0 = nodes[idx];
    let x1 = nodes[idx + 1];
    let t = (x - x0) / (x1 - x0);
    let t2 = t * t;
    let t3 = t2 * t;

    weights[1] = 2.0 * t3 - 3.0 * t2 + 1.0;
    weights[2] = -2.0 * t3 + 3.0 * t2;

    if idx > 0 {
        let w0 = (t3 - 2.0 * t2 + t) * (x1 - x0) / (x1 - nodes[idx - 1]);
        weights[0] = -w0;
        weights[2] += w0;
    } else {
        let w0 = t3 - 2.0 * t2 + t;
        weights[0] = 0.0;
        weights[1] -= w0;
        weights[2] += w0;
    }

    if idx + 2 < size {
        let w3 = (t3 - t2) * (x1 - x0) / (nodes[idx + 2] - x0);
        weights[1] -= w3;
        weights[3] = w3;
    } else {
        let w3 = t3 - t2;
        weights[1] -= w3;
        weights[2] += w3;
        weights[3] = 0.0;
    }
    Some(offset)
}

/// Samples `mu_i` from the marginal CDF stored per row of the table, by
/// 1D Catmull-Rom interpolation in the `mu_o` direction followed by
/// Newton-bisection inversion of the spline's definite integral.
#[allow(clippy::too_many_arguments)]
fn sample_catmull_rom_2d(
    nodes1: &[Float],
    nodes2: &[Float],
    values: &[Float],
    cdf: &[Float],
    alpha: Float,
    u: Float,
    pdf: &mut Float,
) -> Float {
    let size2 = nodes2.len();
    let mut weights = [0.0; 4];
    let offset = match catmull_rom_weights(nodes1, alpha, &mut weights) {
        Some(o) => o,
        None => return 0.0,
    };

    let interpolate = |array: &[Float], idx: usize| {
        let mut value = 0.0;
        for (i, w) in weights.iter().enumerate() {
            if *w != 0.0 {
                value += array[(offset + i) * size2 + idx] * w;
            }
        }
        value
    };

    let maximum = interpolate(cdf, size2 - 1);
    let mut u = u * maximum;
    if maximum <= 0.0 {
        *pdf = 0.0;
        return nodes2[0];
    }
    let idx = find_interval(size2, |i| interpolate(cdf, i) <= u);

    let f0 = interpolate(values, idx);
    let f1 = interpolate(values, idx + 1);
    let x0 = nodes2[idx];
    let x1 = nodes2[idx + 1];
    let width = x1 - x0;

    u = (u - interpolate(cdf, idx)) / width.max(1e-12);

    let d0 = if idx > 0 {
        width * (f1 - interpolate(values, idx - 1)) / (x1 - nodes2[idx - 1])
    } else {
        f1 - f0
    };
    let d1 = if idx + 2 < size2 {
        width * (interpolate(values, idx + 2) - f0) / (nodes2[idx + 2] - x0)
    } else {
        f1 - f0
    };

    let mut t = if f0 != f1 { (f0 - (f0 * f0 + 2.0 * u * (f1 - f0)).max(0.0).sqrt()) / (f0 - f1) } else { u / f0.max(1e-12) };
    let mut a = 0.0;
    let mut b = 1.0;
    let mut f_hat;
    let mut fp_hat;
    loop {
        if !(t >= a && t <= b) {
            t = 0.5 * (a + b);
        }
        f_hat = t * (f0 + t * (0.5 * d0 + t * ((1.0 / 3.0) * (-2.0 * d0 - d1) + f1 - f0 + t * (0.25 * (d0 + d1) + 0.5 * (f0 - f1)))));
        fp_hat = f0 + t * (d0 + t * (-2.0 * d0 - d1 + 3.0 * (f1 - f0) + t * (d0 + d1 + 2.0 * (f0 - f1))));
        if (f_hat - u).abs() < 1e-6 || b - a < 1e-6 {
            break;
        }
        if f_hat - u < 0.0 {
            a = t;
        } else {
            b = t;
        }
        t -= (f_hat - u) / fp_hat.max(1e-12);
    }
    *pdf = fp_hat / maximum;
    x0 + width * t
}

/// Importance-samples the azimuthal Fourier expansion via bisection on the
/// half-interval symmetry of a cosine series, then a Newton refinement.
fn sample_fourier(ak: &[Float], recip: &[Float], m: i32, u: Float, pdf: &mut Float, phi_out: &mut Float) -> Float {
    let flip = u >= 0.5;
    let u = if flip { 1.0 - 2.0 * (u - 0.5) } else { 2.0 * u };
    let mut a = 0.0;
    let mut b = PI;
    let mut phi = 0.5 * PI;
    let mut big_f;
    let mut f;
    loop {
        let cos_phi = phi.cos();
        let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
        let mut cos_phi_prev = cos_phi;
        let mut cos_phi_cur = 1.0;
        let mut sin_phi_prev = -sin_phi;
        let mut sin_phi_cur = 0.0;

        big_f = ak[0] * phi;
        f = ak[0];
        for k in 1..m.max(0) as usize {
            let sin_phi_next = 2.0 * cos_phi * sin_phi_cur - sin_phi_prev;
            let cos_phi_next = 2.0 * cos_phi * cos_phi_cur - cos_phi_prev;
            sin_phi_prev = sin_phi_cur;
            sin_phi_cur = sin_phi_next;
            cos_phi_prev = cos_phi_cur;
            cos_phi_cur = cos_phi_next;
            big_f += ak[k] * recip[k] * sin_phi_next;
            f += ak[k] * cos_phi_next;
        }
        big_f -= u * ak[0] * PI;

        if big_f > 0.0 {
            b = phi;
        } else {
            a = phi;
        }
        if big_f.abs() < 1e-6 || b - a < 1e-6 {
            break;
        }
        phi -= big_f / f.max(1e-12);
        if !(phi > a && phi < b) {
            phi = 0.5 * (a + b);
        }
    }
    if flip {
        phi = 2.0 * PI - phi;
    }
    *pdf = (crate::core::pbrt::INV_TWO_PI * f / ak[0]).max(0.0);
    *phi_out = phi;
    f.max(0.0)
}

/// A loaded `"SCATFUN\x01"` table: the mu grid, its marginal CDF, and the
/// pool of per-(mu_i, mu_o) Fourier coefficients. Immutable after load.
pub struct FourierTable {
    pub eta: Float,
    m_max: i32,
    n_channels: i32,
    mu: Vec<Float>,
    m: Vec<i32>,
    a_offset: Vec<i32>,
    a: Vec<Float>,
    a0: Vec<Float>,
    cdf: Vec<Float>,
    recip: Vec<Float>,
}

impl std::fmt::Debug for FourierTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FourierTable").field("n_mu", &self.mu.len()).field("m_max", &self.m_max).finish()
    }
}

impl FourierTable {
    pub fn load<R: Read>(mut reader: R) -> Result<FourierTable> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != FOURIER_MAGIC {
            return Err(ShadingError::ResourceFormat("bad Fourier BSDF magic header".to_string()));
        }
        let flags = reader.read_i32::<LittleEndian>()?;
        let n_mu = reader.read_i32::<LittleEndian>()?;
        let n_coeffs = reader.read_i32::<LittleEndian>()?;
        let m_max = reader.read_i32::<LittleEndian>()?;
        let n_channels = reader.read_i32::<LittleEndian>()?;
        let n_bases = reader.read_i32::<LittleEndian>()?;
        let mut unused_ints = [0i32; 3];
        reader.read_i32_into::<LittleEndian>(&mut unused_ints)?;
        let eta = reader.read_f32::<LittleEndian>()?;
        let mut unused_ints2 = [0i32; 4];
        reader.read_i32_into::<LittleEndian>(&mut unused_ints2)?;

        if flags != 1 || n_mu <= 1 || n_coeffs <= 0 || m_max <= 0 || (n_channels != 1 && n_channels != 3) || n_bases != 1 {
            return Err(ShadingError::ResourceFormat(format!(
                "incompatible Fourier BSDF header (flags={}, n_mu={}, n_coeffs={}, m_max={}, n_channels={}, n_bases={})",
                flags, n_mu, n_coeffs, m_max, n_channels, n_bases
            )));
        }

        let n_mu = n_mu as usize;
        let mut mu = Vec::with_capacity(n_mu);
        for _ in 0..n_mu {
            mu.push(reader.read_f32::<LittleEndian>()?);
        }
        let mut cdf = Vec::with_capacity(n_mu * n_mu);
        for _ in 0..(n_mu * n_mu) {
            cdf.push(reader.read_f32::<LittleEndian>()?);
        }
        let mut offset_and_length = Vec::with_capacity(n_mu * n_mu * 2);
        for _ in 0..(n_mu * n_mu * 2) {
            offset_and_length.push(reader.read_i32::<LittleEndian>()?);
        }
        let mut a = Vec::with_capacity(n_coeffs as usize);
        for _ in 0..n_coeffs as usize {
            a.push(reader.read_f32::<LittleEndian>()?);
        }

        let mut a_offset = Vec::with_capacity(n_mu * n_mu);
        let mut m = Vec::with_capacity(n_mu * n_mu);
        let mut a0 = Vec::with_capacity(n_mu * n_mu);
        for i in 0..(n_mu * n_mu) {
            let offset = offset_and_length[2 * i];
            let length = offset_and_length[2 * i + 1];
            a_offset.push(offset);
            m.push(length);
            a0.push(if length > 0 { a[offset as usize] } else { 0.0 });
        }
        let mut recip = Vec::with_capacity(m_max as usize);
        for i in 0..m_max as usize {
            recip.push(if i == 0 { 0.0 } else { 1.0 / i as Float });
        }

        Ok(FourierTable { eta, m_max, n_channels, mu, m, a_offset, a, a0, cdf, recip })
    }

    fn n_mu(&self) -> usize {
        self.mu.len()
    }

    fn get_ak(&self, offset_i: i32, offset_o: i32) -> (i32, i32) {
        let idx = (offset_o * self.n_mu() as i32 + offset_i) as usize;
        (self.a_offset[idx], self.m[idx])
    }

    fn get_weights_and_offset(&self, cos_theta: Float, weights: &mut [Float; 4]) -> Option<usize> {
        catmull_rom_weights(&self.mu, cos_theta, weights)
    }
}

/// A BxDF backed by a loaded `FourierTable`. Shares the `Rc<FourierTable>`
/// the same way `MerlBxdf` shares its table, so many surfaces can point at
/// one parsed resource.
#[derive(Debug, Clone)]
pub struct FourierBxdf {
    table: std::rc::Rc<FourierTable>,
}

struct Coefficients {
    ak: Vec<Float>,
    m_max: i32,
}

impl FourierBxdf {
    pub fn new(table: std::rc::Rc<FourierTable>) -> FourierBxdf {
        FourierBxdf { table }
    }

    fn coefficients(&self, mu_i: Float, mu_o: Float) -> Option<Coefficients> {
        let t = &self.table;
        let mut weights_i = [0.0; 4];
        let mut weights_o = [0.0; 4];
        let offset_i = t.get_weights_and_offset(mu_i, &mut weights_i)?;
        let offset_o = t.get_weights_and_offset(mu_o, &mut weights_o)?;

        let mut ak = vec![0.0; (t.m_max * t.n_channels) as usize];
        let mut m_max = 0;
        for (b, weight_o) in weights_o.iter().enumerate() {
            for (a, weight_i) in weights_i.iter().enumerate() {
                let weight = weight_i * weight_o;
                if weight == 0.0 {
                    continue;
                }
                let (a_idx, m) = t.get_ak(offset_i as i32 + a as i32, offset_o as i32 + b as i32);
                m_max = m_max.max(m);
                for c in 0..t.n_channels as usize {
                    for k in 0..m as usize {
                        ak[c * t.m_max as usize + k] += weight * t.a[(a_idx + c as i32 * m + k as i32) as usize];
                    }
                }
            }
        }
        Some(Coefficients { ak, m_max })
    }

    fn eval_channels(&self, coeffs: &Coefficients, cos_phi: Float, mu_i: Float, mu_o: Float) -> Spectrum {
        let mut scale = if mu_i != 0.0 { 1.0 / mu_i.abs() } else { 0.0 };
        if mu_i * mu_o > 0.0 {
            let eta = if mu_i > 0.0 { 1.0 / self.table.eta } else { self.table.eta };
            scale *= eta * eta;
        }
        let m_max = self.table.m_max as usize;
        let y = fourier(&coeffs.ak, 0, coeffs.m_max, cos_phi as f64).max(0.0);
        if self.table.n_channels == 1 {
            Spectrum::new(y * scale)
        } else {
            let r = fourier(&coeffs.ak, m_max, coeffs.m_max, cos_phi as f64);
            let b = fourier(&coeffs.ak, 2 * m_max, coeffs.m_max, cos_phi as f64);
            let g = 1.39829 * y - 0.100913 * b - 0.297375 * r;
            Spectrum::rgb(r * scale, g * scale, b * scale).clamp(0.0, Float::INFINITY)
        }
    }

    pub fn f(&self, wo: &Vector3f, wi: &Vector3f) -> Spectrum {
        let mu_i = cos_theta(&-*wi);
        let mu_o = cos_theta(wo);
        let cos_phi = cos_d_phi(&-*wi, wo);
        match self.coefficients(mu_i, mu_o) {
            Some(coeffs) => self.eval_channels(&coeffs, cos_phi, mu_i, mu_o) * abs_cos_theta(wi),
            None => Spectrum::default(),
        }
    }

    pub fn sample_f(&self, wo: &Vector3f, bs: BsdfSample, _rc: &RenderContext) -> (Vector3f, Float, Spectrum) {
        let mu_o = cos_theta(wo);
        let mut pdf_mu = 0.0;
        let mu_i = sample_catmull_rom_2d(&self.table.mu, &self.table.mu, &self.table.a0, &self.table.cdf, mu_o, bs.v, &mut pdf_mu);

        let coeffs = match self.coefficients(mu_i, mu_o) {
            Some(c) => c,
            None => return (Vector3f::zero(), 0.0, Spectrum::default()),
        };
        if coeffs.ak.is_empty() || coeffs.ak[0] <= 0.0 {
            return (Vector3f::zero(), 0.0, Spectrum::default());
        }

        let mut pdf_phi = 0.0;
        let mut phi = 0.0;
        let y = sample_fourier(&coeffs.ak, &self.table.recip, coeffs.m_max, bs.u, &mut pdf_phi, &mut phi);
        let pdf = (pdf_phi * pdf_mu).max(0.0);

        let sin_2_theta_i = (1.0 - mu_i * mu_i).max(0.0);
        let mut norm = (sin_2_theta_i / sin_2_theta(wo)).sqrt();
        if norm.is_infinite() || norm.is_nan() {
            norm = 0.0;
        }
        let (sin_phi, cos_phi) = phi.sin_cos();
        let mut wi = -Vector3f::new(norm * (cos_phi * wo.x - sin_phi * wo.y), norm * (sin_phi * wo.x + cos_phi * wo.y), mu_i);
        wi = wi.normalize();

        let f = self.eval_channels(&coeffs, cos_phi, mu_i, mu_o) * abs_cos_theta(&wi);
        (wi, pdf, f)
    }

    /// Probability of sampling `wi` via `sample_f`: the luminance channel's
    /// Fourier value at this `(mu_i, mu_o, cos_phi)` divided by the total
    /// mass `rho` of the marginal CDF row at `mu_o`, matching the split
    /// between `sample_catmull_rom_2d`'s mu-sampling and `sample_fourier`'s
    /// phi-sampling.
    pub fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        let mu_i = cos_theta(&-*wi);
        let mu_o = cos_theta(wo);
        let cos_phi = cos_d_phi(&-*wi, wo);

        let mut weights_i = [0.0; 4];
        let mut weights_o = [0.0; 4];
        let offset_i = match self.table.get_weights_and_offset(mu_i, &mut weights_i) {
            Some(o) => o,
            None => return 0.0,
        };
        let offset_o = match self.table.get_weights_and_offset(mu_o, &mut weights_o) {
            Some(o) => o,
            None => return 0.0,
        };

        let mut ak = vec![0.0; self.table.m_max as usize];
        let mut m_max = 0;
        for (b, weight_o) in weights_o.iter().enumerate() {
            for (a, weight_i) in weights_i.iter().enumerate() {
                let weight = weight_i * weight_o;
                if weight == 0.0 {
                    continue;
                }
                let (a_idx, m) = self.table.get_ak(offset_i as i32 + a as i32, offset_o as i32 + b as i32);
                m_max = m_max.max(m);
                for k in 0..m as usize {
                    ak[k] += weight * self.table.a[(a_idx + k as i32) as usize];
                }
            }
        }

        let n_mu = self.table.n_mu();
        let mut rho = 0.0;
        for (o, weight_o) in weights_o.iter().enumerate() {
            if *weight_o == 0.0 {
                continue;
            }
            rho += weight_o * self.table.cdf[(offset_o + o) * n_mu + n_mu - 1] * (2.0 * PI);
        }

        let y = fourier(&ak, 0, m_max, cos_phi as f64).max(0.0);
        if rho > 0.0 && y > 0.0 {
            y / rho
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_bad_magic() {
        let bytes = vec![0u8; 16];
        let err = FourierTable::load(std::io::Cursor::new(bytes)).unwrap_err();
        matches!(err, ShadingError::ResourceFormat(_));
    }

    #[test]
    fn find_interval_stays_in_bounds() {
        let nodes = [0.0, 1.0, 2.0, 3.0];
        let idx = find_interval(nodes.len(), |i| nodes[i] <= 2.5);
        assert!(idx < nodes.len() - 1);
    }
}
