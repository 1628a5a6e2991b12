//! The shading-point aggregator a caller actually talks to: a small fixed
//! collection of BxDF lobes plus optional BSSRDFs anchored to a local shading
//! frame, with the lobe-pick/evaluate/sample/pdf API the renderer's
//! integrators drive. One `ScatteringEvent` is built (by an external
//! material-evaluation step, out of this crate's scope) for each primary
//! surface hit; Coat's bottom layer and DoubleSided's two faces own their own
//! nested instances.

use smallvec::SmallVec;

use crate::consts::{MAX_BSSRDFS, MAX_BXDFS};
use crate::core::bssrdf::{Bssrdf, WeightedBssrdf};
use crate::core::geometry::{Frame, Vector3f};
use crate::core::pbrt::{Float, Spectrum};
use crate::core::reflection::{Bxdf, BxdfType, WeightedBxdf};
use crate::core::render_context::RenderContext;
use crate::core::sampling::{power_heuristic, BsdfSample};
use crate::core::shading_frame::same_hemisphere;

#[derive(Debug, Clone)]
pub struct ScatteringEvent {
    frame: Frame,
    bxdfs: SmallVec<[WeightedBxdf; MAX_BXDFS]>,
    bssrdfs: SmallVec<[WeightedBssrdf; MAX_BSSRDFS]>,
    bxdf_total_sample_weight: Float,
    bssrdf_total_sample_weight: Float,
}

/// The outcome of a full BSDF sample, in world space.
pub struct BsdfSampleResult {
    pub wi: Vector3f,
    pub pdf: Float,
    pub f: Spectrum,
    pub sampled_type: BxdfType,
}

/// Which child collection `SampleScatteringType` picked, or neither if the
/// event carries no lobes with positive sample weight at all (`SE_NONE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatteringClass {
    None,
    Bxdf,
    Bssrdf,
}

/// Running-sum weighted pick: selects index `i` with probability
/// `weights[i] / total`, consuming `u` and returning a value in `[0,1)`
/// rescaled for the chosen candidate's own sampling.
fn weighted_pick(weights: &[Float], total: Float, u: Float) -> Option<(usize, Float)> {
    if total <= 0.0 {
        return None;
    }
    let target = u * total;
    let mut running = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        let next = running + w;
        if target < next {
            let remapped = ((target - running) / w).clamp(0.0, 1.0 - 1e-7);
            return Some((i, remapped));
        }
        running = next;
    }
    // Floating-point slop pushed `target` past the running total: fall back
    // to the last candidate carrying positive weight.
    weights.iter().rposition(|&w| w > 0.0).map(|i| (i, 0.0))
}

impl ScatteringEvent {
    pub fn new(shading_normal: Vector3f, tangent_hint: Vector3f) -> ScatteringEvent {
        ScatteringEvent {
            frame: Frame::from_normal_and_tangent(shading_normal, tangent_hint),
            bxdfs: SmallVec::new(),
            bssrdfs: SmallVec::new(),
            bxdf_total_sample_weight: 0.0,
            bssrdf_total_sample_weight: 0.0,
        }
    }

    /// Adds a lobe with the default evaluation weight (`ew = 1`, so
    /// `sw = 1`). Most materials only ever add one instance of a given lobe
    /// and don't need to bias the sampling mix; use `add_bxdf_weighted` for
    /// layered materials that do.
    pub fn add_bxdf(&mut self, bxdf: Bxdf) {
        self.add_bxdf_weighted(bxdf, Spectrum::new(1.0));
    }

    pub fn add_bxdf_weighted(&mut self, bxdf: Bxdf, ew: Spectrum) {
        debug_assert!(self.bxdfs.len() < MAX_BXDFS, "scattering event lobe budget exceeded");
        let entry = WeightedBxdf::with_weight(bxdf, ew);
        self.bxdf_total_sample_weight += entry.sw();
        self.bxdfs.push(entry);
    }

    pub fn add_bssrdf(&mut self, bssrdf: Bssrdf) {
        self.add_bssrdf_weighted(bssrdf, Spectrum::new(1.0));
    }

    pub fn add_bssrdf_weighted(&mut self, bssrdf: Bssrdf, ew: Spectrum) {
        debug_assert!(self.bssrdfs.len() < MAX_BSSRDFS, "scattering event bssrdf budget exceeded");
        let entry = WeightedBssrdf::with_weight(bssrdf, ew);
        self.bssrdf_total_sample_weight += entry.sw();
        self.bssrdfs.push(entry);
    }

    pub fn num_bxdfs(&self) -> usize {
        self.bxdfs.len()
    }

    /// `SampleScatteringType(&flag)`: picks the BxDF class or the BSSRDF
    /// class by their running-sum sample-weight totals, returning the
    /// probability of whatever it picked. `ScatteringClass::None` (and a
    /// probability of 0) means neither child collection carries any weight.
    pub fn sample_scattering_type(&self, rc: &RenderContext) -> (ScatteringClass, Float) {
        let w_bxdf = self.bxdf_total_sample_weight;
        let w_bssrdf = self.bssrdf_total_sample_weight;
        if w_bxdf <= 0.0 && w_bssrdf <= 0.0 {
            return (ScatteringClass::None, 0.0);
        }
        if w_bssrdf <= 0.0 {
            return (ScatteringClass::Bxdf, 1.0);
        }
        if w_bxdf <= 0.0 {
            return (ScatteringClass::Bssrdf, 1.0);
        }
        let p_bxdf = w_bxdf / (w_bxdf + w_bssrdf);
        if rc.uniform_float() < p_bxdf {
            (ScatteringClass::Bxdf, p_bxdf)
        } else {
            (ScatteringClass::Bssrdf, 1.0 - p_bxdf)
        }
    }

    /// Per-lobe sample weights among those matching `flags`, with every
    /// non-matching slot zeroed so index positions line up with `self.bxdfs`.
    fn bxdf_weights(&self, flags: BxdfType) -> (Vec<Float>, Float) {
        let weights: Vec<Float> = self.bxdfs.iter().map(|b| if b.bxdf.matches_flags(flags) { b.sw() } else { 0.0 }).collect();
        let total: Float = weights.iter().sum();
        (weights, total)
    }

    /// Picks one lobe matching `flags` with probability `L.sw / total_sw`,
    /// consuming `u` to make the pick (rescaled so the caller's remaining
    /// entropy in `bs` stays usable for the chosen lobe's own sampling).
    fn pick_bxdf(&self, flags: BxdfType, u: Float) -> Option<(usize, Float, Float)> {
        let (weights, total) = self.bxdf_weights(flags);
        let (idx, remapped_u) = weighted_pick(&weights, total, u)?;
        Some((idx, weights[idx] / total, remapped_u))
    }

    pub fn evaluate_bsdf(&self, wo_world: &Vector3f, wi_world: &Vector3f, flags: BxdfType) -> Spectrum {
        let wo = self.frame.world_to_local(wo_world);
        let wi = self.frame.world_to_local(wi_world);
        if wo.y == 0.0 {
            return Spectrum::default();
        }
        let reflect = same_hemisphere(&wo, &wi);
        let mut f = Spectrum::default();
        for entry in self.bxdfs.iter() {
            if !entry.bxdf.matches_flags(flags) {
                continue;
            }
            let handles_side = (reflect && entry.bxdf.get_type().contains(BxdfType::REFLECTION))
                || (!reflect && entry.bxdf.get_type().contains(BxdfType::TRANSMISSION));
            if handles_side {
                f += entry.bxdf.f(&wo, &wi) * entry.ew;
            }
        }
        f
    }

    /// `Pdf_BSDF(wo,wi) = Σ Li.Pdf(lwo,lwi)·Li.sw / total_sw`: the sw-weighted
    /// mixture density, normalized so it integrates to 1 over `wi` the same
    /// way `sample_bsdf`'s post-sample pdf does.
    pub fn pdf_bsdf(&self, wo_world: &Vector3f, wi_world: &Vector3f, flags: BxdfType) -> Float {
        if self.bxdfs.is_empty() {
            return 0.0;
        }
        let wo = self.frame.world_to_local(wo_world);
        let wi = self.frame.world_to_local(wi_world);
        if wo.y == 0.0 {
            return 0.0;
        }
        let (weights, total) = self.bxdf_weights(flags);
        if total <= 0.0 {
            return 0.0;
        }
        let sum: Float = self.bxdfs.iter().zip(weights.iter()).filter(|(_, &w)| w > 0.0).map(|(b, &w)| b.bxdf.pdf(&wo, &wi) * w).sum();
        sum / total
    }

    /// Samples one lobe by its sw-weighted pick probability, builds the
    /// world-space result, and reconciles the pdf/f against sibling
    /// non-specular lobes the same way `pdf_bsdf`/`evaluate_bsdf` would.
    pub fn sample_bsdf(&self, wo_world: &Vector3f, flags: BxdfType, rc: &RenderContext) -> Option<BsdfSampleResult> {
        let (idx, pick_prob, remapped_u) = self.pick_bxdf(flags, rc.uniform_float())?;
        let wo = self.frame.world_to_local(wo_world);
        if wo.y == 0.0 {
            return None;
        }
        let bs = BsdfSample::new(remapped_u, rc.uniform_float());
        let chosen = &self.bxdfs[idx];
        let (wi, chosen_pdf, chosen_f) = chosen.bxdf.sample_f(&wo, bs, rc);
        if chosen_pdf == 0.0 {
            return None;
        }

        let (mut pdf, mut f) = (chosen_pdf, chosen_f * chosen.ew);
        if !chosen.bxdf.is_specular() {
            let (weights, total) = self.bxdf_weights(flags);
            pdf = chosen_pdf * pick_prob;
            let reflect = same_hemisphere(&wo, &wi);
            f = Spectrum::default();
            for (i, entry) in self.bxdfs.iter().enumerate() {
                if weights[i] <= 0.0 {
                    continue;
                }
                let handles_side = (reflect && entry.bxdf.get_type().contains(BxdfType::REFLECTION))
                    || (!reflect && entry.bxdf.get_type().contains(BxdfType::TRANSMISSION));
                if handles_side {
                    f += entry.bxdf.f(&wo, &wi) * entry.ew;
                }
                if i != idx {
                    pdf += entry.bxdf.pdf(&wo, &wi) * weights[i];
                }
            }
            pdf /= total;
        }

        let wi_world = self.frame.local_to_world(&wi);
        Some(BsdfSampleResult { wi: wi_world, pdf, f, sampled_type: chosen.bxdf.get_type() })
    }

    pub fn sample_bssrdf(&self, wo_world: &Vector3f, u_channel: Float, bs: BsdfSample, rc: &RenderContext) -> Option<crate::core::bssrdf::BssrdfProbeResult> {
        if self.bssrdfs.is_empty() {
            return None;
        }
        let weights: Vec<Float> = self.bssrdfs.iter().map(|b| b.sw()).collect();
        let total: Float = weights.iter().sum();
        let (idx, _) = weighted_pick(&weights, total, u_channel)?;
        self.bssrdfs[idx].bssrdf.sample_s(wo_world, &self.frame, bs, rc)
    }

    /// Mixture-pdf reconstruction for light-sampling MIS against a BSDF
    /// sample drawn by another strategy (power heuristic with `nf = ng = 1`).
    pub fn mis_weight(&self, bsdf_pdf: Float, light_pdf: Float) -> Float {
        power_heuristic(1, bsdf_pdf, 1, light_pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pbrt::Spectrum;

    #[test]
    fn empty_event_evaluates_to_black() {
        let se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let wi = Vector3f::new(0.1, 0.1, 0.9).normalize();
        assert!(se.evaluate_bsdf(&wo, &wi, BxdfType::ALL).is_black());
    }

    #[test]
    fn single_lambert_lobe_round_trips_through_sampling() {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        se.add_bxdf(Bxdf::LambertianReflection { r: Spectrum::new(0.8) });
        let rc = RenderContext::new(3);
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let result = se.sample_bsdf(&wo, BxdfType::ALL, &rc).expect("lambert always samples");
        assert!(result.pdf > 0.0);
        assert!(result.f.c[0] >= 0.0);
    }

    #[test]
    fn num_bxdfs_tracks_additions() {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        assert_eq!(se.num_bxdfs(), 0);
        se.add_bxdf(Bxdf::LambertianReflection { r: Spectrum::new(0.5) });
        assert_eq!(se.num_bxdfs(), 1);
    }

    #[test]
    fn sample_weight_totals_track_additions() {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        se.add_bxdf_weighted(Bxdf::LambertianReflection { r: Spectrum::new(0.5) }, Spectrum::new(0.5));
        se.add_bxdf_weighted(Bxdf::LambertianReflection { r: Spectrum::new(0.2) }, Spectrum::new(0.25));
        assert!((se.bxdf_total_sample_weight - 0.75).abs() < 1e-6);
    }

    #[test]
    fn scattering_class_pick_is_none_when_empty() {
        let se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        let rc = RenderContext::new(1);
        let (class, p) = se.sample_scattering_type(&rc);
        assert_eq!(class, ScatteringClass::None);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn scattering_class_pick_is_certain_with_only_bxdfs() {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        se.add_bxdf(Bxdf::LambertianReflection { r: Spectrum::new(0.5) });
        let rc = RenderContext::new(1);
        let (class, p) = se.sample_scattering_type(&rc);
        assert_eq!(class, ScatteringClass::Bxdf);
        assert_eq!(p, 1.0);
    }

    #[test]
    fn weighted_lobe_pick_biases_toward_higher_sample_weight() {
        let mut se = ScatteringEvent::new(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        se.add_bxdf_weighted(Bxdf::LambertianReflection { r: Spectrum::new(0.9) }, Spectrum::new(0.9));
        se.add_bxdf_weighted(Bxdf::LambertianReflection { r: Spectrum::new(0.1) }, Spectrum::new(0.1));
        let rc = RenderContext::new(7);
        let mut picks = [0usize; 2];
        for _ in 0..200 {
            if let Some((idx, _, _)) = se.pick_bxdf(BxdfType::ALL, rc.uniform_float()) {
                picks[idx] += 1;
            }
        }
        assert!(picks[0] > picks[1]);
    }
}
