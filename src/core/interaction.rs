//! The slice of a surface hit that shading actually consumes. Full ray/scene
//! intersection data (primitive id, uv, partial derivatives for texturing,
//! …) belongs to the external collaborator named in the purpose/scope
//! section; only the fields the shading core reads are modeled here.

use crate::core::geometry::{Normal3f, Point3f, Vector3f};
use crate::core::pbrt::Float;

#[derive(Debug, Copy, Clone)]
pub struct SurfaceInteraction {
    pub p: Point3f,
    pub geometry_n: Normal3f,
    pub shading_n: Normal3f,
    pub dpdu: Vector3f,
    /// Distance along the incident ray; used only so BSSRDF probe rays can
    /// offset `tmin` past the exit point without self-intersecting.
    pub t: Float,
}

impl SurfaceInteraction {
    pub fn new(p: Point3f, geometry_n: Normal3f, shading_n: Normal3f, dpdu: Vector3f) -> SurfaceInteraction {
        SurfaceInteraction { p, geometry_n, shading_n, dpdu, t: 0.0 }
    }

    /// `PointingUp` tests the *geometry* normal, not the shading normal, so
    /// normal-mapped lobes still short-circuit when the incoming ray is
    /// behind the real surface.
    pub fn pointing_up(&self, w: &Vector3f) -> bool {
        crate::core::geometry::dot(w, &self.geometry_n) > 0.0
    }
}
