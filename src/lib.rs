#[macro_use]
extern crate impl_ops;

pub mod consts;
pub mod error;

pub mod core {
    pub mod bssrdf;
    pub mod coat;
    pub mod disney;
    pub mod distribution_brdf;
    pub mod fabric;
    pub mod fourier;
    pub mod fresnel;
    pub mod geometry;
    pub mod hair;
    pub mod interaction;
    pub mod kylin_principle;
    pub mod merl;
    pub mod microfacet;
    pub mod pbrt;
    pub mod reflection;
    pub mod render_context;
    pub mod rng;
    pub mod sampling;
    pub mod scattering_event;
    pub mod shading_frame;
}

pub use crate::core::geometry::{Normal3f, Point3f, Vector3f};
pub use crate::core::pbrt::{Float, Spectrum};
pub use crate::core::render_context::RenderContext;
