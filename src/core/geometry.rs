//! 3D vector/point/normal types and the shading-frame basis. Shading code
//! treats `Vector3f` as the carrier for directions already transformed into
//! local coordinates where the shading normal is +Y (`cos_theta(w) = w.y`).

use impl_ops::impl_op_ex;
use std::ops;

use crate::core::pbrt::Float;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vector3f {
    pub x: Float,
    pub y: Float,
    pub z: Float,
}

pub type Point3f = Vector3f;
pub type Normal3f = Vector3f;

impl Vector3f {
    pub fn new(x: Float, y: Float, z: Float) -> Vector3f {
        Vector3f { x, y, z }
    }

    pub fn zero() -> Vector3f {
        Vector3f::new(0.0, 0.0, 0.0)
    }

    pub fn length_squared(&self) -> Float {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(&self) -> Float {
        self.length_squared().sqrt()
    }

    pub fn normalize(&self) -> Vector3f {
        let len = self.length();
        if len == 0.0 {
            *self
        } else {
            *self / len
        }
    }
}

pub fn dot(a: &Vector3f, b: &Vector3f) -> Float {
    a.x * b.x + a.y * b.y + a.z * b.z
}

pub fn abs_dot(a: &Vector3f, b: &Vector3f) -> Float {
    dot(a, b).abs()
}

pub fn cross(a: &Vector3f, b: &Vector3f) -> Vector3f {
    Vector3f::new(a.y * b.z - a.z * b.y, a.z * b.x - a.x * b.z, a.x * b.y - a.y * b.x)
}

pub fn distance(a: &Point3f, b: &Point3f) -> Float {
    (*a - *b).length()
}

impl_op_ex!(+ |a: &Vector3f, b: &Vector3f| -> Vector3f { Vector3f::new(a.x+b.x, a.y+b.y, a.z+b.z) });
impl_op_ex!(- |a: &Vector3f, b: &Vector3f| -> Vector3f { Vector3f::new(a.x-b.x, a.y-b.y, a.z-b.z) });
impl_op_ex!(* |a: &Vector3f, s: Float| -> Vector3f { Vector3f::new(a.x*s, a.y*s, a.z*s) });
impl_op_ex!(* |s: Float, a: &Vector3f| -> Vector3f { Vector3f::new(a.x*s, a.y*s, a.z*s) });
impl_op_ex!(/ |a: &Vector3f, s: Float| -> Vector3f { let inv = 1.0/s; Vector3f::new(a.x*inv, a.y*inv, a.z*inv) });

impl ops::Neg for Vector3f {
    type Output = Vector3f;
    fn neg(self) -> Vector3f {
        Vector3f::new(-self.x, -self.y, -self.z)
    }
}

/// Orthonormal basis at a shading point, built from the geometry normal and
/// a tangent. `t`/`n`/`bt` form a right-handed frame with `n` as shading +Y.
#[derive(Debug, Copy, Clone)]
pub struct Frame {
    pub t: Vector3f,
    pub n: Vector3f,
    pub bt: Vector3f,
}

impl Frame {
    pub fn from_normal_and_tangent(n: Vector3f, tangent_hint: Vector3f) -> Frame {
        let n = n.normalize();
        let t = (tangent_hint - n * dot(&tangent_hint, &n)).normalize();
        let t = if t.length_squared() < 1e-12 {
            coordinate_system(&n).0
        } else {
            t
        };
        let bt = cross(&n, &t);
        Frame { t, n, bt }
    }

    pub fn world_to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(dot(v, &self.t), dot(v, &self.n), dot(v, &self.bt))
    }

    pub fn local_to_world(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(
            self.t.x * v.x + self.n.x * v.y + self.bt.x * v.z,
            self.t.y * v.x + self.n.y * v.y + self.bt.y * v.z,
            self.t.z * v.x + self.n.z * v.y + self.bt.z * v.z,
        )
    }
}

/// Builds an arbitrary orthonormal basis given one vector, used when no
/// tangent hint is available (Duff et al.'s branchless construction).
pub fn coordinate_system(v1: &Vector3f) -> (Vector3f, Vector3f) {
    let sign = if v1.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + v1.z);
    let b = v1.x * v1.y * a;
    let v2 = Vector3f::new(1.0 + sign * v1.x * v1.x * a, sign * b, -sign * v1.x);
    let v3 = Vector3f::new(b, sign + v1.y * v1.y * a, -v1.y);
    (v2, v3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips() {
        let f = Frame::from_normal_and_tangent(Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        let w = Vector3f::new(0.3, 0.4, 0.5).normalize();
        let local = f.world_to_local(&w);
        let back = f.local_to_world(&local);
        assert!((back - w).length() < 1e-5);
    }

    #[test]
    fn coordinate_system_is_orthonormal() {
        let n = Vector3f::new(0.2, 0.6, 0.77).normalize();
        let (a, b) = coordinate_system(&n);
        assert!(dot(&a, &n).abs() < 1e-5);
        assert!(dot(&b, &n).abs() < 1e-5);
        assert!(dot(&a, &b).abs() < 1e-5);
    }
}
