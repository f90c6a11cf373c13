//! Quaternion helpers on top of `glam::DQuat`.
//!
//! glam stores quaternions as `(x, y, z, w)`; everything in this crate
//! reasons in scalar-first `(w, x, y, z)` order, so these wrappers keep the
//! call sites readable and pin down the degenerate-norm behaviour.

use glam::{DQuat, DVec3};

/// Hamilton product `a ⊗ b`. Not commutative.
pub fn multiply(a: DQuat, b: DQuat) -> DQuat {
    a * b
}

/// `(w, -x, -y, -z)`.
pub fn conjugate(q: DQuat) -> DQuat {
    q.conjugate()
}

/// Scale `q` to unit length.
///
/// A zero (or non-finite) norm has no direction to preserve, so the
/// identity rotation is returned instead.
pub fn normalize(q: DQuat) -> DQuat {
    let norm = q.length();
    if norm > 0.0 && norm.is_finite() {
        q * (1.0 / norm)
    } else {
        DQuat::IDENTITY
    }
}

/// Build a quaternion from scalar-first components.
pub fn from_wxyz(w: f64, x: f64, y: f64, z: f64) -> DQuat {
    DQuat::from_xyzw(x, y, z, w)
}

/// Scalar-first components for display consumers.
pub fn to_wxyz(q: DQuat) -> [f64; 4] {
    [q.w, q.x, q.y, q.z]
}

/// Pure quaternion `(0, v)`.
pub fn pure(v: DVec3) -> DQuat {
    DQuat::from_xyzw(v.x, v.y, v.z, 0.0)
}

/// Vector part `(x, y, z)`.
pub fn vector_part(q: DQuat) -> DVec3 {
    DVec3::new(q.x, q.y, q.z)
}
