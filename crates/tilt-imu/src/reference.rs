use crate::quat;
use glam::{DQuat, DVec3};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ReferenceError {
    #[error("Reference axis {0:?} cannot be normalized")]
    DegenerateAxis(DVec3),
}

/// Reports rotation about a fixed body axis relative to a zero pose.
///
/// The relative rotation `conj(q_ref) * q` is split by swing-twist
/// decomposition and only the twist about `axis` is kept. Swing about
/// orthogonal axes does not show up in the angle.
#[derive(Debug, Clone)]
pub struct ReferenceTracker {
    reference: Option<DQuat>,
    axis: DVec3,
}

impl ReferenceTracker {
    /// `axis` is in body coordinates and need not be unit length.
    pub fn new(axis: DVec3) -> Result<Self, ReferenceError> {
        let axis = axis
            .try_normalize()
            .ok_or(ReferenceError::DegenerateAxis(axis))?;
        Ok(Self {
            reference: None,
            axis,
        })
    }

    pub fn reference(&self) -> Option<DQuat> {
        self.reference
    }

    /// Capture `q` as the zero pose unless one is already held.
    /// Returns whether the reference was captured.
    pub fn record_reference_if_unset(&mut self, q: DQuat) -> bool {
        if self.reference.is_some() {
            return false;
        }
        self.reference = Some(q);
        tracing::debug!(w = q.w, x = q.x, y = q.y, z = q.z, "Reference pose recorded");
        true
    }

    /// Make `q` the zero pose.
    pub fn reset_reference(&mut self, q: DQuat) {
        self.reference = Some(q);
        tracing::info!(w = q.w, x = q.x, y = q.y, z = q.z, "Reference pose reset");
    }

    /// Signed twist of `q` about the axis, in radians. Identity stands in
    /// for the reference until one is recorded.
    pub fn angle_radians(&self, q: DQuat) -> f64 {
        let reference = self.reference.unwrap_or(DQuat::IDENTITY);
        let rel = quat::normalize(quat::multiply(quat::conjugate(reference), q));
        let axis_dot = quat::vector_part(rel).dot(self.axis);
        2.0 * axis_dot.atan2(rel.w)
    }

    pub fn compute_angle_degrees(&self, q: DQuat) -> f64 {
        self.angle_radians(q).to_degrees()
    }
}
