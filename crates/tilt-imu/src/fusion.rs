use crate::quat;
use crate::timing::TimingGate;
use crate::types::SensorSample;
use glam::{DQuat, DVec3};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Default Madgwick beta.
pub const DEFAULT_GAIN: f64 = 0.1;

/// Gains outside this range either converge too slowly or chase noise.
pub const STABLE_GAIN_RANGE: RangeInclusive<f64> = 0.05..=0.2;

/// Accelerometer norms below this are treated as free-fall / no reading.
const MIN_ACCEL_NORM: f64 = 1e-6;
/// Gradient norms at or below this are treated as already aligned.
const MIN_GRADIENT_NORM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GainError {
    #[error("Gain {0} must be finite and positive")]
    OutOfDomain(f64),
}

/// Check a gain coming from the control surface and clamp it into
/// [`STABLE_GAIN_RANGE`].
pub fn validate_gain(beta: f64) -> Result<f64, GainError> {
    if !beta.is_finite() || beta <= 0.0 {
        return Err(GainError::OutOfDomain(beta));
    }
    let clamped = beta.clamp(*STABLE_GAIN_RANGE.start(), *STABLE_GAIN_RANGE.end());
    if clamped != beta {
        tracing::warn!(requested = beta, applied = clamped, "Gain clamped to stable range");
    }
    Ok(clamped)
}

/// Madgwick gradient-descent AHRS without magnetometer.
///
/// Yaw is unobservable from gravity alone and drifts with gyro error.
#[derive(Debug, Clone)]
pub struct MadgwickFilter {
    q: DQuat,
    beta: f64,
    gate: TimingGate,
}

impl Default for MadgwickFilter {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN)
    }
}

impl MadgwickFilter {
    pub fn new(beta: f64) -> Self {
        Self {
            q: DQuat::IDENTITY,
            beta,
            gate: TimingGate::new(),
        }
    }

    /// Current unit orientation quaternion.
    pub fn quaternion(&self) -> DQuat {
        self.q
    }

    pub fn gain(&self) -> f64 {
        self.beta
    }

    pub fn set_gain(&mut self, beta: f64) {
        self.beta = beta;
    }

    /// Back to identity. Timestamp history is kept.
    pub fn reset(&mut self) {
        self.q = DQuat::IDENTITY;
    }

    /// Run a sample through the timing gate and, if it yields an interval,
    /// through [`MadgwickFilter::update`]. Returns whether the state changed.
    pub fn update_sample(&mut self, sample: &SensorSample) -> bool {
        match self.gate.elapsed(sample.timestamp_ns) {
            Some(dt) => {
                self.update(sample.gyro, sample.accel, dt);
                true
            }
            None => false,
        }
    }

    /// Advance the orientation by `dt` seconds.
    ///
    /// `dt` must be finite and non-negative. A near-zero accelerometer
    /// reading degrades to pure gyro integration.
    pub fn update(&mut self, gyro: DVec3, accel: DVec3, dt: f64) {
        let rate = quat::multiply(self.q, quat::pure(gyro)) * 0.5;

        let q_dot = match self.gradient(accel) {
            Some(step) => rate - step * self.beta,
            None => rate,
        };

        self.q = quat::normalize(self.q + q_dot * dt);
    }

    /// Normalised objective-function gradient, or `None` when there is no
    /// usable gravity reference or the estimate is already aligned.
    fn gradient(&self, accel: DVec3) -> Option<DQuat> {
        let norm = accel.length();
        if norm < MIN_ACCEL_NORM {
            return None;
        }
        let a = accel / norm;
        let (ax, ay, az) = (a.x, a.y, a.z);
        let (q0, q1, q2, q3) = (self.q.w, self.q.x, self.q.y, self.q.z);

        let _2q0 = 2.0 * q0;
        let _2q1 = 2.0 * q1;
        let _2q2 = 2.0 * q2;
        let _2q3 = 2.0 * q3;
        let _4q0 = 4.0 * q0;
        let _4q1 = 4.0 * q1;
        let _4q2 = 4.0 * q2;
        let _8q1 = 8.0 * q1;
        let _8q2 = 8.0 * q2;
        let q0q0 = q0 * q0;
        let q1q1 = q1 * q1;
        let q2q2 = q2 * q2;
        let q3q3 = q3 * q3;

        let s0 = _4q0 * q2q2 + _2q2 * ax + _4q0 * q1q1 - _2q1 * ay;
        let s1 = _4q1 * q3q3 - _2q3 * ax + 4.0 * q0q0 * q1 - _2q0 * ay - _4q1
            + _8q1 * q1q1
            + _8q1 * q2q2
            + _4q1 * az;
        let s2 = 4.0 * q0q0 * q2 + _2q0 * ax + _4q2 * q3q3 - _2q3 * ay - _4q2
            + _8q2 * q1q1
            + _8q2 * q2q2
            + _4q2 * az;
        let s3 = 4.0 * q1q1 * q3 - _2q1 * ax + 4.0 * q2q2 * q3 - _2q2 * ay;

        let s = quat::from_wxyz(s0, s1, s2, s3);
        let s_norm = s.length();
        if s_norm <= MIN_GRADIENT_NORM {
            return None;
        }
        Some(s * (1.0 / s_norm))
    }
}
