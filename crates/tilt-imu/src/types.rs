use glam::{DQuat, DVec3};
use thiserror::Error;

/// One timestamped reading from the sensor collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Gyroscope angular velocity (rad/s).
    pub gyro: DVec3,
    /// Accelerometer linear acceleration including gravity (m/s^2).
    pub accel: DVec3,
    /// Monotonic timestamp (ns).
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("Sample {field} contains a non-finite component")]
    NonFinite { field: &'static str },
}

impl SensorSample {
    pub fn new(gyro: DVec3, accel: DVec3, timestamp_ns: u64) -> Self {
        Self {
            gyro,
            accel,
            timestamp_ns,
        }
    }

    /// Reject samples the filter must never see (NaN or infinite readings).
    pub fn validate(&self) -> Result<(), SampleError> {
        if !self.gyro.is_finite() {
            return Err(SampleError::NonFinite { field: "gyro" });
        }
        if !self.accel.is_finite() {
            return Err(SampleError::NonFinite { field: "accel" });
        }
        Ok(())
    }
}

/// Fused orientation snapshot handed to display consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Device-to-world orientation as a unit quaternion.
    pub quaternion: DQuat,
    /// Signed twist about the reference axis, relative to the zero pose.
    pub angle_degrees: f64,
    /// Timestamp of the sample that produced this snapshot.
    pub timestamp_ns: u64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            quaternion: DQuat::IDENTITY,
            angle_degrees: 0.0,
            timestamp_ns: 0,
        }
    }
}
