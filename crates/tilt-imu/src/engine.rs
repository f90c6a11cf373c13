use crate::fusion::{validate_gain, GainError, MadgwickFilter};
use crate::reference::{ReferenceError, ReferenceTracker};
use crate::types::{Orientation, SampleError, SensorSample};
use glam::DVec3;

/// Per-sample pipeline: timing gate, Madgwick update, reference-relative
/// angle.
///
/// Not synchronized; callers feed samples from a single task.
#[derive(Debug, Clone)]
pub struct OrientationEngine {
    filter: MadgwickFilter,
    tracker: ReferenceTracker,
    latest: Orientation,
}

impl OrientationEngine {
    pub fn new(beta: f64, axis: DVec3) -> Result<Self, ReferenceError> {
        Ok(Self {
            filter: MadgwickFilter::new(beta),
            tracker: ReferenceTracker::new(axis)?,
            latest: Orientation::default(),
        })
    }

    /// Feed one sample. Returns the new snapshot, or `None` if the timing
    /// gate held the sample back. Invalid samples leave all state untouched.
    pub fn process(&mut self, sample: &SensorSample) -> Result<Option<Orientation>, SampleError> {
        sample.validate()?;

        if !self.filter.update_sample(sample) {
            return Ok(None);
        }

        let q = self.filter.quaternion();
        self.tracker.record_reference_if_unset(q);
        self.latest = Orientation {
            quaternion: q,
            angle_degrees: self.tracker.compute_angle_degrees(q),
            timestamp_ns: sample.timestamp_ns,
        };
        Ok(Some(self.latest))
    }

    /// Latest published snapshot.
    pub fn orientation(&self) -> Orientation {
        self.latest
    }

    /// Treat the current filter orientation as the zero pose.
    pub fn reset_reference(&mut self) {
        let q = self.filter.quaternion();
        self.tracker.reset_reference(q);
        self.latest.angle_degrees = self.tracker.compute_angle_degrees(q);
    }

    /// Drop the orientation estimate back to identity. The zero pose and the
    /// timestamp history survive, so the next sample integrates normally.
    pub fn reset_filter(&mut self) {
        self.filter.reset();
        let q = self.filter.quaternion();
        self.latest.quaternion = q;
        self.latest.angle_degrees = self.tracker.compute_angle_degrees(q);
        tracing::info!("Orientation filter reset");
    }

    /// Validate, clamp and apply a new gain. Returns the applied value.
    pub fn set_gain(&mut self, beta: f64) -> Result<f64, GainError> {
        let applied = validate_gain(beta)?;
        self.filter.set_gain(applied);
        tracing::info!(beta = applied, "Filter gain updated");
        Ok(applied)
    }

    pub fn filter(&self) -> &MadgwickFilter {
        &self.filter
    }

    pub fn tracker(&self) -> &ReferenceTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DQuat;

    const STEP_NS: u64 = 10_000_000;

    fn sample(gyro: DVec3, accel: DVec3, step: u64) -> SensorSample {
        SensorSample::new(gyro, accel, 1_000 + step * STEP_NS)
    }

    fn diagonal() -> DVec3 {
        DVec3::new(1.0, -1.0, 0.0)
    }

    #[test]
    fn first_sample_is_held_back() {
        let mut engine = OrientationEngine::new(0.1, diagonal()).unwrap();
        let out = engine.process(&sample(DVec3::Z, DVec3::ZERO, 0)).unwrap();
        assert!(out.is_none());
        assert_eq!(engine.filter().quaternion(), DQuat::IDENTITY);
        assert_eq!(engine.tracker().reference(), None);
    }

    #[test]
    fn stationary_level_reads_zero() {
        let mut engine = OrientationEngine::new(0.1, diagonal()).unwrap();
        let level = DVec3::new(0.0, 0.0, 9.81);
        for step in 0..=200 {
            if let Some(o) = engine.process(&sample(DVec3::ZERO, level, step)).unwrap() {
                assert!((o.quaternion.w - 1.0).abs() < 1e-9);
                assert!(o.angle_degrees.abs() < 0.5);
            }
        }
        assert_eq!(engine.orientation().timestamp_ns, 1_000 + 200 * STEP_NS);
    }

    #[test]
    fn gyro_about_axis_tracks_elapsed_angle() {
        let axis = diagonal().normalize();
        for (rate, dt_ns, steps) in [(1.5, 10_000_000u64, 100u64), (-0.8, 20_000_000, 100), (2.0, 5_000_000, 400)] {
            let mut engine = OrientationEngine::new(0.1, diagonal()).unwrap();
            let gyro = axis * rate;
            // Priming sample, then `steps` integrations.
            let mut last = None;
            for i in 0..=steps {
                last = engine
                    .process(&SensorSample::new(gyro, DVec3::ZERO, i * dt_ns))
                    .unwrap();
            }
            // The reference is captured after the first integration, so
            // only `steps - 1` intervals show up in the angle.
            let expected = (rate * (steps - 1) as f64 * dt_ns as f64 * 1e-9).to_degrees();
            let angle = last.unwrap().angle_degrees;
            assert!(
                (angle - expected).abs() <= expected.abs() * 0.01,
                "rate {rate}: {angle} vs {expected}"
            );
        }
    }

    #[test]
    fn reference_is_recorded_on_first_output() {
        let mut engine = OrientationEngine::new(0.1, DVec3::Z).unwrap();
        let spin = DVec3::new(0.0, 0.0, 1.0);
        engine.process(&sample(spin, DVec3::ZERO, 0)).unwrap();
        let first = engine.process(&sample(spin, DVec3::ZERO, 1)).unwrap().unwrap();
        assert_eq!(engine.tracker().reference(), Some(first.quaternion));
        assert!(first.angle_degrees.abs() < 1e-9);

        let next = engine.process(&sample(spin, DVec3::ZERO, 2)).unwrap().unwrap();
        assert!(next.angle_degrees > 0.0);
    }

    #[test]
    fn reset_reference_zeroes_angle() {
        let mut engine = OrientationEngine::new(0.1, DVec3::Z).unwrap();
        let spin = DVec3::new(0.0, 0.0, 2.0);
        for step in 0..50 {
            engine.process(&sample(spin, DVec3::ZERO, step)).unwrap();
        }
        assert!(engine.orientation().angle_degrees > 10.0);

        engine.reset_reference();
        assert!(engine.orientation().angle_degrees.abs() < 1e-6);
        assert_eq!(engine.tracker().reference(), Some(engine.filter().quaternion()));
    }

    #[test]
    fn filter_reset_returns_to_identity_and_keeps_timing() {
        let mut engine = OrientationEngine::new(0.1, DVec3::Z).unwrap();
        let spin = DVec3::new(0.0, 0.0, 1.0);
        engine.reset_reference();
        for step in 0..=30 {
            engine.process(&sample(spin, DVec3::ZERO, step)).unwrap();
        }
        assert!(engine.orientation().angle_degrees > 10.0);

        engine.reset_filter();
        assert_eq!(engine.filter().quaternion(), DQuat::IDENTITY);
        assert_eq!(engine.orientation().quaternion, DQuat::IDENTITY);
        assert!(engine.orientation().angle_degrees.abs() < 1e-9);
        assert_eq!(engine.tracker().reference(), Some(DQuat::IDENTITY));

        // The gate is still primed: the very next sample integrates.
        let next = engine.process(&sample(spin, DVec3::ZERO, 31)).unwrap().unwrap();
        assert!((next.angle_degrees - 0.01_f64.to_degrees()).abs() < 1e-3);
    }

    #[test]
    fn invalid_sample_leaves_state_untouched() {
        let mut engine = OrientationEngine::new(0.1, DVec3::Z).unwrap();
        engine.process(&sample(DVec3::Z, DVec3::ZERO, 0)).unwrap();
        engine.process(&sample(DVec3::Z, DVec3::ZERO, 1)).unwrap();
        let before = engine.orientation();

        let bad = sample(DVec3::new(f64::NAN, 0.0, 0.0), DVec3::ZERO, 2);
        assert_eq!(engine.process(&bad), Err(SampleError::NonFinite { field: "gyro" }));
        assert_eq!(engine.orientation(), before);
        assert_eq!(engine.filter().quaternion(), before.quaternion);

        // The rejected timestamp never reached the gate.
        let good = engine.process(&sample(DVec3::Z, DVec3::ZERO, 2)).unwrap();
        assert!(good.is_some());
    }

    #[test]
    fn gain_commands_are_clamped() {
        let mut engine = OrientationEngine::new(0.1, DVec3::Z).unwrap();
        assert_eq!(engine.set_gain(0.15), Ok(0.15));
        assert_eq!(engine.filter().gain(), 0.15);
        assert_eq!(engine.set_gain(1.0), Ok(0.2));
        assert_eq!(engine.filter().gain(), 0.2);
        assert!(engine.set_gain(-1.0).is_err());
        assert_eq!(engine.filter().gain(), 0.2);
    }

    #[test]
    fn degenerate_axis_fails_construction() {
        assert!(OrientationEngine::new(0.1, DVec3::ZERO).is_err());
    }
}
