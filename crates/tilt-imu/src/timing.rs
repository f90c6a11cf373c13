/// Nanoseconds to seconds.
const NS_TO_S: f64 = 1e-9;

/// Derives the integration interval between consecutive gyro samples.
///
/// The first sample only primes the gate. Duplicate or out-of-order
/// timestamps produce no interval, and the newest accepted timestamp is
/// kept so a late sample cannot stretch the following interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingGate {
    last_ns: Option<u64>,
}

impl TimingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds elapsed since the previous accepted timestamp, or `None` if
    /// the filter must skip this sample.
    pub fn elapsed(&mut self, timestamp_ns: u64) -> Option<f64> {
        match self.last_ns {
            None => {
                self.last_ns = Some(timestamp_ns);
                None
            }
            Some(prev) if timestamp_ns <= prev => {
                tracing::trace!(prev, timestamp_ns, "Dropping non-increasing timestamp");
                None
            }
            Some(prev) => {
                self.last_ns = Some(timestamp_ns);
                Some((timestamp_ns - prev) as f64 * NS_TO_S)
            }
        }
    }
}
