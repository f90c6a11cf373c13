use crate::types::{SampleError, SensorSample};
use glam::DVec3;
use std::collections::VecDeque;
use thiserror::Error;

/// Frame marker preceding every sample.
pub const HEADER: [u8; 4] = *b"TILT";
/// Marker + u64 timestamp + 6 x f32.
pub const FRAME_LEN: usize = HEADER.len() + 8 + 6 * 4;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Frame carries an invalid sample: {0}")]
    InvalidSample(#[from] SampleError),
}

/// Streaming decoder for the sensor sample stream.
///
/// Frames are little-endian: `HEADER`, `timestamp_ns: u64`, then
/// `gx, gy, gz, ax, ay, az` as `f32`. Feed raw bytes via `push_data`, then
/// drain samples via `next_sample`.
pub struct ProtocolParser {
    buffer: VecDeque<u8>,
}

impl Default for ProtocolParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolParser {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(4096),
        }
    }

    /// Append received bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Try to extract the next complete sample from the buffer.
    /// Returns `None` if no complete frame is available yet.
    pub fn next_sample(&mut self) -> Option<Result<SensorSample, ProtocolError>> {
        let frame = {
            let buf = self.buffer.make_contiguous();
            let Some(header_pos) = find_pattern(buf, &HEADER) else {
                // Keep a possible partial header at the tail.
                let keep = buf.len().min(HEADER.len() - 1);
                let discard = buf.len() - keep;
                self.buffer.drain(..discard);
                return None;
            };
            if buf.len() - header_pos < FRAME_LEN {
                self.buffer.drain(..header_pos);
                return None;
            }
            if header_pos > 0 {
                tracing::trace!(skipped = header_pos, "Discarding bytes before frame header");
            }
            let mut frame = [0u8; FRAME_LEN];
            frame.copy_from_slice(&buf[header_pos..header_pos + FRAME_LEN]);
            self.buffer.drain(..header_pos + FRAME_LEN);
            frame
        };

        Some(parse_frame(&frame))
    }
}

/// Encode a sample as one frame. Components are narrowed to `f32`.
pub fn encode_frame(sample: &SensorSample) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&HEADER);
    frame[4..12].copy_from_slice(&sample.timestamp_ns.to_le_bytes());
    let values = [
        sample.gyro.x,
        sample.gyro.y,
        sample.gyro.z,
        sample.accel.x,
        sample.accel.y,
        sample.accel.z,
    ];
    for (i, v) in values.iter().enumerate() {
        let offset = 12 + i * 4;
        frame[offset..offset + 4].copy_from_slice(&(*v as f32).to_le_bytes());
    }
    frame
}

fn parse_frame(frame: &[u8; FRAME_LEN]) -> Result<SensorSample, ProtocolError> {
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&frame[4..12]);
    let timestamp_ns = u64::from_le_bytes(ts);

    let f = |index: usize| -> f64 {
        let offset = 12 + index * 4;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&frame[offset..offset + 4]);
        f32::from_le_bytes(bytes) as f64
    };

    let sample = SensorSample {
        gyro: DVec3::new(f(0), f(1), f(2)),
        accel: DVec3::new(f(3), f(4), f(5)),
        timestamp_ns,
    };
    sample.validate()?;
    Ok(sample)
}

/// Find the first occurrence of `pattern` in `data`.
fn find_pattern(data: &[u8], pattern: &[u8]) -> Option<usize> {
    data.windows(pattern.len())
        .position(|window| window == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sample(gx: f64, az: f64, ts: u64) -> SensorSample {
        SensorSample::new(DVec3::new(gx, -0.25, 0.5), DVec3::new(0.0, 1.0, az), ts)
    }

    #[test]
    fn parse_single_frame() {
        let mut parser = ProtocolParser::new();
        parser.push_data(&encode_frame(&make_sample(1.5, 9.75, 42)));

        let sample = parser.next_sample().unwrap().unwrap();
        assert_eq!(sample.timestamp_ns, 42);
        assert!((sample.gyro.x - 1.5).abs() < 1e-6);
        assert!((sample.gyro.y + 0.25).abs() < 1e-6);
        assert!((sample.gyro.z - 0.5).abs() < 1e-6);
        assert!((sample.accel.y - 1.0).abs() < 1e-6);
        assert!((sample.accel.z - 9.75).abs() < 1e-6);

        // No more frames.
        assert!(parser.next_sample().is_none());
    }

    #[test]
    fn parse_fragmented_data() {
        let frame = encode_frame(&make_sample(0.5, 9.8, 7));
        let mid = frame.len() / 2;

        let mut parser = ProtocolParser::new();

        // First half: no complete frame yet.
        parser.push_data(&frame[..mid]);
        assert!(parser.next_sample().is_none());

        parser.push_data(&frame[mid..]);
        let sample = parser.next_sample().unwrap().unwrap();
        assert_eq!(sample.timestamp_ns, 7);
    }

    #[test]
    fn parse_multiple_frames() {
        let mut parser = ProtocolParser::new();
        parser.push_data(&encode_frame(&make_sample(1.0, 9.8, 1)));
        parser.push_data(&encode_frame(&make_sample(2.0, 9.8, 2)));

        let s1 = parser.next_sample().unwrap().unwrap();
        assert!((s1.gyro.x - 1.0).abs() < 1e-6);

        let s2 = parser.next_sample().unwrap().unwrap();
        assert!((s2.gyro.x - 2.0).abs() < 1e-6);

        assert!(parser.next_sample().is_none());
    }

    #[test]
    fn skips_garbage_before_header() {
        let mut parser = ProtocolParser::new();
        parser.push_data(&[0xde, 0xad, b'T', 0x00, 0x54]);
        assert!(parser.next_sample().is_none());
        parser.push_data(&encode_frame(&make_sample(3.0, 9.8, 9)));

        let sample = parser.next_sample().unwrap().unwrap();
        assert_eq!(sample.timestamp_ns, 9);
        assert!(parser.next_sample().is_none());
    }

    #[test]
    fn header_split_across_reads() {
        let frame = encode_frame(&make_sample(0.1, 9.8, 11));
        let mut parser = ProtocolParser::new();
        parser.push_data(&[0xff, 0xff]);
        parser.push_data(&frame[..2]);
        assert!(parser.next_sample().is_none());
        parser.push_data(&frame[2..]);
        assert_eq!(parser.next_sample().unwrap().unwrap().timestamp_ns, 11);
    }

    #[test]
    fn non_finite_frame_is_rejected() {
        let mut parser = ProtocolParser::new();
        parser.push_data(&encode_frame(&make_sample(0.0, f64::NAN, 3)));
        parser.push_data(&encode_frame(&make_sample(0.0, 9.8, 4)));

        let err = parser.next_sample().unwrap().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidSample(SampleError::NonFinite { field: "accel" })
        );
        // The stream recovers on the next frame.
        assert_eq!(parser.next_sample().unwrap().unwrap().timestamp_ns, 4);
    }
}
