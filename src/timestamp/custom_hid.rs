use std::sync::Mutex;

use tracing::debug;

use super::{lock, FrameTimestampReader, TimestampDomain};
use crate::capture::metadata::{read_u64, ticks_to_millis};
use crate::capture::{FrameObject, RequestMapping};

/// Byte offset of the hardware timestamp inside a custom HID report
pub const TIMESTAMP_OFFSET: usize = 17;

/// Slots reserved for the GPIO sensors behind the custom report
const SENSORS: usize = 4;

/// Reader for custom HID reports (GPIO/motion-module events).
///
/// The hardware clock travels inside the report payload itself, so the
/// timestamp is always hardware sourced.
pub struct CustomHidTimestampReader {
    // TODO: count per GPIO once the report's counter field is decoded; until
    // then every report shares slot 0
    counters: Mutex<[u64; SENSORS]>,
}

impl Default for CustomHidTimestampReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomHidTimestampReader {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new([0; SENSORS]),
        }
    }

    /// The timestamp is part of the payload, so every report has one
    pub fn has_metadata(&self, _mode: &RequestMapping, _frame: &FrameObject) -> bool {
        true
    }
}

impl FrameTimestampReader for CustomHidTimestampReader {
    fn get_frame_timestamp(&self, _mode: &RequestMapping, frame: &FrameObject) -> f64 {
        let _guard = lock(&self.counters);
        ticks_to_millis(read_u64(&frame.pixels, TIMESTAMP_OFFSET))
    }

    fn get_frame_counter(&self, _mode: &RequestMapping, _frame: &FrameObject) -> u64 {
        let mut counters = lock(&self.counters);
        counters[0] += 1;
        counters[0]
    }

    fn get_frame_timestamp_domain(
        &self,
        _mode: &RequestMapping,
        _frame: &FrameObject,
    ) -> TimestampDomain {
        TimestampDomain::HardwareClock
    }

    fn reset(&self) {
        debug!("Resetting custom HID frame counters");
        *lock(&self.counters) = [0; SENSORS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{fourcc, StreamType};

    fn report(ticks: u64) -> Vec<u8> {
        let mut buf = vec![0xaa; 32];
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&ticks.to_le_bytes());
        buf
    }

    #[test]
    fn test_timestamp_from_payload_offset() {
        let reader = CustomHidTimestampReader::new();
        let mode = RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 1);
        let frame = FrameObject::new(report(250_000));

        assert!((reader.get_frame_timestamp(&mode, &frame) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_domain_always_hardware() {
        let reader = CustomHidTimestampReader::new();
        let mode = RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 1);

        for frame in [
            FrameObject::default(),
            FrameObject::new(report(1)).with_metadata(vec![0u8; 4]),
        ] {
            assert!(reader.has_metadata(&mode, &frame));
            assert_eq!(
                reader.get_frame_timestamp_domain(&mode, &frame),
                TimestampDomain::HardwareClock
            );
        }
    }

    #[test]
    fn test_single_counter_shared_across_routes() {
        let reader = CustomHidTimestampReader::new();
        let gyro = RequestMapping::new(fourcc::GYRO, StreamType::Gyro, 200);
        let custom = RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 1);
        let frame = FrameObject::default();

        assert_eq!(reader.get_frame_counter(&custom, &frame), 1);
        assert_eq!(reader.get_frame_counter(&gyro, &frame), 2);
        assert_eq!(reader.get_frame_counter(&custom, &frame), 3);

        reader.reset();
        assert_eq!(reader.get_frame_counter(&gyro, &frame), 1);
    }
}
