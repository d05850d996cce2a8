use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::{
    lock, FrameTimestampReader, PinRouter, SystemTimeService, TimeService, TimestampDomain,
};
use crate::capture::metadata::{read_u64, ticks_to_millis};
use crate::capture::{FrameObject, RequestMapping};

#[derive(Debug, Default)]
struct State {
    counters: [u64; PinRouter::PINS],
    warned: bool,
}

/// Reader for IIO HID motion endpoints (gyro, accel).
///
/// Unlike the UVC reader nothing is latched: every frame is checked on its own,
/// so a sensor that drops its timestamp mid-stream switches domain right away.
pub struct HidTimestampReader {
    state: Mutex<State>,
    time_service: Arc<dyn TimeService>,
    router: PinRouter,
}

impl Default for HidTimestampReader {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTimestampReader {
    pub fn new() -> Self {
        Self::with_time_service(Arc::new(SystemTimeService))
    }

    pub fn with_time_service(time_service: Arc<dyn TimeService>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            time_service,
            router: PinRouter::MOTION,
        }
    }

    /// Any metadata at all counts; HID reports carry no zero padding to scan
    pub fn has_metadata(&self, _mode: &RequestMapping, frame: &FrameObject) -> bool {
        frame.metadata_size() > 0
    }
}

impl FrameTimestampReader for HidTimestampReader {
    fn get_frame_timestamp(&self, mode: &RequestMapping, frame: &FrameObject) -> f64 {
        let mut state = lock(&self.state);

        if self.has_metadata(mode, frame) {
            return ticks_to_millis(read_u64(frame.metadata(), 0));
        }

        if !state.warned {
            warn!("HID timestamp not found! please apply HID patch.");
            state.warned = true;
        }
        metrics::counter!("ds5_timestamp_fallback_total", "reader" => "hid").increment(1);
        self.time_service.get_time()
    }

    fn get_frame_counter(&self, mode: &RequestMapping, _frame: &FrameObject) -> u64 {
        let mut state = lock(&self.state);
        let counter = &mut state.counters[self.router.pin(mode)];
        *counter += 1;
        *counter
    }

    fn get_frame_timestamp_domain(
        &self,
        mode: &RequestMapping,
        frame: &FrameObject,
    ) -> TimestampDomain {
        if self.has_metadata(mode, frame) {
            TimestampDomain::HardwareClock
        } else {
            TimestampDomain::SystemTime
        }
    }

    fn reset(&self) {
        debug!("Resetting HID frame counters");
        *lock(&self.state) = State::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{fourcc, StreamType};
    use crate::timestamp::free_running::tests::FixedClock;
    use crate::timestamp::tests::count_warnings;

    fn gyro() -> RequestMapping {
        RequestMapping::new(fourcc::GYRO, StreamType::Gyro, 200)
    }

    fn accel() -> RequestMapping {
        RequestMapping::new(fourcc::ACCEL, StreamType::Accel, 250)
    }

    #[test]
    fn test_timestamp_from_metadata_ticks() {
        let reader = HidTimestampReader::with_time_service(Arc::new(FixedClock(1.0)));
        let frame = FrameObject::default().with_metadata(5_000_000u64.to_le_bytes().to_vec());

        assert!((reader.get_frame_timestamp(&gyro(), &frame) - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_metadata_still_counts_as_present() {
        let reader = HidTimestampReader::with_time_service(Arc::new(FixedClock(1.0)));
        let frame = FrameObject::default().with_metadata(vec![0u8; 8]);

        assert!(reader.has_metadata(&gyro(), &frame));
        assert_eq!(reader.get_frame_timestamp(&gyro(), &frame), 0.0);
        assert_eq!(
            reader.get_frame_timestamp_domain(&gyro(), &frame),
            TimestampDomain::HardwareClock
        );
    }

    #[test]
    fn test_domain_reevaluated_every_frame() {
        let reader = HidTimestampReader::with_time_service(Arc::new(FixedClock(42.0)));
        let with_md = FrameObject::default().with_metadata(vec![1u8; 8]);
        let without_md = FrameObject::default();

        reader.get_frame_timestamp(&accel(), &with_md);
        assert_eq!(
            reader.get_frame_timestamp_domain(&accel(), &with_md),
            TimestampDomain::HardwareClock
        );
        assert_eq!(reader.get_frame_timestamp(&accel(), &without_md), 42.0);
        assert_eq!(
            reader.get_frame_timestamp_domain(&accel(), &without_md),
            TimestampDomain::SystemTime
        );
    }

    #[test]
    fn test_counters_per_sensor() {
        let reader = HidTimestampReader::new();
        let frame = FrameObject::default();

        assert_eq!(reader.get_frame_counter(&gyro(), &frame), 1);
        assert_eq!(reader.get_frame_counter(&gyro(), &frame), 2);
        assert_eq!(reader.get_frame_counter(&accel(), &frame), 1);

        reader.reset();
        assert_eq!(reader.get_frame_counter(&gyro(), &frame), 1);
        assert_eq!(reader.get_frame_counter(&accel(), &frame), 1);
    }

    #[test]
    fn test_fallback_warns_once_until_reset() {
        let reader = HidTimestampReader::with_time_service(Arc::new(FixedClock(7.0)));
        let bare = FrameObject::default();
        assert!(!reader.has_metadata(&gyro(), &bare));

        let warnings = count_warnings(|| {
            for _ in 0..3 {
                reader.get_frame_timestamp(&gyro(), &bare);
            }
        });
        assert_eq!(warnings, 1);

        reader.reset();
        let warnings = count_warnings(|| {
            reader.get_frame_timestamp(&accel(), &bare);
        });
        assert_eq!(warnings, 1);
    }
}
