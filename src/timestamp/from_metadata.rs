use std::sync::Mutex;

use tracing::{debug, warn};

use super::{lock, FrameTimestampReader, PinRouter, TimestampDomain};
use crate::capture::metadata;
use crate::capture::{FrameObject, RequestMapping};

/// What a pin has shown so far.
///
/// The first frame on a pin decides; the decision holds until `reset`. A
/// `Present` pin handed a frame without metadata decodes zeros (timestamp 0,
/// counter 0) and stays on the hardware clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PinMetadata {
    #[default]
    Unknown,
    Present,
    Absent,
}

#[derive(Debug, Default)]
struct State {
    pins: [PinMetadata; PinRouter::PINS],
    warned: bool,
}

/// Video reader taking the hardware clock from UVC frame metadata.
///
/// Pins whose first frame carries no metadata are served by the fallback
/// reader (normally a [`super::FreeRunningTimestampReader`]).
pub struct MetadataTimestampReader {
    state: Mutex<State>,
    fallback: Box<dyn FrameTimestampReader>,
    router: PinRouter,
}

impl MetadataTimestampReader {
    pub fn new(fallback: Box<dyn FrameTimestampReader>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            fallback,
            router: PinRouter::VIDEO,
        }
    }

    /// Latches the pin on first sight and returns the decision
    fn resolve(&self, state: &mut State, pin: usize, frame: &FrameObject) -> PinMetadata {
        if state.pins[pin] == PinMetadata::Unknown {
            let present = metadata::probe(frame.metadata());
            debug!(pin, present, "Latching UVC metadata presence");
            state.pins[pin] = if present {
                PinMetadata::Present
            } else {
                PinMetadata::Absent
            };
        }
        state.pins[pin]
    }
}

impl FrameTimestampReader for MetadataTimestampReader {
    fn get_frame_timestamp(&self, mode: &RequestMapping, frame: &FrameObject) -> f64 {
        let mut state = lock(&self.state);
        let pin = self.router.pin(mode);

        if self.resolve(&mut state, pin, frame) == PinMetadata::Present {
            return metadata::extract_timestamp(frame.metadata());
        }

        if !state.warned {
            warn!("UVC timestamp not found! please apply UVC metadata patch.");
            state.warned = true;
        }
        metrics::counter!("ds5_timestamp_fallback_total", "reader" => "uvc_metadata").increment(1);
        self.fallback.get_frame_timestamp(mode, frame)
    }

    fn get_frame_counter(&self, mode: &RequestMapping, frame: &FrameObject) -> u64 {
        let state = lock(&self.state);

        if state.pins[self.router.pin(mode)] == PinMetadata::Present {
            // sign-extended like the firmware's host library; negative counters wrap
            metadata::extract_frame_counter(frame.metadata()) as i64 as u64
        } else {
            self.fallback.get_frame_counter(mode, frame)
        }
    }

    fn get_frame_timestamp_domain(
        &self,
        mode: &RequestMapping,
        frame: &FrameObject,
    ) -> TimestampDomain {
        let state = lock(&self.state);

        if state.pins[self.router.pin(mode)] == PinMetadata::Present {
            TimestampDomain::HardwareClock
        } else {
            self.fallback.get_frame_timestamp_domain(mode, frame)
        }
    }

    fn reset(&self) {
        let mut state = lock(&self.state);
        debug!("Re-arming UVC metadata probe");
        *state = State::default();
        self.fallback.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capture::metadata::tests::record;
    use crate::capture::{fourcc, StreamType};
    use crate::timestamp::free_running::tests::FixedClock;
    use crate::timestamp::tests::count_warnings;
    use crate::timestamp::FreeRunningTimestampReader;

    fn reader() -> MetadataTimestampReader {
        MetadataTimestampReader::new(Box::new(FreeRunningTimestampReader::new(Arc::new(
            FixedClock(99.0),
        ))))
    }

    fn depth() -> RequestMapping {
        RequestMapping::new(fourcc::Z16, StreamType::Depth, 30)
    }

    fn ir() -> RequestMapping {
        RequestMapping::new(fourcc::Y8, StreamType::Infrared, 30)
    }

    #[test]
    fn test_hardware_timestamp_from_metadata() {
        let reader = reader();
        let frame = FrameObject::new(vec![0u8; 8]).with_metadata(record(12345, 17));

        let ts = reader.get_frame_timestamp(&depth(), &frame);
        assert!((ts - 12.345).abs() < 1e-9);
        assert_eq!(reader.get_frame_counter(&depth(), &frame), 17);
        assert_eq!(
            reader.get_frame_timestamp_domain(&depth(), &frame),
            TimestampDomain::HardwareClock
        );
    }

    #[test]
    fn test_latch_survives_frames_without_metadata() {
        let reader = reader();
        let with_md = FrameObject::default().with_metadata(record(500, 1));
        let without_md = FrameObject::default();

        reader.get_frame_timestamp(&depth(), &with_md);
        reader.get_frame_timestamp(&depth(), &without_md);
        assert_eq!(
            reader.get_frame_timestamp_domain(&depth(), &without_md),
            TimestampDomain::HardwareClock
        );
    }

    #[test]
    fn test_fallback_when_metadata_absent() {
        let reader = reader();
        let frame = FrameObject::default().with_metadata(vec![0u8; 20]);

        assert_eq!(reader.get_frame_timestamp(&ir(), &frame), 99.0);
        assert_eq!(reader.get_frame_counter(&ir(), &frame), 1);
        assert_eq!(reader.get_frame_counter(&ir(), &frame), 2);
        assert_eq!(
            reader.get_frame_timestamp_domain(&ir(), &frame),
            TimestampDomain::SystemTime
        );

        // the decision is sticky, a later frame with metadata stays on the fallback
        let later = FrameObject::default().with_metadata(record(1, 1));
        assert_eq!(reader.get_frame_timestamp(&ir(), &later), 99.0);
    }

    #[test]
    fn test_pins_are_independent() {
        let reader = reader();
        reader.get_frame_timestamp(&depth(), &FrameObject::default().with_metadata(record(1, 1)));
        reader.get_frame_timestamp(&ir(), &FrameObject::default());

        let frame = FrameObject::default();
        assert_eq!(
            reader.get_frame_timestamp_domain(&depth(), &frame),
            TimestampDomain::HardwareClock
        );
        assert_eq!(
            reader.get_frame_timestamp_domain(&ir(), &frame),
            TimestampDomain::SystemTime
        );
    }

    #[test]
    fn test_reset_rearms_probe_and_counters() {
        let reader = reader();
        let empty = FrameObject::default();
        reader.get_frame_timestamp(&depth(), &empty);
        reader.get_frame_counter(&depth(), &empty);
        reader.get_frame_counter(&depth(), &empty);

        reader.reset();
        assert_eq!(reader.get_frame_counter(&depth(), &empty), 1);

        let with_md = FrameObject::default().with_metadata(record(2000, 5));
        assert!((reader.get_frame_timestamp(&depth(), &with_md) - 2.0).abs() < 1e-9);
        assert_eq!(
            reader.get_frame_timestamp_domain(&depth(), &with_md),
            TimestampDomain::HardwareClock
        );
    }

    #[test]
    fn test_present_pin_decodes_zeros_without_metadata() {
        let reader = reader();
        reader.get_frame_timestamp(&depth(), &FrameObject::default().with_metadata(record(7, 7)));

        let bare = FrameObject::default();
        assert_eq!(reader.get_frame_timestamp(&depth(), &bare), 0.0);
        assert_eq!(reader.get_frame_counter(&depth(), &bare), 0);
        assert_eq!(
            reader.get_frame_timestamp_domain(&depth(), &bare),
            TimestampDomain::HardwareClock
        );
    }

    #[test]
    fn test_fallback_warns_once_until_reset() {
        let reader = reader();
        let bare = FrameObject::default();

        let warnings = count_warnings(|| {
            for _ in 0..3 {
                reader.get_frame_timestamp(&ir(), &bare);
            }
            // the other pin falling back shares the same advisory
            reader.get_frame_timestamp(&depth(), &bare);
        });
        assert_eq!(warnings, 1);

        reader.reset();
        let warnings = count_warnings(|| {
            reader.get_frame_timestamp(&ir(), &bare);
        });
        assert_eq!(warnings, 1);
    }
}
