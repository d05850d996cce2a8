use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{lock, FrameTimestampReader, PinRouter, TimeService, TimestampDomain};
use crate::capture::{FrameObject, RequestMapping};

/// Host-clock reader for video endpoints without usable metadata.
///
/// Frame content is ignored; counters are kept locally per pin.
pub struct FreeRunningTimestampReader {
    counters: Mutex<[u64; PinRouter::PINS]>,
    time_service: Arc<dyn TimeService>,
    router: PinRouter,
}

impl FreeRunningTimestampReader {
    pub fn new(time_service: Arc<dyn TimeService>) -> Self {
        Self {
            counters: Mutex::new([0; PinRouter::PINS]),
            time_service,
            router: PinRouter::VIDEO,
        }
    }
}

impl FrameTimestampReader for FreeRunningTimestampReader {
    fn get_frame_timestamp(&self, _mode: &RequestMapping, _frame: &FrameObject) -> f64 {
        let _guard = lock(&self.counters);
        self.time_service.get_time()
    }

    fn get_frame_counter(&self, mode: &RequestMapping, _frame: &FrameObject) -> u64 {
        let mut counters = lock(&self.counters);
        let counter = &mut counters[self.router.pin(mode)];
        *counter += 1;
        *counter
    }

    fn get_frame_timestamp_domain(
        &self,
        _mode: &RequestMapping,
        _frame: &FrameObject,
    ) -> TimestampDomain {
        TimestampDomain::SystemTime
    }

    fn reset(&self) {
        debug!("Resetting free-running frame counters");
        *lock(&self.counters) = [0; PinRouter::PINS];
    }
}
