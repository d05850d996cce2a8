//! Frame timestamp readers.
//!
//! Every endpoint owns one reader that turns a delivered frame into a
//! `(timestamp, frame counter, domain)` triple. Which variant an endpoint gets
//! is decided once, when the endpoint is built (see [`crate::device::ReaderKind`]):
//!
//! - [`MetadataTimestampReader`]: UVC video, hardware clock from frame metadata,
//!   latched per pin, with a fallback reader when metadata never shows up.
//! - [`FreeRunningTimestampReader`]: host clock plus local frame counters.
//! - [`HidTimestampReader`]: IIO HID motion sensors, re-probed on every frame.
//! - [`CustomHidTimestampReader`]: custom HID reports carrying the hardware
//!   clock inside the payload.
//!
//! All readers serialize their calls on a per-instance mutex. Frame delivery
//! runs on transport threads, one per active stream, so independent readers
//! proceed in parallel while calls on the same reader are ordered.

pub mod custom_hid;
pub mod free_running;
pub mod from_metadata;
pub mod hid;
pub mod pin;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::capture::{FrameObject, RequestMapping};

pub use custom_hid::CustomHidTimestampReader;
pub use free_running::FreeRunningTimestampReader;
pub use from_metadata::MetadataTimestampReader;
pub use hid::HidTimestampReader;
pub use pin::PinRouter;

/// Clock a timestamp was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimestampDomain {
    /// Device clock, from frame metadata or the report payload
    HardwareClock,
    /// Host wall clock, used when the device gave us nothing better
    SystemTime,
}

/// Contract between a reader and the streaming pipeline
pub trait FrameTimestampReader: Send + Sync {
    /// Frame timestamp in milliseconds
    fn get_frame_timestamp(&self, mode: &RequestMapping, frame: &FrameObject) -> f64;

    fn get_frame_counter(&self, mode: &RequestMapping, frame: &FrameObject) -> u64;

    fn get_frame_timestamp_domain(
        &self,
        mode: &RequestMapping,
        frame: &FrameObject,
    ) -> TimestampDomain;

    /// Called whenever the stream restarts
    fn reset(&self);
}

/// Host time source, in milliseconds
pub trait TimeService: Send + Sync {
    fn get_time(&self) -> f64;
}

/// Wall clock since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeService;

impl TimeService for SystemTimeService {
    fn get_time(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or_default()
    }
}

/// Reader state is plain data, so a panic in another frame callback leaves
/// nothing half-updated worth refusing.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Runs `f` under a thread-local subscriber and returns how many WARN
    /// events it emitted
    pub(crate) fn count_warnings(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }
}
