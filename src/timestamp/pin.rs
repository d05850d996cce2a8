use crate::capture::{fourcc, FourCC, RequestMapping};

/// Routes a request to a per-reader pin slot.
///
/// One distinguished format goes to pin 1, everything else to pin 0, so the
/// index always fits a two-slot state array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRouter {
    distinguished: FourCC,
}

impl PinRouter {
    pub const PINS: usize = 2;

    /// Depth (Z16) on pin 1, infrared/other video on pin 0
    pub const VIDEO: Self = Self::new(fourcc::Z16);

    /// Gyro on pin 1, accel and the rest on pin 0
    pub const MOTION: Self = Self::new(fourcc::GYRO);

    pub const fn new(distinguished: FourCC) -> Self {
        Self { distinguished }
    }

    pub fn pin(&self, mode: &RequestMapping) -> usize {
        if mode.format == self.distinguished {
            1
        } else {
            0
        }
    }
}
