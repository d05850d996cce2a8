//! Capabilities the DS5 layer consumes from the transport backend.
//!
//! Enumeration, power management and raw endpoint I/O live behind these
//! traits; this crate only issues extension-unit and report requests and hooks
//! into frame delivery.

use crate::capture::{FrameObject, StreamType};
use crate::device::ExtensionUnit;
use crate::options::OptionRange;
use crate::Result;

/// Invoked by a UVC endpoint before a frame enters the pipeline
pub type BeforeFrameCallback = Box<dyn Fn(StreamType, &FrameObject) + Send + Sync>;

/// A UVC video endpoint
pub trait UvcEndpoint: Send + Sync {
    fn is_streaming(&self) -> bool;

    /// Reads an extension-unit control into `data`
    fn get_xu(&self, xu: &ExtensionUnit, control: u8, data: &mut [u8]) -> Result<()>;

    fn set_xu(&self, xu: &ExtensionUnit, control: u8, data: &[u8]) -> Result<()>;

    /// Min/max/step/default the device reports for a control
    fn get_xu_range(&self, xu: &ExtensionUnit, control: u8, len: usize) -> Result<OptionRange>;

    fn register_on_before_frame_callback(&self, callback: BeforeFrameCallback);
}

/// Fields of a custom HID sensor report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomReportField {
    Minimum,
    Maximum,
    Name,
    Size,
    UnitExpo,
    Units,
    Value,
}

/// An IIO/HID sensor endpoint
pub trait HidEndpoint: Send + Sync {
    fn is_streaming(&self) -> bool;

    /// Raw bytes of one field of a custom sensor report. Empty when the
    /// device returned nothing.
    fn get_custom_report_data(
        &self,
        sensor: &str,
        report: &str,
        field: CustomReportField,
    ) -> Result<Vec<u8>>;
}
