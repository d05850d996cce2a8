//! Vendor runtime options exposed to the control surface.

pub mod auto_exposure;
pub mod emitter;
pub mod temperature;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use auto_exposure::{
    AutoExposureAntiflickerRateOption, AutoExposureMechanism, AutoExposureMode,
    AutoExposureModeOption, AutoExposureState, EnableAutoExposureOption, SharedAutoExposureState,
};
pub use emitter::EmitterOption;
pub use temperature::{
    AsicAndProjectorTemperatureOption, MotionModuleTemperatureOption, TemperatureSensor,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub def: f32,
}

impl OptionRange {
    pub const fn new(min: f32, max: f32, step: f32, def: f32) -> Self {
        Self {
            min,
            max,
            step,
            def,
        }
    }
}

/// Uniform settable/queryable view of one piece of device state
pub trait DeviceOption: Send + Sync {
    fn set(&self, value: f32) -> Result<()>;

    fn query(&self) -> Result<f32>;

    fn get_range(&self) -> Result<OptionRange>;

    fn is_enabled(&self) -> bool;

    fn is_read_only(&self) -> bool {
        false
    }

    fn description(&self) -> &str;

    /// Label for an enumerated value; `None` for plain numeric options
    fn value_description(&self, _value: f32) -> Result<Option<&'static str>> {
        Ok(None)
    }
}

/// `set` for options the hardware only reports
pub(crate) fn read_only(name: &str) -> Result<()> {
    Err(Error::unsupported(format!("{} is read-only!", name)))
}
