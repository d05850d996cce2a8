use std::sync::Arc;

use tracing::trace;

use super::{read_only, DeviceOption, OptionRange};
use crate::device::{xu, DEPTH_XU};
use crate::endpoint::{CustomReportField, HidEndpoint, UvcEndpoint};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSensor {
    Asic,
    Projector,
}

impl TemperatureSensor {
    fn name(&self) -> &'static str {
        match self {
            Self::Asic => "ASIC temperature",
            Self::Projector => "projector temperature",
        }
    }
}

/// `[projector_valid u8][asic_valid u8][projector i8][asic i8]`
#[derive(Debug, Clone, Copy, Default)]
struct TemperatureReport {
    projector_valid: bool,
    asic_valid: bool,
    projector: i8,
    asic: i8,
}

impl TemperatureReport {
    const SIZE: usize = 4;

    fn parse(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            projector_valid: buf[0] != 0,
            asic_valid: buf[1] != 0,
            projector: buf[2] as i8,
            asic: buf[3] as i8,
        }
    }

    fn reading(&self, sensor: TemperatureSensor) -> Option<i8> {
        match sensor {
            TemperatureSensor::Asic => self.asic_valid.then_some(self.asic),
            TemperatureSensor::Projector => self.projector_valid.then_some(self.projector),
        }
    }
}

/// ASIC or projector temperature, read from the depth extension unit
pub struct AsicAndProjectorTemperatureOption {
    endpoint: Arc<dyn UvcEndpoint>,
    sensor: TemperatureSensor,
}

impl AsicAndProjectorTemperatureOption {
    pub fn new(endpoint: Arc<dyn UvcEndpoint>, sensor: TemperatureSensor) -> Self {
        Self { endpoint, sensor }
    }
}

impl DeviceOption for AsicAndProjectorTemperatureOption {
    fn set(&self, _value: f32) -> Result<()> {
        read_only(self.sensor.name())
    }

    fn query(&self) -> Result<f32> {
        if !self.is_enabled() {
            return Err(Error::wrong_sequence(
                "query option is allow only in streaming!",
            ));
        }

        let mut buf = [0u8; TemperatureReport::SIZE];
        self.endpoint
            .get_xu(&DEPTH_XU, xu::ASIC_AND_PROJECTOR_TEMPERATURES, &mut buf)?;
        let report = TemperatureReport::parse(&buf);
        trace!(?report, "Temperature report");

        report
            .reading(self.sensor)
            .map(f32::from)
            .ok_or_else(|| {
                Error::invalid_value(format!("{} value is not valid!", self.sensor.name()))
            })
    }

    fn get_range(&self) -> Result<OptionRange> {
        Ok(OptionRange::new(-40.0, 125.0, 0.0, 0.0))
    }

    fn is_enabled(&self) -> bool {
        self.endpoint.is_streaming()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        match self.sensor {
            TemperatureSensor::Asic => "Current Asic Temperature",
            TemperatureSensor::Projector => "Current Projector Temperature",
        }
    }
}

const CUSTOM_SENSOR: &str = "custom";
const CUSTOM_REPORT: &str = "data-field-custom-usage";

/// Motion-module temperature, reported as text by the custom HID sensor
pub struct MotionModuleTemperatureOption {
    endpoint: Arc<dyn HidEndpoint>,
}

impl MotionModuleTemperatureOption {
    pub fn new(endpoint: Arc<dyn HidEndpoint>) -> Self {
        Self { endpoint }
    }

    fn read_field(&self, field: CustomReportField) -> Result<f32> {
        let data = self
            .endpoint
            .get_custom_report_data(CUSTOM_SENSOR, CUSTOM_REPORT, field)?;
        if data.is_empty() {
            return Err(Error::invalid_value(format!(
                "motion module temperature {:?} failed! Empty buffer arrived.",
                field
            )));
        }
        parse_report_float(&data)
    }
}

/// NUL-terminated ASCII float, as the IIO report delivers it
fn parse_report_float(data: &[u8]) -> Result<f32> {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let text = std::str::from_utf8(&data[..end])
        .map_err(|e| Error::invalid_value(format!("report is not text: {}", e)))?;
    text.trim()
        .parse()
        .map_err(|_| Error::invalid_value(format!("report value {:?} is not a number", text)))
}

impl DeviceOption for MotionModuleTemperatureOption {
    fn set(&self, _value: f32) -> Result<()> {
        read_only("motion module temperature")
    }

    fn query(&self) -> Result<f32> {
        if !self.is_enabled() {
            return Err(Error::wrong_sequence(
                "query option is allow only in streaming!",
            ));
        }
        self.read_field(CustomReportField::Value)
    }

    fn get_range(&self) -> Result<OptionRange> {
        if !self.is_enabled() {
            return Err(Error::wrong_sequence(
                "get option range is allow only in streaming!",
            ));
        }
        let min = self.read_field(CustomReportField::Minimum)?;
        let max = self.read_field(CustomReportField::Maximum)?;
        Ok(OptionRange::new(min, max, 0.0, 0.0))
    }

    fn is_enabled(&self) -> bool {
        self.endpoint.is_streaming()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Current Motion-Module Temperature"
    }
}
