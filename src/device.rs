//! Static DS5 device data and per-endpoint reader selection.
//!
//! Everything here is immutable lookup data; components borrow it rather than
//! keeping their own copies.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::StreamType;
use crate::timestamp::{
    CustomHidTimestampReader, FrameTimestampReader, FreeRunningTimestampReader,
    HidTimestampReader, MetadataTimestampReader, TimeService,
};
use crate::{Error, Result};

pub const RS400P_PID: u16 = 0x0ad1;
pub const RS410A_PID: u16 = 0x0ad2;
pub const RS420R_PID: u16 = 0x0ad3;
pub const RS430C_PID: u16 = 0x0ad4;
pub const RS450T_PID: u16 = 0x0ad5;
pub const RS440P_PID: u16 = 0x0af6;

pub const DS5_PIDS: &[(u16, &str)] = &[
    (RS400P_PID, "RS400P"),
    (RS410A_PID, "RS410A"),
    (RS420R_PID, "RS420R"),
    (RS430C_PID, "RS430C"),
    (RS440P_PID, "RS440P"),
    (RS450T_PID, "RS450T"),
];

/// Number of sensor sub-devices behind a depth product id
pub fn subdevice_count(pid: u16) -> Result<u8> {
    match pid {
        RS400P_PID | RS410A_PID | RS430C_PID | RS440P_PID => Ok(1),
        RS420R_PID => Ok(2),
        RS450T_PID => Ok(3),
        _ => Err(Error::unsupported(format!(
            "subdevice count is not implemented for DS5 device of type {:#06x}",
            pid
        ))),
    }
}

pub fn product_name(pid: u16) -> Option<&'static str> {
    DS5_PIDS.iter().find(|(p, _)| *p == pid).map(|(_, name)| *name)
}

/// UVC extension unit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionUnit {
    pub subdevice: u8,
    pub unit: u8,
    pub node: u8,
    pub guid: [u8; 16],
}

/// Depth extension unit, GUID C9606CCB-594C-4D25-AF47-CCC496435995
pub const DEPTH_XU: ExtensionUnit = ExtensionUnit {
    subdevice: 0,
    unit: 3,
    node: 2,
    guid: [
        0xc9, 0x60, 0x6c, 0xcb, 0x59, 0x4c, 0x4d, 0x25, 0xaf, 0x47, 0xcc, 0xc4, 0x96, 0x43, 0x59,
        0x95,
    ],
};

/// Control selectors on [`DEPTH_XU`]
pub mod xu {
    pub const DEPTH_EMITTER_ENABLED: u8 = 2;
    pub const ASIC_AND_PROJECTOR_TEMPERATURES: u8 = 9;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionFormat {
    Raw,
    Xyz32f,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidProfile {
    pub sensor: &'static str,
    pub stream: StreamType,
    pub fps: u32,
    pub format: MotionFormat,
}

const fn hid(
    sensor: &'static str,
    stream: StreamType,
    fps: u32,
    format: MotionFormat,
) -> HidProfile {
    HidProfile {
        sensor,
        stream,
        fps,
        format,
    }
}

/// Sensor names and the profiles they stream. Bandwidths follow the BMI055.
pub const HID_PROFILES: &[HidProfile] = &[
    hid("gyro_3d", StreamType::Gyro, 200, MotionFormat::Raw),
    hid("gyro_3d", StreamType::Gyro, 400, MotionFormat::Raw),
    hid("gyro_3d", StreamType::Gyro, 1000, MotionFormat::Raw),
    hid("gyro_3d", StreamType::Gyro, 200, MotionFormat::Xyz32f),
    hid("gyro_3d", StreamType::Gyro, 400, MotionFormat::Xyz32f),
    hid("gyro_3d", StreamType::Gyro, 1000, MotionFormat::Xyz32f),
    hid("accel_3d", StreamType::Accel, 125, MotionFormat::Raw),
    hid("accel_3d", StreamType::Accel, 250, MotionFormat::Raw),
    hid("accel_3d", StreamType::Accel, 500, MotionFormat::Raw),
    hid("accel_3d", StreamType::Accel, 1000, MotionFormat::Raw),
    hid("accel_3d", StreamType::Accel, 125, MotionFormat::Xyz32f),
    hid("accel_3d", StreamType::Accel, 250, MotionFormat::Xyz32f),
    hid("accel_3d", StreamType::Accel, 500, MotionFormat::Xyz32f),
    hid("accel_3d", StreamType::Accel, 1000, MotionFormat::Xyz32f),
    hid("HID Sensor Class Device: Gyroscope", StreamType::Gyro, 1000, MotionFormat::Xyz32f),
    hid("HID Sensor Class Device: Accelerometer", StreamType::Accel, 1000, MotionFormat::Xyz32f),
    hid("HID Sensor Class Device: Custom", StreamType::Accel, 1000, MotionFormat::Xyz32f),
];

pub fn hid_profiles_for(sensor: &str) -> impl Iterator<Item = &'static HidProfile> + '_ {
    HID_PROFILES.iter().filter(move |p| p.sensor == sensor)
}

/// fps to the sensor's sampling-frequency register value
pub static SAMPLING_FREQUENCY: Lazy<BTreeMap<StreamType, BTreeMap<u32, u32>>> = Lazy::new(|| {
    BTreeMap::from([
        (
            StreamType::Accel,
            BTreeMap::from([(125, 1), (250, 4), (500, 5), (1000, 10)]),
        ),
        (
            StreamType::Gyro,
            BTreeMap::from([(200, 1), (400, 4), (1000, 10)]),
        ),
    ])
});

pub fn sampling_frequency(stream: StreamType, fps: u32) -> Result<u32> {
    SAMPLING_FREQUENCY
        .get(&stream)
        .and_then(|m| m.get(&fps))
        .copied()
        .ok_or_else(|| {
            Error::invalid_value(format!("no sampling frequency for {:?} at {} fps", stream, fps))
        })
}

/// Which timestamp reader an endpoint gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderKind {
    /// UVC metadata, host clock fallback
    UvcMetadata,
    /// Host clock only
    FreeRunning,
    /// IIO HID motion sensors
    IioHid,
    /// Custom HID reports with an embedded timestamp
    CustomHid,
}

impl ReaderKind {
    /// Custom reports carry their own clock, every other HID sensor goes through IIO
    pub fn for_hid_sensor(sensor: &str) -> Self {
        if sensor == "custom" || sensor.ends_with(": Custom") {
            Self::CustomHid
        } else {
            Self::IioHid
        }
    }

    pub fn create(self, time_service: Arc<dyn TimeService>) -> Box<dyn FrameTimestampReader> {
        debug!(kind = ?self, "Creating frame timestamp reader");
        match self {
            Self::UvcMetadata => Box::new(MetadataTimestampReader::new(Box::new(
                FreeRunningTimestampReader::new(time_service),
            ))),
            Self::FreeRunning => Box::new(FreeRunningTimestampReader::new(time_service)),
            Self::IioHid => Box::new(HidTimestampReader::with_time_service(time_service)),
            Self::CustomHid => Box::new(CustomHidTimestampReader::new()),
        }
    }
}
