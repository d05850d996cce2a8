pub mod capture;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod options;
pub mod timestamp;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::{FrameObject, RequestMapping};
pub use error::{Error, Result};
pub use options::{AutoExposureState, DeviceOption};
pub use timestamp::{FrameTimestampReader, TimestampDomain};

/// Global configuration that can be atomically swapped at runtime.
///
/// Library components never read it; they take their values at construction.
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub auto_exposure: AutoExposureState,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub product_id: u16,
    /// Kernel carries the UVC metadata patch, so video endpoints get the
    /// metadata reader instead of the host clock
    pub uvc_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// 0 runs until Ctrl-C
    pub frames_per_stream: u64,
    pub with_metadata: bool,
    /// HID frames stop carrying metadata after this many frames
    pub drop_hid_metadata_after: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                product_id: device::RS450T_PID,
                uvc_metadata: true,
            },
            auto_exposure: AutoExposureState::default(),
            replay: ReplayConfig {
                frames_per_stream: 30,
                with_metadata: true,
                drop_hid_metadata_after: None,
            },
            logging: LoggingConfig {
                filter: "ds5=debug".into(),
            },
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if given, then `DS5_*` environment
    /// variables (`DS5_DEVICE__UVC_METADATA=false`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("DS5")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_loader() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.device.product_id, device::RS450T_PID);
        assert!(config.device.uvc_metadata);
        assert_eq!(config.auto_exposure, AutoExposureState::default());
        assert_eq!(config.replay.drop_hid_metadata_after, None);
    }
}
