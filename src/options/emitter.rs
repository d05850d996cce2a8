use std::sync::Arc;

use tracing::info;

use super::{DeviceOption, OptionRange};
use crate::device::{xu, ExtensionUnit, DEPTH_XU};
use crate::endpoint::UvcEndpoint;
use crate::{Error, Result};

/// Projector power: 0 off, 1 on, 2 auto
pub struct EmitterOption {
    endpoint: Arc<dyn UvcEndpoint>,
    xu: ExtensionUnit,
    control: u8,
}

impl EmitterOption {
    pub fn new(endpoint: Arc<dyn UvcEndpoint>) -> Self {
        Self {
            endpoint,
            xu: DEPTH_XU,
            control: xu::DEPTH_EMITTER_ENABLED,
        }
    }
}

impl DeviceOption for EmitterOption {
    fn set(&self, value: f32) -> Result<()> {
        if !(0.0..=f32::from(u8::MAX)).contains(&value) {
            return Err(Error::invalid_value(format!(
                "emitter value {} does not fit the control",
                value
            )));
        }
        info!(value, "Setting emitter");
        self.endpoint.set_xu(&self.xu, self.control, &[value as u8])
    }

    fn query(&self) -> Result<f32> {
        let mut buf = [0u8; 1];
        self.endpoint.get_xu(&self.xu, self.control, &mut buf)?;
        Ok(f32::from(buf[0]))
    }

    fn get_range(&self) -> Result<OptionRange> {
        self.endpoint
            .get_xu_range(&self.xu, self.control, std::mem::size_of::<u8>())
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Power of the DS5 projector, 0 meaning projector off, 1 meaning projector on, 2 meaning projector in auto mode"
    }

    fn value_description(&self, value: f32) -> Result<Option<&'static str>> {
        match value as i32 {
            0 => Ok(Some("Off")),
            1 => Ok(Some("On")),
            2 => Ok(Some("Auto")),
            _ => Err(Error::invalid_value("value not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::tests::MockUvc;

    #[test]
    fn test_value_descriptions() {
        let opt = EmitterOption::new(Arc::new(MockUvc::default()));
        assert_eq!(opt.value_description(0.0).unwrap(), Some("Off"));
        assert_eq!(opt.value_description(1.0).unwrap(), Some("On"));
        assert_eq!(opt.value_description(2.0).unwrap(), Some("Auto"));
        assert!(matches!(
            opt.value_description(3.0),
            Err(Error::InvalidValue(_))
        ));
        assert!(opt.value_description(-1.0).is_err());
    }

    #[test]
    fn test_set_and_query_through_extension_unit() {
        let uvc = Arc::new(MockUvc::default());
        let opt = EmitterOption::new(uvc.clone());

        opt.set(2.0).unwrap();
        assert_eq!(uvc.control(xu::DEPTH_EMITTER_ENABLED), Some(vec![2]));
        assert_eq!(opt.query().unwrap(), 2.0);
        assert_eq!(opt.get_range().unwrap().max, 2.0);
        assert!(opt.set(-1.0).is_err());
    }

    #[test]
    fn test_query_propagates_backend_failure() {
        let opt = EmitterOption::new(Arc::new(MockUvc::default()));
        assert!(matches!(opt.query(), Err(Error::Backend(_))));
    }
}
