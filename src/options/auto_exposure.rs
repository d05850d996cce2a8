//! Software auto-exposure knobs.
//!
//! The three options share one [`AutoExposureState`] with the auto-exposure
//! mechanism. Mode and anti-flicker changes are pushed to the mechanism right
//! away; the enable switch instead gates which fisheye frames reach it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DeviceOption, OptionRange};
use crate::capture::{FrameObject, StreamType};
use crate::endpoint::UvcEndpoint;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoExposureMode {
    Static = 0,
    AntiFlicker = 1,
    Hybrid = 2,
}

impl AutoExposureMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::AntiFlicker => "Anti-Flicker",
            Self::Hybrid => "Hybrid",
        }
    }
}

impl TryFrom<i32> for AutoExposureMode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Static),
            1 => Ok(Self::AntiFlicker),
            2 => Ok(Self::Hybrid),
            _ => Err(Error::invalid_value("value not found")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoExposureState {
    pub enabled: bool,
    pub mode: AutoExposureMode,
    /// Mains frequency in Hz
    pub antiflicker_rate: u32,
}

impl Default for AutoExposureState {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AutoExposureMode::Hybrid,
            antiflicker_rate: 60,
        }
    }
}

/// Auto-exposure state shared between the options and the mechanism.
///
/// Readers get a snapshot without locking; writers publish a whole new state.
#[derive(Debug, Clone, Default)]
pub struct SharedAutoExposureState(Arc<ArcSwap<AutoExposureState>>);

impl SharedAutoExposureState {
    pub fn new(state: AutoExposureState) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(state)))
    }

    pub fn get(&self) -> AutoExposureState {
        **self.0.load()
    }

    /// Applies `f` and returns the state before and after
    pub fn update(
        &self,
        f: impl Fn(&mut AutoExposureState),
    ) -> (AutoExposureState, AutoExposureState) {
        let prev = *self.0.rcu(|current| {
            let mut next = **current;
            f(&mut next);
            next
        });
        let mut next = prev;
        f(&mut next);
        (prev, next)
    }
}

/// Computes exposure from forwarded frames
pub trait AutoExposureMechanism: Send + Sync {
    /// Receives a clone of a fisheye frame; the original continues down the pipeline
    fn add_frame(&self, frame: FrameObject);

    fn update_auto_exposure_state(&self, state: &AutoExposureState);
}

pub struct EnableAutoExposureOption {
    state: SharedAutoExposureState,
    to_add_frames: Arc<AtomicBool>,
}

impl EnableAutoExposureOption {
    /// Hooks frame forwarding into the fisheye endpoint
    pub fn new(
        fisheye: &dyn UvcEndpoint,
        mechanism: Arc<dyn AutoExposureMechanism>,
        state: SharedAutoExposureState,
    ) -> Self {
        let to_add_frames = Arc::new(AtomicBool::new(state.get().enabled));

        let forwarding = to_add_frames.clone();
        fisheye.register_on_before_frame_callback(Box::new(
            move |stream: StreamType, frame: &FrameObject| {
                if !forwarding.load(Ordering::Acquire) || stream != StreamType::Fisheye {
                    return;
                }
                metrics::counter!("ds5_auto_exposure_frames_total").increment(1);
                mechanism.add_frame(frame.clone());
            },
        ));

        Self {
            state,
            to_add_frames,
        }
    }
}

impl DeviceOption for EnableAutoExposureOption {
    fn set(&self, value: f32) -> Result<()> {
        if value < 0.0 {
            return Err(Error::invalid_value(format!(
                "Invalid Auto-Exposure mode request {}",
                value
            )));
        }

        let (prev, next) = self.state.update(|s| s.enabled = value.abs() > 0.0);
        if next.enabled != prev.enabled {
            info!(enabled = next.enabled, "Auto-exposure toggled");
            self.to_add_frames.store(next.enabled, Ordering::Release);
        }
        Ok(())
    }

    fn query(&self) -> Result<f32> {
        Ok(if self.state.get().enabled { 1.0 } else { 0.0 })
    }

    fn get_range(&self) -> Result<OptionRange> {
        Ok(OptionRange::new(0.0, 1.0, 1.0, 1.0))
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Enable/disable auto-exposure"
    }
}

pub struct AutoExposureModeOption {
    mechanism: Arc<dyn AutoExposureMechanism>,
    state: SharedAutoExposureState,
}

impl AutoExposureModeOption {
    pub fn new(mechanism: Arc<dyn AutoExposureMechanism>, state: SharedAutoExposureState) -> Self {
        Self { mechanism, state }
    }
}

impl DeviceOption for AutoExposureModeOption {
    fn set(&self, value: f32) -> Result<()> {
        let mode = AutoExposureMode::try_from(value as i32)?;
        let (_, next) = self.state.update(|s| s.mode = mode);
        info!(mode = mode.label(), "Auto-exposure mode changed");
        self.mechanism.update_auto_exposure_state(&next);
        Ok(())
    }

    fn query(&self) -> Result<f32> {
        Ok(self.state.get().mode as i32 as f32)
    }

    fn get_range(&self) -> Result<OptionRange> {
        Ok(OptionRange::new(0.0, 2.0, 1.0, 0.0))
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Auto-Exposure mode"
    }

    fn value_description(&self, value: f32) -> Result<Option<&'static str>> {
        AutoExposureMode::try_from(value as i32).map(|m| Some(m.label()))
    }
}

pub struct AutoExposureAntiflickerRateOption {
    mechanism: Arc<dyn AutoExposureMechanism>,
    state: SharedAutoExposureState,
}

impl AutoExposureAntiflickerRateOption {
    pub fn new(mechanism: Arc<dyn AutoExposureMechanism>, state: SharedAutoExposureState) -> Self {
        Self { mechanism, state }
    }
}

impl DeviceOption for AutoExposureAntiflickerRateOption {
    fn set(&self, value: f32) -> Result<()> {
        let rate = value as u32;
        let (_, next) = self.state.update(|s| s.antiflicker_rate = rate);
        info!(rate, "Auto-exposure anti-flicker rate changed");
        self.mechanism.update_auto_exposure_state(&next);
        Ok(())
    }

    fn query(&self) -> Result<f32> {
        Ok(self.state.get().antiflicker_rate as f32)
    }

    fn get_range(&self) -> Result<OptionRange> {
        Ok(OptionRange::new(50.0, 60.0, 10.0, 60.0))
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Auto-Exposure anti-flicker"
    }

    fn value_description(&self, value: f32) -> Result<Option<&'static str>> {
        match value as i32 {
            50 => Ok(Some("50Hz")),
            60 => Ok(Some("60Hz")),
            _ => Err(Error::invalid_value(
                "antiflicker_rate: value_description(...) failed. value not found!",
            )),
        }
    }
}
