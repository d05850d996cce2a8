//! DS5 timestamp replay
//!
//! Feeds synthetic frames for every DS5 endpoint through the timestamp readers
//! from concurrent tasks and logs the resulting (timestamp, counter, domain).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use color_eyre::{eyre::eyre, Result};
use flume::{bounded, Sender};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ds5::capture::metadata;
use ds5::capture::{fourcc, FrameObject, RequestMapping, StreamType};
use ds5::device::{self, ExtensionUnit, ReaderKind};
use ds5::endpoint::{BeforeFrameCallback, UvcEndpoint};
use ds5::options::{
    AsicAndProjectorTemperatureOption, AutoExposureAntiflickerRateOption, AutoExposureMechanism,
    AutoExposureModeOption, AutoExposureState, DeviceOption, EmitterOption,
    EnableAutoExposureOption, OptionRange, SharedAutoExposureState, TemperatureSensor,
};
use ds5::timestamp::{custom_hid, SystemTimeService, TimeService};
use ds5::{Config, FrameTimestampReader};

/// Stand-in for a UVC endpoint: XU controls in memory, hooks run on delivery
#[derive(Default)]
struct ReplayEndpoint {
    streaming: AtomicBool,
    controls: Mutex<HashMap<u8, Vec<u8>>>,
    callbacks: Mutex<Vec<BeforeFrameCallback>>,
}

impl ReplayEndpoint {
    fn deliver(&self, stream: StreamType, frame: &FrameObject) {
        if let Ok(callbacks) = self.callbacks.lock() {
            for cb in callbacks.iter() {
                cb(stream, frame);
            }
        }
    }
}

impl UvcEndpoint for ReplayEndpoint {
    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    fn get_xu(&self, _xu: &ExtensionUnit, control: u8, data: &mut [u8]) -> ds5::Result<()> {
        let controls = self
            .controls
            .lock()
            .map_err(|_| ds5::Error::Backend("control table poisoned".into()))?;
        let stored = controls
            .get(&control)
            .ok_or_else(|| ds5::Error::Backend(format!("get_xu({}) failed!", control)))?;
        let n = stored.len().min(data.len());
        data[..n].copy_from_slice(&stored[..n]);
        Ok(())
    }

    fn set_xu(&self, _xu: &ExtensionUnit, control: u8, data: &[u8]) -> ds5::Result<()> {
        self.controls
            .lock()
            .map_err(|_| ds5::Error::Backend("control table poisoned".into()))?
            .insert(control, data.to_vec());
        Ok(())
    }

    fn get_xu_range(
        &self,
        _xu: &ExtensionUnit,
        _control: u8,
        _len: usize,
    ) -> ds5::Result<OptionRange> {
        Ok(OptionRange::new(0.0, 2.0, 1.0, 1.0))
    }

    fn register_on_before_frame_callback(&self, callback: BeforeFrameCallback) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }
}

/// Hands fisheye frames to a worker over a bounded channel, dropping when busy
struct ChannelAutoExposure {
    tx: Sender<FrameObject>,
}

impl AutoExposureMechanism for ChannelAutoExposure {
    fn add_frame(&self, frame: FrameObject) {
        if self.tx.try_send(frame).is_err() {
            debug!("Auto-exposure busy, frame dropped");
        }
    }

    fn update_auto_exposure_state(&self, state: &AutoExposureState) {
        info!(?state, "Auto-exposure state updated");
    }
}

struct Stream {
    mode: RequestMapping,
    reader: Arc<dyn FrameTimestampReader>,
}

/// Builds the frame the transport would deliver for `seq` on `stream`.
///
/// The device clock is `elapsed` in microseconds; the 32-bit UVC field wraps
/// like the real one does.
fn synth_frame(
    config: &Config,
    mode: &RequestMapping,
    seq: u64,
    elapsed: Duration,
) -> FrameObject {
    let ticks = elapsed.as_micros() as u64;

    match mode.stream {
        StreamType::Depth | StreamType::Infrared | StreamType::Fisheye => {
            let frame = FrameObject::new(vec![(seq % 255) as u8; 64]);
            if config.replay.with_metadata {
                let md = metadata::capture_record(ticks as u32, seq as i32);
                frame.with_metadata(md.encode().to_vec())
            } else {
                frame
            }
        }
        StreamType::Gyro | StreamType::Accel => {
            let frame = FrameObject::new(vec![0u8; 12]);
            let dropped = config
                .replay
                .drop_hid_metadata_after
                .is_some_and(|after| seq > after);
            if config.replay.with_metadata && !dropped {
                frame.with_metadata(ticks.to_le_bytes().to_vec())
            } else {
                frame
            }
        }
        StreamType::Gpio => {
            let mut report = vec![0u8; custom_hid::TIMESTAMP_OFFSET + 8];
            report[custom_hid::TIMESTAMP_OFFSET..].copy_from_slice(&ticks.to_le_bytes());
            FrameObject::new(report)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("DS5 replay launching...");
    ds5::CONFIG.store(Arc::new(config.clone()));

    let pid = config.device.product_id;
    let product = device::product_name(pid).ok_or_else(|| eyre!("Unknown DS5 pid {:#06x}", pid))?;
    let subdevices = device::subdevice_count(pid)?;
    info!(product, subdevices, "Using device");

    let time: Arc<dyn TimeService> = Arc::new(SystemTimeService);
    let video_kind = if config.device.uvc_metadata {
        ReaderKind::UvcMetadata
    } else {
        ReaderKind::FreeRunning
    };

    // one reader per endpoint: depth+IR share the depth endpoint
    let depth_reader: Arc<dyn FrameTimestampReader> = Arc::from(video_kind.create(time.clone()));
    let fisheye_reader: Arc<dyn FrameTimestampReader> = Arc::from(video_kind.create(time.clone()));
    let motion_reader: Arc<dyn FrameTimestampReader> =
        Arc::from(ReaderKind::for_hid_sensor("gyro_3d").create(time.clone()));
    let custom_reader: Arc<dyn FrameTimestampReader> =
        Arc::from(ReaderKind::for_hid_sensor("custom").create(time.clone()));

    let gyro_fps = device::hid_profiles_for("gyro_3d")
        .map(|p| p.fps)
        .min()
        .unwrap_or(200);
    let accel_fps = device::hid_profiles_for("accel_3d")
        .map(|p| p.fps)
        .min()
        .unwrap_or(125);
    info!(
        gyro = device::sampling_frequency(StreamType::Gyro, gyro_fps)?,
        accel = device::sampling_frequency(StreamType::Accel, accel_fps)?,
        "Motion sampling frequencies"
    );

    let streams = vec![
        Stream {
            mode: RequestMapping::new(fourcc::Z16, StreamType::Depth, 30),
            reader: depth_reader.clone(),
        },
        Stream {
            mode: RequestMapping::new(fourcc::Y8, StreamType::Infrared, 30),
            reader: depth_reader.clone(),
        },
        Stream {
            mode: RequestMapping::new(fourcc::RAW8, StreamType::Fisheye, 30),
            reader: fisheye_reader.clone(),
        },
        Stream {
            mode: RequestMapping::new(fourcc::GYRO, StreamType::Gyro, gyro_fps),
            reader: motion_reader.clone(),
        },
        Stream {
            mode: RequestMapping::new(fourcc::ACCEL, StreamType::Accel, accel_fps),
            reader: motion_reader.clone(),
        },
        Stream {
            mode: RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 10),
            reader: custom_reader.clone(),
        },
    ];

    // Endpoints and options
    let depth_ep = Arc::new(ReplayEndpoint::default());
    depth_ep.set_xu(
        &device::DEPTH_XU,
        device::xu::ASIC_AND_PROJECTOR_TEMPERATURES,
        &[1, 1, 31, 42],
    )?;
    let fisheye_ep = Arc::new(ReplayEndpoint::default());

    let (ae_tx, ae_rx) = bounded::<FrameObject>(4);
    let mechanism: Arc<dyn AutoExposureMechanism> = Arc::new(ChannelAutoExposure { tx: ae_tx });
    let ae_state = SharedAutoExposureState::new(config.auto_exposure);

    let ae_enable =
        EnableAutoExposureOption::new(&*fisheye_ep, mechanism.clone(), ae_state.clone());
    let ae_mode = AutoExposureModeOption::new(mechanism.clone(), ae_state.clone());
    let ae_rate = AutoExposureAntiflickerRateOption::new(mechanism.clone(), ae_state.clone());
    let emitter = EmitterOption::new(depth_ep.clone());
    let asic = AsicAndProjectorTemperatureOption::new(depth_ep.clone(), TemperatureSensor::Asic);
    let projector =
        AsicAndProjectorTemperatureOption::new(depth_ep.clone(), TemperatureSensor::Projector);

    if let Err(e) = asic.query() {
        info!("Before streaming: {}", e);
    }

    emitter.set(2.0)?;
    ae_mode.set(ae_state.get().mode as i32 as f32)?;
    ae_rate.set(ae_state.get().antiflicker_rate as f32)?;
    ae_enable.set(if ae_state.get().enabled { 1.0 } else { 0.0 })?;

    // Auto-exposure worker
    let _ae_handle = tokio::spawn(async move {
        while let Ok(frame) = ae_rx.recv_async().await {
            let mean = frame.pixels.iter().map(|&p| p as u64).sum::<u64>() as f64
                / frame.pixels.len().max(1) as f64;
            debug!(mean, "Auto-exposure frame");
        }
    });

    depth_ep.streaming.store(true, Ordering::Release);
    fisheye_ep.streaming.store(true, Ordering::Release);

    let replay_start = Instant::now();
    let mut handles = Vec::new();
    for stream in streams {
        let config = ds5::CONFIG.load_full();
        let fisheye_ep = fisheye_ep.clone();

        handles.push(tokio::spawn(async move {
            let period = Duration::from_secs_f64(1.0 / stream.mode.fps.max(1) as f64);
            let mut interval = tokio::time::interval(period);

            for seq in 1u64.. {
                interval.tick().await;

                let frame = synth_frame(&config, &stream.mode, seq, replay_start.elapsed());
                if stream.mode.stream == StreamType::Fisheye {
                    fisheye_ep.deliver(stream.mode.stream, &frame);
                }

                let ts = stream.reader.get_frame_timestamp(&stream.mode, &frame);
                let counter = stream.reader.get_frame_counter(&stream.mode, &frame);
                let domain = stream.reader.get_frame_timestamp_domain(&stream.mode, &frame);
                debug!(
                    stream = ?stream.mode.stream,
                    format = %stream.mode.format,
                    ts,
                    counter,
                    ?domain,
                    "Frame"
                );

                if config.replay.frames_per_stream > 0 && seq >= config.replay.frames_per_stream {
                    break;
                }
            }
        }));
    }

    let all_done = async {
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Stream task failed: {}", e);
            }
        }
    };

    tokio::select! {
        _ = all_done => info!("All streams finished"),
        _ = tokio::signal::ctrl_c() => warn!("Interrupted"),
    }

    for option in [&asic as &dyn DeviceOption, &projector] {
        match option.query() {
            Ok(value) => info!("{}: {}", option.description(), value),
            Err(e) => warn!("{}: {}", option.description(), e),
        }
    }
    info!(
        "{}: {:?}",
        emitter.description(),
        emitter.value_description(emitter.query()?)?
    );

    depth_ep.streaming.store(false, Ordering::Release);
    fisheye_ep.streaming.store(false, Ordering::Release);
    for reader in [&depth_reader, &fisheye_reader, &motion_reader, &custom_reader] {
        reader.reset();
    }

    info!("DS5 replay shutting down");
    Ok(())
}
