use std::sync::Arc;
use std::thread;

use ds5::capture::metadata::capture_record;
use ds5::capture::{fourcc, FrameObject, RequestMapping, StreamType};
use ds5::device::ReaderKind;
use ds5::timestamp::{SystemTimeService, TimeService};
use ds5::{FrameTimestampReader, TimestampDomain};

const FRAMES: u64 = 500;

fn time() -> Arc<dyn TimeService> {
    Arc::new(SystemTimeService)
}

/// Each delivery thread must see its own pin counting 1, 2, 3, ... even with
/// another pin hammering the same reader.
#[test]
fn per_pin_counters_stay_monotonic_across_threads() {
    for kind in [ReaderKind::FreeRunning, ReaderKind::IioHid] {
        let reader: Arc<dyn FrameTimestampReader> = Arc::from(kind.create(time()));
        let modes = match kind {
            ReaderKind::IioHid => [
                RequestMapping::new(fourcc::GYRO, StreamType::Gyro, 200),
                RequestMapping::new(fourcc::ACCEL, StreamType::Accel, 250),
            ],
            _ => [
                RequestMapping::new(fourcc::Z16, StreamType::Depth, 30),
                RequestMapping::new(fourcc::Y8, StreamType::Infrared, 30),
            ],
        };

        let handles: Vec<_> = modes
            .into_iter()
            .map(|mode| {
                let reader = reader.clone();
                thread::spawn(move || {
                    let frame = FrameObject::default();
                    (1..=FRAMES)
                        .map(|_| reader.get_frame_counter(&mode, &frame))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            let seq = handle.join().expect("delivery thread");
            assert_eq!(seq, (1..=FRAMES).collect::<Vec<_>>(), "{:?}", kind);
        }
    }
}

#[test]
fn custom_hid_counter_shared_across_threads() {
    let reader: Arc<dyn FrameTimestampReader> = Arc::from(ReaderKind::CustomHid.create(time()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reader = reader.clone();
            thread::spawn(move || {
                let mode = RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 1);
                let frame = FrameObject::default();
                let mut last = 0;
                for _ in 0..FRAMES {
                    let counter = reader.get_frame_counter(&mode, &frame);
                    assert!(counter > last);
                    last = counter;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("delivery thread");
    }

    let mode = RequestMapping::new(fourcc::CUSTOM, StreamType::Gpio, 1);
    assert_eq!(
        reader.get_frame_counter(&mode, &FrameObject::default()),
        4 * FRAMES + 1
    );
}

/// Depth carries metadata, infrared does not; both are delivered at once on
/// one endpoint and each pin settles on its own domain.
#[test]
fn metadata_reader_latches_each_pin_under_concurrency() {
    let reader: Arc<dyn FrameTimestampReader> = Arc::from(ReaderKind::UvcMetadata.create(time()));
    let depth = RequestMapping::new(fourcc::Z16, StreamType::Depth, 30);
    let ir = RequestMapping::new(fourcc::Y8, StreamType::Infrared, 30);

    let depth_thread = {
        let reader = reader.clone();
        thread::spawn(move || {
            for seq in 1..=FRAMES {
                let md = capture_record((seq * 33_000) as u32, seq as i32).encode();
                let frame = FrameObject::new(vec![0u8; 16]).with_metadata(md.to_vec());
                let ts = reader.get_frame_timestamp(&depth, &frame);
                assert!((ts - seq as f64 * 33.0).abs() < 1e-6);
                assert_eq!(reader.get_frame_counter(&depth, &frame), seq);
            }
        })
    };
    let ir_thread = {
        let reader = reader.clone();
        thread::spawn(move || {
            for seq in 1..=FRAMES {
                let frame = FrameObject::new(vec![0u8; 16]);
                reader.get_frame_timestamp(&ir, &frame);
                assert_eq!(reader.get_frame_counter(&ir, &frame), seq);
            }
        })
    };
    depth_thread.join().expect("depth thread");
    ir_thread.join().expect("ir thread");

    let empty = FrameObject::default();
    assert_eq!(
        reader.get_frame_timestamp_domain(&depth, &empty),
        TimestampDomain::HardwareClock
    );
    assert_eq!(
        reader.get_frame_timestamp_domain(&ir, &empty),
        TimestampDomain::SystemTime
    );

    reader.reset();
    assert_eq!(
        reader.get_frame_timestamp_domain(&depth, &empty),
        TimestampDomain::SystemTime
    );
    assert_eq!(reader.get_frame_counter(&ir, &empty), 1);
}
