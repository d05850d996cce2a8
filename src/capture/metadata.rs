//! UVC metadata attached to DS5 video frames.
//!
//! The firmware appends a packed little-endian record to every frame:
//!
//! ```text
//! [1B length][1B info][4B timestamp][6B source_clock]          UVC header
//! [4B id][4B size]                                             metadata header
//! [4B version][4B flags][4B frame_counter][4B optical_ts]
//! [4B readout][4B exposure][4B frame_interval][4B pipe_latency] capture timing
//! ```
//!
//! Fields are decoded one by one from their byte offsets. A buffer shorter
//! than the record is zero-extended, so a truncated record decodes its missing
//! fields as 0 instead of reading past the end.

/// One hardware tick in milliseconds
pub const TIMESTAMP_TO_MILLISECONDS: f64 = 0.001;

pub const UVC_HEADER_SIZE: usize = 12;
pub const METADATA_HEADER_SIZE: usize = 8;
pub const CAPTURE_TIMING_SIZE: usize = METADATA_HEADER_SIZE + 8 * 4;
pub const METADATA_SIZE: usize = UVC_HEADER_SIZE + CAPTURE_TIMING_SIZE;

const TIMESTAMP_OFFSET: usize = 2;
const SOURCE_CLOCK_OFFSET: usize = 6;
const CAPTURE_TIMING_OFFSET: usize = UVC_HEADER_SIZE;
const FRAME_COUNTER_OFFSET: usize = CAPTURE_TIMING_OFFSET + METADATA_HEADER_SIZE + 8;

/// Heuristic liveness check: metadata counts as present once any byte is
/// non-zero. An all-zero record cannot be told apart from a missing one.
pub fn probe(metadata: &[u8]) -> bool {
    metadata.iter().any(|&b| b != 0)
}

/// Hardware timestamp from the UVC header, in milliseconds
pub fn extract_timestamp(metadata: &[u8]) -> f64 {
    ticks_to_millis(read_u32(metadata, TIMESTAMP_OFFSET) as u64)
}

/// Firmware frame counter from the capture-timing payload
pub fn extract_frame_counter(metadata: &[u8]) -> i32 {
    read_u32(metadata, FRAME_COUNTER_OFFSET) as i32
}

pub fn ticks_to_millis(ticks: u64) -> f64 {
    ticks as f64 * TIMESTAMP_TO_MILLISECONDS
}

/// Little-endian `u32` at `offset`, zero-extended past the end of `buf`
pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(buf, offset))
}

/// Little-endian `u64` at `offset`, zero-extended past the end of `buf`
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(read_array(buf, offset))
}

fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    if let Some(src) = buf.get(offset..) {
        let n = src.len().min(N);
        out[..n].copy_from_slice(&src[..n]);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UvcHeader {
    pub length: u8,
    pub info: u8,
    pub timestamp: u32,
    pub source_clock: [u8; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureTiming {
    pub metadata_id: u32,
    pub size: u32,
    pub version: u32,
    pub flags: u32,
    pub frame_counter: i32,
    /// Milliseconds
    pub optical_timestamp: u32,
    pub readout_time: u32,
    pub exposure_time: u32,
    pub frame_interval: u32,
    /// Start of frame to frame ready in the USB buffer
    pub pipe_latency: u32,
}

/// Fully decoded metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    pub header: UvcHeader,
    pub capture_timing: CaptureTiming,
}

impl FrameMetadata {
    pub fn parse(buf: &[u8]) -> Self {
        let field = |i: usize| read_u32(buf, CAPTURE_TIMING_OFFSET + i * 4);

        Self {
            header: UvcHeader {
                length: buf.first().copied().unwrap_or(0),
                info: buf.get(1).copied().unwrap_or(0),
                timestamp: read_u32(buf, TIMESTAMP_OFFSET),
                source_clock: read_array(buf, SOURCE_CLOCK_OFFSET),
            },
            capture_timing: CaptureTiming {
                metadata_id: field(0),
                size: field(1),
                version: field(2),
                flags: field(3),
                frame_counter: field(4) as i32,
                optical_timestamp: field(5),
                readout_time: field(6),
                exposure_time: field(7),
                frame_interval: field(8),
                pipe_latency: field(9),
            },
        }
    }

    pub fn timestamp_ms(&self) -> f64 {
        ticks_to_millis(self.header.timestamp as u64)
    }

    /// Wire layout, as the firmware would attach it
    pub fn encode(&self) -> [u8; METADATA_SIZE] {
        let mut buf = [0u8; METADATA_SIZE];
        buf[0] = self.header.length;
        buf[1] = self.header.info;
        buf[TIMESTAMP_OFFSET..SOURCE_CLOCK_OFFSET]
            .copy_from_slice(&self.header.timestamp.to_le_bytes());
        buf[SOURCE_CLOCK_OFFSET..UVC_HEADER_SIZE].copy_from_slice(&self.header.source_clock);

        let t = &self.capture_timing;
        let fields = [
            t.metadata_id,
            t.size,
            t.version,
            t.flags,
            t.frame_counter as u32,
            t.optical_timestamp,
            t.readout_time,
            t.exposure_time,
            t.frame_interval,
            t.pipe_latency,
        ];
        for (chunk, field) in buf[CAPTURE_TIMING_OFFSET..].chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        buf
    }
}

/// Capture-timing metadata id reported by DS5 firmware
pub const CAPTURE_TIMING_ID: u32 = 0x8000_0001;

/// Record for a frame captured at `timestamp` ticks, as the firmware fills it
pub fn capture_record(timestamp: u32, frame_counter: i32) -> FrameMetadata {
    FrameMetadata {
        header: UvcHeader {
            length: UVC_HEADER_SIZE as u8,
            info: 0x8f,
            timestamp,
            source_clock: [0; 6],
        },
        capture_timing: CaptureTiming {
            metadata_id: CAPTURE_TIMING_ID,
            size: CAPTURE_TIMING_SIZE as u32,
            frame_counter,
            ..Default::default()
        },
    }
}
