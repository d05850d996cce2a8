use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Four-character format code, stored the way the device firmware reports it
/// (first character in the most significant byte, so `Z16 ` is `0x5a313620`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*code))
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Format tags the DS5 endpoints deliver
pub mod fourcc {
    use super::FourCC;

    /// 16-bit depth
    pub const Z16: FourCC = FourCC::new(b"Z16 ");
    pub const Y8: FourCC = FourCC::new(b"GREY");
    pub const RAW8: FourCC = FourCC::new(b"RAW8");
    pub const GYRO: FourCC = FourCC::new(b"GYRO");
    pub const ACCEL: FourCC = FourCC::new(b"ACCL");
    pub const CUSTOM: FourCC = FourCC::new(b"CUST");
}

/// Logical stream a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Depth,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Gpio,
}

/// Identifies which stream/pin a frame was requested for.
///
/// Readers only look at `format` to pick a pin; the rest travels along for
/// logging and for the before-frame hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMapping {
    pub format: FourCC,
    pub stream: StreamType,
    pub fps: u32,
}

impl RequestMapping {
    pub fn new(format: FourCC, stream: StreamType, fps: u32) -> Self {
        Self {
            format,
            stream,
            fps,
        }
    }
}

/// Raw frame as delivered by the transport.
///
/// Buffers are reference counted, so cloning a frame (e.g. to hand it to the
/// auto-exposure mechanism) never copies pixel data.
#[derive(Debug, Clone, Default)]
pub struct FrameObject {
    pub pixels: Bytes,
    pub metadata: Option<Bytes>,
}

impl FrameObject {
    pub fn new(pixels: impl Into<Bytes>) -> Self {
        Self {
            pixels: pixels.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Metadata bytes, empty when the transport attached none
    pub fn metadata(&self) -> &[u8] {
        self.metadata.as_deref().unwrap_or(&[])
    }

    pub fn metadata_size(&self) -> usize {
        self.metadata().len()
    }
}
