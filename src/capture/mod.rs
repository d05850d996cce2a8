pub mod frame;
pub mod metadata;

pub use frame::fourcc;
pub use frame::FourCC;
pub use frame::FrameObject;
pub use frame::RequestMapping;
pub use frame::StreamType;
pub use metadata::FrameMetadata;
