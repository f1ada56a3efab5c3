//! Capture source enumeration and media stream acquisition.
//!
//! The platform side lives behind [`CaptureHost`]. On top of it,
//! [`SourceCatalog`] lists screens and windows, and [`StreamAcquirer`] owns
//! every open [`StreamHandle`] (at most one per [`StreamKind`]). Host errors
//! are classified into [`ErrorKind`] through one table in [`error`].
//!
//! [`SyntheticHost`] produces test-pattern video and tone audio without any
//! platform capture APIs.
//!
//! [`StreamKind`]: recorder_ipc::StreamKind
//! [`ErrorKind`]: recorder_ipc::ErrorKind

mod acquirer;
mod catalog;
pub mod error;
mod frame;
mod host;
mod stream;
mod synthetic;

pub use acquirer::StreamAcquirer;
pub use catalog::SourceCatalog;
pub use error::{classify_device_error, guidance, CaptureError};
pub use frame::{CaptureTimestamp, VideoFrame};
pub use host::{CaptureHost, MediaDevice, OpenedStream, StreamRequest, TrackSpec};
pub use stream::{StreamHandle, StreamState, Track};
pub use synthetic::{SyntheticConfig, SyntheticHost};

/// Channel capacity for captured frames.
pub const FRAME_CHANNEL_CAPACITY: usize = 3;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
