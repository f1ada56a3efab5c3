//! Error classification shared by every crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of every failure the recorder reports to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The user or the OS refused access to a device.
    PermissionDenied,

    /// No matching device or source exists.
    DeviceNotFound,

    /// The device exists but another process holds it.
    DeviceBusy,

    /// The host cannot capture at all.
    CaptureUnavailable,

    /// A recording is already in progress.
    AlreadyRecording,

    /// No container format is supported by the encoder backend.
    EncoderUnsupported,

    /// A compositing step failed.
    InternalCompositionFailure,

    /// The operation is not valid in the current recording state.
    InvalidState,

    /// A start was cancelled before the encoder ran.
    Cancelled,
}

impl ErrorKind {
    /// Returns true for failures raised while opening a stream.
    pub fn is_acquisition(self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::DeviceNotFound
                | Self::DeviceBusy
                | Self::CaptureUnavailable
        )
    }

    /// Returns true for failures caused by calling an operation in the wrong state.
    pub fn is_contract_violation(self) -> bool {
        matches!(self, Self::AlreadyRecording | Self::InvalidState)
    }

    /// Returns the display name for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::DeviceNotFound => "device not found",
            Self::DeviceBusy => "device busy",
            Self::CaptureUnavailable => "capture unavailable",
            Self::AlreadyRecording => "already recording",
            Self::EncoderUnsupported => "encoder unsupported",
            Self::InternalCompositionFailure => "composition failure",
            Self::InvalidState => "invalid state",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
