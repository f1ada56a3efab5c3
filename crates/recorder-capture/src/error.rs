//! Error types for the capture module.
//!
//! Host media errors arrive as a device error name (`NotAllowedError`,
//! `NotFoundError`, ...). [`DEVICE_ERROR_TABLE`] is the only place those
//! names are turned into an [`ErrorKind`].

use recorder_ipc::{ErrorKind, StreamKind};
use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Host media error, identified by its device error name.
    #[error("{} failed ({name}): {message}", .stream.name())]
    Device {
        stream: StreamKind,
        name: String,
        message: String,
    },

    /// Permission was explicitly refused.
    #[error("Permission denied for {}", .0.name())]
    PermissionDenied(StreamKind),

    /// Capture source not found.
    #[error("Capture source not found: {0}")]
    SourceNotFound(String),

    /// Screen capture needs a source id.
    #[error("No capture source selected")]
    SourceRequired,

    /// A stream of this kind is already open.
    #[error("{} stream already open", .0.name())]
    AlreadyOpen(StreamKind),

    /// The host cannot capture or enumerate.
    #[error("Capture unavailable: {0}")]
    Unavailable(String),
}

impl CaptureError {
    /// Build a host device error.
    pub fn device(stream: StreamKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Device {
            stream,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Device { name, .. } => classify_device_error(name),
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::SourceNotFound(_) | Self::SourceRequired => ErrorKind::DeviceNotFound,
            Self::AlreadyOpen(_) => ErrorKind::DeviceBusy,
            Self::Unavailable(_) => ErrorKind::CaptureUnavailable,
        }
    }
}

/// Device error names and the kind each maps to.
pub const DEVICE_ERROR_TABLE: &[(&str, ErrorKind)] = &[
    ("NotAllowedError", ErrorKind::PermissionDenied),
    ("PermissionDeniedError", ErrorKind::PermissionDenied),
    ("SecurityError", ErrorKind::PermissionDenied),
    ("NotFoundError", ErrorKind::DeviceNotFound),
    ("DevicesNotFoundError", ErrorKind::DeviceNotFound),
    ("OverconstrainedError", ErrorKind::DeviceNotFound),
    ("NotReadableError", ErrorKind::DeviceBusy),
    ("TrackStartError", ErrorKind::DeviceBusy),
    ("AbortError", ErrorKind::DeviceBusy),
];

/// Map a host device error name to an [`ErrorKind`]. Unknown names are
/// `CaptureUnavailable`.
pub fn classify_device_error(name: &str) -> ErrorKind {
    DEVICE_ERROR_TABLE
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::CaptureUnavailable)
}

/// User-facing message for an acquisition failure.
pub fn guidance(kind: ErrorKind, stream: StreamKind) -> String {
    let device = match stream {
        StreamKind::Screen => "screen recording",
        StreamKind::Camera => "camera",
        StreamKind::Microphone => "microphone",
        StreamKind::SystemAudio => "system audio",
    };
    match kind {
        ErrorKind::PermissionDenied => {
            format!("Access to the {device} was denied. Allow it in your system settings.")
        }
        ErrorKind::DeviceNotFound => match stream {
            StreamKind::Screen => "No screen or window is available to record.".to_string(),
            _ => format!("No {device} device was detected."),
        },
        ErrorKind::DeviceBusy => {
            format!("The {device} is in use by another application.")
        }
        _ => format!("Unable to access the {device}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_names() {
        assert_eq!(
            classify_device_error("NotAllowedError"),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            classify_device_error("NotFoundError"),
            ErrorKind::DeviceNotFound
        );
        assert_eq!(
            classify_device_error("NotReadableError"),
            ErrorKind::DeviceBusy
        );
    }

    #[test]
    fn test_classify_unknown_name() {
        assert_eq!(
            classify_device_error("SomethingOdd"),
            ErrorKind::CaptureUnavailable
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = CaptureError::device(StreamKind::Camera, "NotAllowedError", "denied");
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            CaptureError::SourceRequired.kind(),
            ErrorKind::DeviceNotFound
        );
        assert_eq!(
            CaptureError::AlreadyOpen(StreamKind::Screen).kind(),
            ErrorKind::DeviceBusy
        );
        assert!(err.to_string().contains("camera"));
    }

    #[test]
    fn test_guidance_mentions_device() {
        let text = guidance(ErrorKind::PermissionDenied, StreamKind::Microphone);
        assert!(text.contains("microphone"));
        assert!(text.contains("system settings"));

        let text = guidance(ErrorKind::DeviceNotFound, StreamKind::Camera);
        assert_eq!(text, "No camera device was detected.");
    }
}
