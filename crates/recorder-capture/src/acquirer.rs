//! Opening and closing media streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use recorder_ipc::{PermissionKind, StreamKind};
use tracing::{debug, info, instrument, warn};

use crate::error::CaptureError;
use crate::host::{CaptureHost, StreamRequest};
use crate::stream::StreamHandle;
use crate::CaptureResult;

/// Owns every open stream, at most one per kind.
pub struct StreamAcquirer {
    host: Arc<dyn CaptureHost>,
    open: Mutex<HashMap<StreamKind, StreamHandle>>,
    next_id: AtomicU64,
}

impl StreamAcquirer {
    /// Create an acquirer over `host`.
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self {
            host,
            open: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a stream of `kind`.
    ///
    /// Screen streams need `source_id`; other kinds use the default device.
    /// Permission is checked first and requested when not yet granted.
    #[instrument(name = "stream_open", skip(self), fields(kind = kind.name()))]
    pub fn open(&self, kind: StreamKind, source_id: Option<&str>) -> CaptureResult<StreamHandle> {
        if self.is_open(kind) {
            return Err(CaptureError::AlreadyOpen(kind));
        }
        if kind == StreamKind::Screen && source_id.is_none() {
            return Err(CaptureError::SourceRequired);
        }

        if let Some(permission) = PermissionKind::for_stream(kind) {
            let status = self.host.permission_status(permission);
            if !status.is_granted() {
                debug!(?status, "Requesting permission");
                if !self.host.request_permission(permission) {
                    warn!("Permission refused");
                    return Err(CaptureError::PermissionDenied(kind));
                }
            }
        }

        let request = StreamRequest {
            kind,
            source_id: source_id.map(str::to_owned),
        };
        let opened = self.host.open_media_stream(&request)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = StreamHandle::new(id, kind, opened);

        let mut open = self.open.lock();
        if open.contains_key(&kind) {
            drop(open);
            handle.close();
            return Err(CaptureError::AlreadyOpen(kind));
        }
        open.insert(kind, handle.clone());

        info!(id, tracks = handle.track_count(), "Stream opened");
        Ok(handle)
    }

    /// Enable or disable every track of `handle` without closing the device.
    pub fn set_track_enabled(&self, handle: &StreamHandle, enabled: bool) {
        for track in handle.tracks() {
            track.set_enabled(enabled);
        }
        debug!(kind = handle.kind().name(), enabled, "Tracks toggled");
    }

    /// Stop the device and mark the handle closed. Idempotent.
    pub fn close(&self, handle: &StreamHandle) {
        {
            let mut open = self.open.lock();
            if open.get(&handle.kind()).is_some_and(|h| h.id() == handle.id()) {
                open.remove(&handle.kind());
            }
        }
        handle.close();
    }

    /// The open handle of `kind`, if any.
    pub fn get(&self, kind: StreamKind) -> Option<StreamHandle> {
        self.open.lock().get(&kind).cloned()
    }

    /// Returns true if a stream of `kind` is open.
    pub fn is_open(&self, kind: StreamKind) -> bool {
        self.open.lock().contains_key(&kind)
    }

    /// Number of open streams.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Close every open stream.
    pub fn close_all(&self) {
        let handles: Vec<StreamHandle> = self.open.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.close();
        }
    }
}

impl Drop for StreamAcquirer {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use recorder_ipc::{ErrorKind, PermissionStatus};

    use super::*;
    use crate::synthetic::{SyntheticConfig, SyntheticHost};

    fn setup() -> (Arc<SyntheticHost>, StreamAcquirer) {
        let host = Arc::new(SyntheticHost::new(SyntheticConfig::small()));
        let acquirer = StreamAcquirer::new(host.clone());
        (host, acquirer)
    }

    #[test]
    fn test_open_and_close() {
        let (host, acquirer) = setup();
        let handle = acquirer.open(StreamKind::Camera, None).unwrap();
        assert!(acquirer.is_open(StreamKind::Camera));
        assert_eq!(host.active_streams(), 1);

        acquirer.close(&handle);
        acquirer.close(&handle);
        assert!(!acquirer.is_open(StreamKind::Camera));
        assert!(!handle.is_open());
        assert_eq!(host.active_streams(), 0);
    }

    #[test]
    fn test_one_handle_per_kind() {
        let (_host, acquirer) = setup();
        let first = acquirer.open(StreamKind::Microphone, None).unwrap();
        let err = acquirer.open(StreamKind::Microphone, None).unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyOpen(StreamKind::Microphone)));
        assert_eq!(acquirer.get(StreamKind::Microphone).unwrap().id(), first.id());
    }

    #[test]
    fn test_screen_requires_source() {
        let (_host, acquirer) = setup();
        let err = acquirer.open(StreamKind::Screen, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    }

    #[test]
    fn test_permission_requested_then_denied() {
        let (host, acquirer) = setup();
        host.set_permission(PermissionKind::Camera, PermissionStatus::NotDetermined);
        host.set_permission_response(PermissionKind::Camera, false);

        let err = acquirer.open(StreamKind::Camera, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(host.permission_requests(), 1);
        assert_eq!(host.active_streams(), 0);
    }

    #[test]
    fn test_permission_granted_on_request() {
        let (host, acquirer) = setup();
        host.set_permission(PermissionKind::Microphone, PermissionStatus::NotDetermined);
        host.set_permission_response(PermissionKind::Microphone, true);
        assert!(acquirer.open(StreamKind::Microphone, None).is_ok());
    }

    #[test]
    fn test_host_error_is_classified() {
        let (host, acquirer) = setup();
        host.fail_open(StreamKind::Camera, "NotReadableError");
        let err = acquirer.open(StreamKind::Camera, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceBusy);
    }

    #[test]
    fn test_toggle_keeps_track_list() {
        let (_host, acquirer) = setup();
        let handle = acquirer.open(StreamKind::Microphone, None).unwrap();
        let before = handle.track_count();
        acquirer.set_track_enabled(&handle, false);
        assert!(!handle.is_enabled());
        assert!(handle.is_open());
        acquirer.set_track_enabled(&handle, true);
        assert!(handle.is_enabled());
        assert_eq!(handle.track_count(), before);
    }

    #[test]
    fn test_close_all() {
        let (host, acquirer) = setup();
        acquirer.open(StreamKind::Screen, Some("screen:0")).unwrap();
        acquirer.open(StreamKind::Camera, None).unwrap();
        assert_eq!(acquirer.open_count(), 2);
        acquirer.close_all();
        assert_eq!(acquirer.open_count(), 0);
        assert_eq!(host.active_streams(), 0);
    }
}
