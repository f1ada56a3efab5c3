//! Open media streams and their tracks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use recorder_audio::AudioChunk;
use recorder_ipc::{StreamKind, TrackKind};
use tracing::{debug, warn};

use crate::frame::VideoFrame;
use crate::host::{MediaDevice, OpenedStream, TrackSpec};

/// One media track. Clones share the `enabled` flag.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    enabled: Arc<AtomicBool>,
}

impl Track {
    fn from_spec(spec: TrackSpec) -> Self {
        Self {
            id: spec.id,
            kind: spec.kind,
            label: spec.label,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check if the track currently delivers media.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// The shared flag, for consumers that gate on it directly.
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }
}

/// Lifecycle of a stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closed,
}

struct StreamInner {
    id: u64,
    kind: StreamKind,
    tracks: Vec<Track>,
    video: Option<Receiver<VideoFrame>>,
    audio: Option<Receiver<AudioChunk>>,
    last_frame: Mutex<Option<VideoFrame>>,
    state: Mutex<StreamState>,
    ended: AtomicBool,
    device: Mutex<Option<Box<dyn MediaDevice>>>,
}

/// A cloneable reference to one open media stream.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("tracks", &self.inner.tracks.len())
            .field("state", &self.state())
            .finish()
    }
}

impl StreamHandle {
    pub(crate) fn new(id: u64, kind: StreamKind, opened: OpenedStream) -> Self {
        let OpenedStream {
            tracks,
            video,
            audio,
            device,
        } = opened;
        Self {
            inner: Arc::new(StreamInner {
                id,
                kind,
                tracks: tracks.into_iter().map(Track::from_spec).collect(),
                video,
                audio,
                last_frame: Mutex::new(None),
                state: Mutex::new(StreamState::Open),
                ended: AtomicBool::new(false),
                device: Mutex::new(Some(device)),
            }),
        }
    }

    /// Acquirer-assigned id, unique per process.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Stream kind.
    pub fn kind(&self) -> StreamKind {
        self.inner.kind
    }

    /// Tracks, in host order.
    pub fn tracks(&self) -> &[Track] {
        &self.inner.tracks
    }

    /// Number of tracks.
    pub fn track_count(&self) -> usize {
        self.inner.tracks.len()
    }

    /// Tracks of the given media type.
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Track> {
        self.inner.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// The first video track, if any.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks_of(TrackKind::Video).next()
    }

    /// Returns true if any track is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.tracks.iter().any(Track::is_enabled)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        *self.inner.state.lock()
    }

    /// Returns true until the handle is closed.
    pub fn is_open(&self) -> bool {
        self.state() == StreamState::Open
    }

    /// Returns true once the producer stopped delivering media.
    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Receiver for this stream's audio chunks.
    pub fn audio_receiver(&self) -> Option<Receiver<AudioChunk>> {
        self.inner.audio.clone()
    }

    /// Newest video frame.
    ///
    /// Drains everything queued since the last call and keeps the newest.
    /// When nothing new arrived the previous frame is returned again.
    /// Returns `None` when the stream is closed, has no video, the video
    /// track is disabled, or no frame has arrived yet.
    pub fn poll_frame(&self) -> Option<VideoFrame> {
        if !self.is_open() {
            return None;
        }
        let receiver = self.inner.video.as_ref()?;

        let mut last = self.inner.last_frame.lock();
        loop {
            match receiver.try_recv() {
                Ok(frame) => *last = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.inner.ended.swap(true, Ordering::SeqCst) {
                        warn!(kind = self.kind().name(), "Stream producer disconnected");
                    }
                    break;
                }
            }
        }

        if !self.video_track().is_some_and(Track::is_enabled) {
            return None;
        }
        last.clone()
    }

    /// Stop the device and mark the handle closed. Returns false if it already was.
    pub(crate) fn close(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state == StreamState::Closed {
                return false;
            }
            *state = StreamState::Closed;
        }
        if let Some(mut device) = self.inner.device.lock().take() {
            device.stop();
        }
        self.inner.last_frame.lock().take();
        debug!(id = self.id(), kind = self.kind().name(), "Stream closed");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use bytes::Bytes;

    use super::*;
    use crate::frame::CaptureTimestamp;

    struct CountingDevice(Arc<AtomicUsize>);

    impl MediaDevice for CountingDevice {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame(sequence: u64) -> VideoFrame {
        VideoFrame::new(
            Bytes::from(vec![0u8; 4]),
            1,
            1,
            CaptureTimestamp::now(Instant::now()),
            sequence,
        )
    }

    fn video_handle(
        stops: Arc<AtomicUsize>,
    ) -> (crossbeam_channel::Sender<VideoFrame>, StreamHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let opened = OpenedStream {
            tracks: vec![TrackSpec {
                id: "v0".into(),
                kind: TrackKind::Video,
                label: "test".into(),
            }],
            video: Some(rx),
            audio: None,
            device: Box::new(CountingDevice(stops)),
        };
        (tx, StreamHandle::new(1, StreamKind::Camera, opened))
    }

    #[test]
    fn test_poll_keeps_newest_and_repeats() {
        let (tx, handle) = video_handle(Arc::new(AtomicUsize::new(0)));
        assert!(handle.poll_frame().is_none());

        tx.send(frame(1)).unwrap();
        tx.send(frame(2)).unwrap();
        assert_eq!(handle.poll_frame().unwrap().sequence, 2);
        assert_eq!(handle.poll_frame().unwrap().sequence, 2);
    }

    #[test]
    fn test_disabled_track_yields_none() {
        let (tx, handle) = video_handle(Arc::new(AtomicUsize::new(0)));
        tx.send(frame(1)).unwrap();

        let clone = handle.clone();
        handle.tracks()[0].set_enabled(false);
        assert!(!clone.tracks()[0].is_enabled());
        assert!(clone.poll_frame().is_none());

        handle.tracks()[0].set_enabled(true);
        assert_eq!(clone.poll_frame().unwrap().sequence, 1);
    }

    #[test]
    fn test_disconnect_marks_ended() {
        let (tx, handle) = video_handle(Arc::new(AtomicUsize::new(0)));
        tx.send(frame(5)).unwrap();
        drop(tx);
        assert_eq!(handle.poll_frame().unwrap().sequence, 5);
        assert!(handle.is_ended());
    }

    #[test]
    fn test_close_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let (_tx, handle) = video_handle(Arc::clone(&stops));
        assert!(handle.close());
        assert!(!handle.close());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), StreamState::Closed);
        assert!(handle.poll_frame().is_none());
        assert_eq!(handle.track_count(), 1);
    }
}
