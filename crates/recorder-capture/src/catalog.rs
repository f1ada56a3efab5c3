//! Capture source enumeration.

use std::sync::Arc;

use recorder_ipc::{DeviceAvailability, DeviceInfo, DeviceKind, Source, SourceKind};
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::host::CaptureHost;
use crate::CaptureResult;

/// Lists screens, windows and input devices. Holds no selection state.
pub struct SourceCatalog {
    host: Arc<dyn CaptureHost>,
}

impl SourceCatalog {
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self { host }
    }

    /// Fetch the current source list. An empty list is not an error.
    pub fn refresh(&self) -> CaptureResult<Vec<Source>> {
        let sources = self.host.list_capture_sources().map_err(|e| {
            warn!("Source enumeration failed: {}", e);
            match e {
                CaptureError::Unavailable(_) => e,
                other => CaptureError::Unavailable(other.to_string()),
            }
        })?;
        debug!(count = sources.len(), "Sources refreshed");
        Ok(sources)
    }

    /// Fetch the input device list.
    pub fn devices(&self) -> CaptureResult<Vec<DeviceInfo>> {
        self.host.list_devices()
    }

    /// Which optional inputs exist.
    pub fn device_availability(&self) -> CaptureResult<DeviceAvailability> {
        Ok(availability_of(&self.devices()?))
    }

    /// Preferred default: first screen, then first window, then first entry.
    pub fn default_source(sources: &[Source]) -> Option<&Source> {
        sources
            .iter()
            .find(|s| s.kind == SourceKind::Screen)
            .or_else(|| sources.iter().find(|s| s.kind == SourceKind::Window))
            .or_else(|| sources.first())
    }

    /// Look up a source by id.
    pub fn find<'a>(sources: &'a [Source], id: &str) -> Option<&'a Source> {
        sources.iter().find(|s| s.id == id)
    }
}

fn availability_of(devices: &[DeviceInfo]) -> DeviceAvailability {
    let has = |kind: DeviceKind| devices.iter().any(|d| d.kind == kind);
    DeviceAvailability {
        camera: has(DeviceKind::Camera),
        microphone: has(DeviceKind::Microphone),
        system_audio: has(DeviceKind::SystemAudio),
    }
}

#[cfg(test)]
mod tests {
    use recorder_ipc::ErrorKind;

    use super::*;
    use crate::synthetic::{SyntheticConfig, SyntheticHost};

    fn source(id: &str, kind: SourceKind) -> Source {
        Source {
            id: id.into(),
            display_name: id.into(),
            kind,
            thumbnail: None,
        }
    }

    #[test]
    fn test_default_source_prefers_screen() {
        let sources = vec![
            source("w1", SourceKind::Window),
            source("s1", SourceKind::Screen),
        ];
        assert_eq!(SourceCatalog::default_source(&sources).unwrap().id, "s1");

        let windows = vec![source("w1", SourceKind::Window)];
        assert_eq!(SourceCatalog::default_source(&windows).unwrap().id, "w1");

        assert!(SourceCatalog::default_source(&[]).is_none());
    }

    #[test]
    fn test_find() {
        let sources = vec![source("a", SourceKind::Screen), source("b", SourceKind::Window)];
        assert_eq!(SourceCatalog::find(&sources, "b").unwrap().kind, SourceKind::Window);
        assert!(SourceCatalog::find(&sources, "c").is_none());
    }

    #[test]
    fn test_refresh_denied_is_unavailable() {
        let host = Arc::new(SyntheticHost::new(SyntheticConfig::small()));
        host.deny_enumeration(true);
        let catalog = SourceCatalog::new(host.clone());
        let err = catalog.refresh().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureUnavailable);

        host.deny_enumeration(false);
        assert!(!catalog.refresh().unwrap().is_empty());
    }

    #[test]
    fn test_empty_list_is_ok() {
        let config = SyntheticConfig {
            sources: Vec::new(),
            ..SyntheticConfig::small()
        };
        let catalog = SourceCatalog::new(Arc::new(SyntheticHost::new(config)));
        assert!(catalog.refresh().unwrap().is_empty());
    }

    #[test]
    fn test_device_availability() {
        let config = SyntheticConfig {
            has_system_audio: false,
            ..SyntheticConfig::small()
        };
        let catalog = SourceCatalog::new(Arc::new(SyntheticHost::new(config)));
        let availability = catalog.device_availability().unwrap();
        assert!(availability.camera);
        assert!(availability.microphone);
        assert!(!availability.system_audio);
    }
}
