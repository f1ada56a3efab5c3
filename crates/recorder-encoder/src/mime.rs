//! Container MIME negotiation.

use tracing::{debug, warn};

use crate::error::EncoderError;
use crate::EncoderResult;

/// Uncompressed YUV4MPEG2, produced by the built-in backend.
pub const Y4M_MIME: &str = "video/x-yuv4mpeg2";

/// Mixed audio stored beside containers without an audio stream.
pub const WAV_MIME: &str = "audio/wav";

/// Candidates tried, in order, when no preference matches.
pub const MIME_FALLBACKS: &[&str] = &[
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/mp4;codecs=h264",
    "video/mp4;codecs=avc1",
    "video/webm",
    "video/mp4",
    Y4M_MIME,
];

/// A supported output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    /// Container family ("webm", "mp4", "y4m").
    pub name: &'static str,

    pub mime_type: &'static str,
}

/// Container family of a MIME type.
pub fn container_of(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "video/webm" => "webm",
        "video/mp4" => "mp4",
        Y4M_MIME => "y4m",
        WAV_MIME => "wav",
        _ => "bin",
    }
}

/// File extension (without dot) for a MIME type.
pub fn file_extension(mime: &str) -> &'static str {
    container_of(mime)
}

/// Every fallback candidate the probe accepts.
pub fn supported_formats(probe: impl Fn(&str) -> bool) -> Vec<FormatInfo> {
    MIME_FALLBACKS
        .iter()
        .filter(|mime| probe(mime))
        .map(|mime| FormatInfo {
            name: container_of(mime),
            mime_type: mime,
        })
        .collect()
}

/// Pick the container MIME type for a recording.
///
/// Tries the preferred MIME type, then the fallback candidates of the
/// preferred container family, then every fallback in order. Each distinct
/// candidate is probed at most once.
pub fn negotiate_mime_type(
    preferred_mime: Option<&str>,
    preferred_format: Option<&str>,
    probe: impl Fn(&str) -> bool,
) -> EncoderResult<String> {
    let mut probed: Vec<&str> = Vec::new();

    let from_format = preferred_format.into_iter().flat_map(|format| {
        MIME_FALLBACKS
            .iter()
            .copied()
            .filter(move |mime| container_of(mime) == format)
    });

    let candidates = preferred_mime
        .into_iter()
        .chain(from_format)
        .chain(MIME_FALLBACKS.iter().copied());

    for candidate in candidates {
        if probed.contains(&candidate) {
            continue;
        }
        probed.push(candidate);
        if probe(candidate) {
            debug!(mime = candidate, "Negotiated container");
            return Ok(candidate.to_string());
        }
    }

    warn!(tried = probed.len(), "No supported container");
    Err(EncoderError::Unsupported {
        tried: probed.len(),
    })
}
