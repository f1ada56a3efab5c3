//! Green-screen keying.

use image::RgbaImage;
use recorder_ipc::ChromaKeyConfig;

/// Per-pixel colour-distance key.
pub struct ChromaKeyFilter;

impl ChromaKeyFilter {
    /// Return a copy of `frame` with key-coloured pixels made transparent.
    pub fn apply(frame: &RgbaImage, config: &ChromaKeyConfig) -> RgbaImage {
        let mut keyed = frame.clone();
        Self::apply_in_place(&mut keyed, config);
        keyed
    }

    /// Key `frame` in place.
    ///
    /// A pixel whose summed absolute RGB distance from the key colour is
    /// below `threshold * 255` gets alpha 0. Other pixels are untouched.
    pub fn apply_in_place(frame: &mut RgbaImage, config: &ChromaKeyConfig) {
        if !config.enabled {
            return;
        }
        let limit = config.threshold * 255.0;
        let key = config.key_color;
        for pixel in frame.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            let diff = r.abs_diff(key.r) as u32 + g.abs_diff(key.g) as u32 + b.abs_diff(key.b) as u32;
            if (diff as f32) < limit {
                pixel.0[3] = 0;
            }
        }
    }
}
