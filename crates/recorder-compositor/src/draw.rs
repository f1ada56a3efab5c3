//! Canvas drawing primitives.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use recorder_ipc::{PipShape, Rgb};

use crate::geometry::Rect;
use crate::mask;

/// Gaussian sigma of the camera drop shadow.
pub const SHADOW_SIGMA: f32 = 8.0;

/// Maximum shadow alpha at intensity 1.0.
const SHADOW_STRENGTH: f32 = 0.6;

/// Downscale factor used before blurring backdrops.
const BACKDROP_DOWNSCALE: u32 = 8;

const BACKDROP_SIGMA: f32 = 2.0;

/// Composite `color` with `alpha` over `dst`.
pub fn blend_pixel(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst_alpha = dst.0[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);
    if out_alpha <= 0.0 {
        return;
    }
    for (channel, &src) in dst.0.iter_mut().zip(color.iter()) {
        let value = (src as f32 * alpha + *channel as f32 * dst_alpha * (1.0 - alpha)) / out_alpha;
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_alpha * 255.0).round() as u8;
}

/// Fill the whole canvas with an opaque colour.
pub fn fill(canvas: &mut RgbaImage, color: Rgb) {
    for pixel in canvas.pixels_mut() {
        *pixel = Rgba([color.r, color.g, color.b, 255]);
    }
}

/// Scale every colour channel by `factor`.
pub fn darken(canvas: &mut RgbaImage, factor: f32) {
    let factor = factor.clamp(0.0, 1.0);
    for pixel in canvas.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = (*channel as f32 * factor).round() as u8;
        }
    }
}

/// Resize `src` to exactly `width` x `height`.
pub fn scale_to(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    imageops::resize(src, width, height, FilterType::Triangle)
}

/// A blurred copy of `src` stretched over `width` x `height`.
pub fn blurred_backdrop(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let small_w = (width / BACKDROP_DOWNSCALE).max(1);
    let small_h = (height / BACKDROP_DOWNSCALE).max(1);
    let small = imageops::resize(src, small_w, small_h, FilterType::Triangle);
    let blurred = imageops::blur(&small, BACKDROP_SIGMA);
    let mut backdrop = imageops::resize(&blurred, width, height, FilterType::Triangle);
    for pixel in backdrop.pixels_mut() {
        pixel.0[3] = 255;
    }
    backdrop
}

/// Draw `src` (already sized to `rect`) clipped to `shape`, scaled by `opacity`.
pub fn draw_shaped(canvas: &mut RgbaImage, src: &RgbaImage, rect: Rect, shape: PipShape, opacity: f32) {
    if rect.is_empty() || opacity <= 0.0 {
        return;
    }
    for_each_visible(canvas, rect, |canvas, sx, sy, cx, cy| {
        let cover = mask::coverage(shape, rect.width, rect.height, sx, sy);
        if cover <= 0.0 {
            return;
        }
        let Some(src_pixel) = src.get_pixel_checked(sx, sy) else {
            return;
        };
        let alpha = src_pixel.0[3] as f32 / 255.0 * cover * opacity;
        let [r, g, b, _] = src_pixel.0;
        blend_pixel(canvas.get_pixel_mut(cx, cy), [r, g, b], alpha);
    });
}

/// Blurred alpha mask of `shape` in a `width` x `height` box, padded on
/// every side by [`shadow_padding`].
pub fn shadow_mask(width: u32, height: u32, shape: PipShape) -> RgbaImage {
    let pad = shadow_padding();
    let mut mask_image = RgbaImage::new(width + pad * 2, height + pad * 2);
    for y in 0..height {
        for x in 0..width {
            let cover = mask::coverage(shape, width, height, x, y);
            if cover > 0.0 {
                mask_image.put_pixel(x + pad, y + pad, Rgba([0, 0, 0, (cover * 255.0) as u8]));
            }
        }
    }
    imageops::blur(&mask_image, SHADOW_SIGMA)
}

/// Padding around a shadow mask.
pub fn shadow_padding() -> u32 {
    (SHADOW_SIGMA * 3.0).ceil() as u32
}

/// Blend a shadow mask with its top-left at `(x, y)`.
pub fn draw_shadow(canvas: &mut RgbaImage, shadow: &RgbaImage, x: i32, y: i32, intensity: f32) {
    let strength = intensity.clamp(0.0, 1.0) * SHADOW_STRENGTH;
    if strength <= 0.0 {
        return;
    }
    let rect = Rect::new(x, y, shadow.width(), shadow.height());
    for_each_visible(canvas, rect, |canvas, sx, sy, cx, cy| {
        let alpha = shadow.get_pixel(sx, sy).0[3] as f32 / 255.0 * strength;
        blend_pixel(canvas.get_pixel_mut(cx, cy), [0, 0, 0], alpha);
    });
}

/// Stroke a `width`-pixel band along the inside of `shape`'s edge.
pub fn stroke_border(canvas: &mut RgbaImage, rect: Rect, shape: PipShape, width: u32, color: Rgb) {
    if rect.is_empty() || width == 0 {
        return;
    }
    let band = width as f32;
    let (w, h) = (rect.width as f32, rect.height as f32);
    for_each_visible(canvas, rect, |canvas, sx, sy, cx, cy| {
        let d = mask::signed_distance(shape, w, h, sx as f32 + 0.5, sy as f32 + 0.5);
        let outer = (0.5 - d).clamp(0.0, 1.0);
        let inner = (0.5 - (d + band)).clamp(0.0, 1.0);
        let alpha = outer - inner;
        if alpha > 0.0 {
            blend_pixel(canvas.get_pixel_mut(cx, cy), [color.r, color.g, color.b], alpha);
        }
    });
}

/// Visit every pixel of `rect` that lands on the canvas as
/// `(canvas, rect_x, rect_y, canvas_x, canvas_y)`.
fn for_each_visible<F>(canvas: &mut RgbaImage, rect: Rect, mut visit: F)
where
    F: FnMut(&mut RgbaImage, u32, u32, u32, u32),
{
    let (canvas_w, canvas_h) = (canvas.width() as i32, canvas.height() as i32);
    let y_start = rect.y.max(0);
    let y_end = rect.bottom().min(canvas_h);
    let x_start = rect.x.max(0);
    let x_end = rect.right().min(canvas_w);
    for cy in y_start..y_end {
        for cx in x_start..x_end {
            visit(
                canvas,
                (cx - rect.x) as u32,
                (cy - rect.y) as u32,
                cx as u32,
                cy as u32,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_over_opaque() {
        let mut pixel = Rgba([0, 0, 0, 255]);
        blend_pixel(&mut pixel, [200, 100, 50], 0.5);
        assert_eq!(pixel, Rgba([100, 50, 25, 255]));
    }

    #[test]
    fn test_blend_over_transparent() {
        let mut pixel = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut pixel, [200, 100, 50], 0.5);
        assert_eq!(pixel, Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn test_draw_shaped_clips_to_canvas() {
        let mut canvas = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255]));
        draw_shaped(&mut canvas, &src, Rect::new(7, -3, 6, 6), PipShape::Rectangle, 1.0);
        assert_eq!(canvas.get_pixel(9, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(6, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(9, 3), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_stroke_border_leaves_centre() {
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        let rect = Rect::new(0, 0, 20, 20);
        stroke_border(&mut canvas, rect, PipShape::Rectangle, 3, Rgb::new(255, 0, 0));
        assert_eq!(canvas.get_pixel(1, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_shadow_darkens_around_shape() {
        let mask_image = shadow_mask(10, 10, PipShape::Rectangle);
        let pad = shadow_padding();
        assert_eq!(mask_image.width(), 10 + pad * 2);

        let mut canvas = RgbaImage::from_pixel(60, 60, Rgba([255, 255, 255, 255]));
        draw_shadow(&mut canvas, &mask_image, 0, 0, 1.0);
        let centre = (pad + 5, pad + 5);
        assert!(canvas.get_pixel(centre.0, centre.1).0[0] < 255);
    }

    #[test]
    fn test_darken_and_fill() {
        let mut canvas = RgbaImage::new(2, 2);
        fill(&mut canvas, Rgb::new(100, 200, 50));
        darken(&mut canvas, 0.5);
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([50, 100, 25, 255]));
    }

    #[test]
    fn test_blurred_backdrop_is_opaque_and_sized() {
        let src = RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 0]));
        let backdrop = blurred_backdrop(&src, 64, 48);
        assert_eq!(backdrop.dimensions(), (64, 48));
        assert!(backdrop.pixels().all(|p| p.0[3] == 255));
    }
}
