//! Recording indicator burned into the composite while recording.

use image::RgbaImage;

use crate::compositor::RecordingOverlay;
use crate::draw::blend_pixel;

const DOT_COLOR: [u8; 3] = [255, 59, 48];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const PANEL_ALPHA: f32 = 0.45;
const MARGIN: u32 = 8;
const BLINK_PERIOD_MS: u64 = 500;

/// 3x5 glyphs, one row per byte, bit 2 is the leftmost column.
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        _ => return None,
    })
}

/// `mm:ss`; minutes keep counting past 59.
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let total_secs = elapsed_ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// `hh:mm:ss`.
pub fn format_elapsed_long(elapsed_ms: u64) -> String {
    let total_secs = elapsed_ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60
    )
}

/// Returns true while the blinking dot is lit.
pub fn dot_visible(overlay: &RecordingOverlay) -> bool {
    overlay.paused || (overlay.elapsed_ms / BLINK_PERIOD_MS) % 2 == 0
}

/// Draw the dot and elapsed time in the top-left corner.
pub fn draw(canvas: &mut RgbaImage, overlay: &RecordingOverlay) {
    let scale = (canvas.height() / 240).max(1);
    let text = format_elapsed(overlay.elapsed_ms);

    let pad = 2 * scale;
    let radius = 3 * scale;
    let glyph_w = 3 * scale;
    let glyph_h = 5 * scale;
    let text_w = text.chars().count() as u32 * (glyph_w + scale) - scale;
    let panel_w = pad + radius * 2 + pad + text_w + pad;
    let panel_h = pad + (radius * 2).max(glyph_h) + pad;

    fill_rect(canvas, MARGIN, MARGIN, panel_w, panel_h, [0, 0, 0], PANEL_ALPHA);

    let centre_y = MARGIN + panel_h / 2;
    if dot_visible(overlay) {
        let cx = (MARGIN + pad + radius) as f32;
        let cy = centre_y as f32;
        let r = radius as f32;
        for y in centre_y.saturating_sub(radius)..centre_y + radius {
            for x in MARGIN + pad..MARGIN + pad + radius * 2 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let cover = (r + 0.5 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
                if let Some(pixel) = canvas.get_pixel_mut_checked(x, y) {
                    blend_pixel(pixel, DOT_COLOR, cover);
                }
            }
        }
    }

    let mut x = MARGIN + pad + radius * 2 + pad;
    let y = centre_y.saturating_sub(glyph_h / 2);
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3u32 {
                    if bits & (0b100 >> col) != 0 {
                        fill_rect(
                            canvas,
                            x + col * scale,
                            y + row as u32 * scale,
                            scale,
                            scale,
                            TEXT_COLOR,
                            1.0,
                        );
                    }
                }
            }
        }
        x += glyph_w + scale;
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3], alpha: f32) {
    let x_end = (x + w).min(canvas.width());
    let y_end = (y + h).min(canvas.height());
    for py in y..y_end {
        for px in x..x_end {
            blend_pixel(canvas.get_pixel_mut(px, py), color, alpha);
        }
    }
}
