//! RGBA to planar YUV conversion.

/// Size of an I420 buffer. Chroma planes round odd dimensions up.
pub fn i420_buffer_size(width: u32, height: u32) -> usize {
    let (w, h) = (width as usize, height as usize);
    w * h + 2 * w.div_ceil(2) * h.div_ceil(2)
}

/// Convert tightly packed RGBA to I420 (BT.601, full range).
///
/// Alpha is premultiplied, so transparent pixels encode as black. Chroma is
/// the average of each 2x2 block.
pub fn rgba_to_i420(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let mut out = vec![0u8; i420_buffer_size(width, height)];
    let (y_plane, chroma) = out.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    let pixel = |x: usize, y: usize| -> (f32, f32, f32) {
        let offset = (y * w + x) * 4;
        let alpha = rgba[offset + 3] as f32 / 255.0;
        (
            rgba[offset] as f32 * alpha,
            rgba[offset + 1] as f32 * alpha,
            rgba[offset + 2] as f32 * alpha,
        )
    };

    for y in 0..h {
        for x in 0..w {
            let (r, g, b) = pixel(x, y);
            y_plane[y * w + x] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        }
    }

    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0.0, 0.0, 0.0, 0.0);
            for y in (cy * 2)..(cy * 2 + 2).min(h) {
                for x in (cx * 2)..(cx * 2 + 2).min(w) {
                    let (pr, pg, pb) = pixel(x, y);
                    r += pr;
                    g += pg;
                    b += pb;
                    n += 1.0;
                }
            }
            let (r, g, b) = (r / n, g / n, b / n);
            let u = (-0.169 * r - 0.331 * g + 0.500 * b + 128.0).round().clamp(0.0, 255.0) as u8;
            let v = (0.500 * r - 0.419 * g - 0.081 * b + 128.0).round().clamp(0.0, 255.0) as u8;
            u_plane[cy * cw + cx] = u;
            v_plane[cy * cw + cx] = v;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_rounds_chroma_up() {
        assert_eq!(i420_buffer_size(4, 4), 16 + 2 * 4);
        assert_eq!(i420_buffer_size(3, 3), 9 + 2 * 4);
    }

    #[test]
    fn test_white_and_black() {
        let white = [255u8, 255, 255, 255].repeat(4);
        let yuv = rgba_to_i420(&white, 2, 2);
        assert_eq!(&yuv[..4], &[255, 255, 255, 255]);
        assert_eq!(yuv[4], 128);
        assert_eq!(yuv[5], 128);

        let transparent = [255u8, 255, 255, 0].repeat(4);
        let yuv = rgba_to_i420(&transparent, 2, 2);
        assert_eq!(&yuv[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_red_chroma() {
        let red = [255u8, 0, 0, 255].repeat(4);
        let yuv = rgba_to_i420(&red, 2, 2);
        assert_eq!(yuv[0], 76);
        assert!(yuv[4] < 128);
        assert_eq!(yuv[5], 255);
    }

    #[test]
    fn test_odd_dimensions() {
        let rgba = [10u8, 20, 30, 255].repeat(15);
        let yuv = rgba_to_i420(&rgba, 5, 3);
        assert_eq!(yuv.len(), i420_buffer_size(5, 3));
    }
}
