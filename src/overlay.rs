//! Raster drawing primitives for annotations.
//!
//! Everything clips against the image bounds, so callers may pass boxes or text
//! origins that hang off any edge.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

/// Glyph cell size of the built-in 8x8 font before scaling.
pub const GLYPH_SIZE: u32 = 8;

/// Draw a rectangle border with given thickness. Corners are inclusive.
pub fn draw_rect(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness as i32 {
        let (xx0, yy0, xx1, yy1) = (x0 + t, y0 + t, x1 - t, y1 - t);
        if xx0 > xx1 || yy0 > yy1 {
            break;
        }
        for x in xx0..=xx1 {
            put(img, x, yy0, color);
            put(img, x, yy1, color);
        }
        for y in yy0..=yy1 {
            put(img, xx0, y, color);
            put(img, xx1, y, color);
        }
    }
}

/// Fill `[x0, x1) x [y0, y1)`.
pub fn fill_rect(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    for y in y0..y1 {
        for x in x0..x1 {
            put(img, x, y, color);
        }
    }
}

/// Render `text` with its top-left corner at `(x, y)`.
///
/// Characters outside the font's basic Latin range are drawn as blanks.
pub fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = scale.max(1) as i32;
    let advance = GLYPH_SIZE as i32 * scale;
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch) else {
            continue;
        };
        let gx = x + i as i32 * advance;
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE as i32 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let px = gx + col * scale;
                let py = y + row as i32 * scale;
                fill_rect(img, px, py, px + scale, py + scale, color);
            }
        }
    }
}

/// Pixel size of `text` rendered at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    (
        text.chars().count() as u32 * GLYPH_SIZE * scale,
        GLYPH_SIZE * scale,
    )
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < img.width() && y < img.height() {
        img.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn rect_corners_are_colored_and_interior_is_not() {
        let mut img = RgbImage::new(40, 40);
        draw_rect(&mut img, 5, 5, 10, 10, RED, 2);
        for (x, y) in [(5, 5), (10, 5), (5, 10), (10, 10), (6, 6)] {
            assert_eq!(img.get_pixel(x, y), &RED);
        }
        assert_eq!(img.get_pixel(8, 8), &BLACK);
    }

    #[test]
    fn drawing_clips_at_edges() {
        let mut img = RgbImage::new(10, 10);
        draw_rect(&mut img, -5, -5, 20, 20, RED, 1);
        fill_rect(&mut img, 8, 8, 30, 30, RED);
        draw_text(&mut img, -4, -4, "88", RED, 3);
        assert_eq!(img.get_pixel(9, 9), &RED);
    }

    #[test]
    fn text_renders_pixels_inside_its_cell() {
        let mut img = RgbImage::new(32, 16);
        draw_text(&mut img, 0, 0, "1m", RED, 1);
        let lit = img.pixels().filter(|p| **p == RED).count();
        assert!(lit > 0);
        for (x, y, p) in img.enumerate_pixels() {
            if *p == RED {
                assert!(x < 16 && y < 8, "pixel ({x},{y}) outside text cell");
            }
        }
        assert_eq!(text_size("1m", 2), (32, 16));
    }

    #[test]
    fn blank_text_draws_nothing() {
        let mut img = RgbImage::new(16, 16);
        draw_text(&mut img, 0, 0, "  ", RED, 1);
        assert!(img.pixels().all(|p| *p == BLACK));
    }
}
