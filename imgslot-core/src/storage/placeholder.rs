use crate::error::{ImgSlotError, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const PLACEHOLDER_WIDTH: u32 = 200;
pub const PLACEHOLDER_HEIGHT: u32 = 100;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SCALE: u32 = 4;
const GLYPH_SPACING: u32 = 4;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

// 5x7 bitmaps, one row per byte, leftmost pixel in bit 4.
const GLYPH_FOUR: [u8; 7] = [
    0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
];
const GLYPH_ZERO: [u8; 7] = [
    0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
];

/// Render the fallback image served before anything is uploaded: a white
/// 200x100 PNG with "404" drawn in black in the middle.
pub fn render_placeholder_png() -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, WHITE);

    let glyphs = [GLYPH_FOUR, GLYPH_ZERO, GLYPH_FOUR];
    let glyph_px = GLYPH_WIDTH * GLYPH_SCALE;
    let text_width = glyphs.len() as u32 * glyph_px + (glyphs.len() as u32 - 1) * GLYPH_SPACING;
    let origin_x = (PLACEHOLDER_WIDTH - text_width) / 2;
    let origin_y = (PLACEHOLDER_HEIGHT - GLYPH_HEIGHT * GLYPH_SCALE) / 2;

    for (index, glyph) in glyphs.iter().enumerate() {
        let glyph_x = origin_x + index as u32 * (glyph_px + GLYPH_SPACING);
        draw_glyph(&mut canvas, glyph, glyph_x, origin_y);
    }

    let mut encoded = Cursor::new(Vec::new());
    canvas
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|error| ImgSlotError::PlaceholderSynthesis(error.to_string()))?;

    Ok(encoded.into_inner())
}

fn draw_glyph(canvas: &mut RgbImage, glyph: &[u8; 7], x: u32, y: u32) {
    for (row, bits) in glyph.iter().enumerate() {
        for column in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - column)) == 0 {
                continue;
            }

            let cell_x = x + column * GLYPH_SCALE;
            let cell_y = y + row as u32 * GLYPH_SCALE;
            for dy in 0..GLYPH_SCALE {
                for dx in 0..GLYPH_SCALE {
                    canvas.put_pixel(cell_x + dx, cell_y + dy, BLACK);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_decodable_png() {
        let bytes = render_placeholder_png().unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));

        assert_eq!(*decoded.get_pixel(0, 0), WHITE);
        let ink = decoded.pixels().filter(|pixel| **pixel == BLACK).count();
        assert!(ink > 0);
    }

    #[test]
    fn test_placeholder_is_deterministic() {
        assert_eq!(
            render_placeholder_png().unwrap(),
            render_placeholder_png().unwrap()
        );
    }
}
