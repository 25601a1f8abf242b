//! Tiny 5x7 bitmap font for axis labels
//!
//! Only the characters axis labels need: digits, `k`, `Hz`, `:` and `.`.

use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Transform};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance in font pixels, glyph plus one column of spacing
pub const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Row bitmaps for `ch`, most significant of the low five bits is leftmost
fn pattern(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'k' => [0b10000, 0b10000, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'z' => [0b00000, 0b00000, 0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
        's' => [0b00000, 0b00000, 0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => [0; 7],
    }
}

/// Whether `ch` has a glyph (space and unknown characters draw blank)
pub fn has_glyph(ch: char) -> bool {
    pattern(ch).iter().any(|row| *row != 0)
}

/// Width in device pixels of `text` at `pixel_size`, without trailing spacing
pub fn text_width(text: &str, pixel_size: u32) -> u32 {
    let count = text.chars().count() as u32;
    if count == 0 {
        return 0;
    }
    (count * GLYPH_ADVANCE - 1) * pixel_size
}

pub fn text_height(pixel_size: u32) -> u32 {
    GLYPH_HEIGHT * pixel_size
}

/// Draw `text` with its top-left corner at (x, y)
pub fn draw_text(pixmap: &mut Pixmap, text: &str, x: f32, y: f32, pixel_size: u32, color: Color) {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = false;

    let size = pixel_size.max(1) as f32;
    let advance = GLYPH_ADVANCE as f32 * size;
    for (i, ch) in text.chars().enumerate() {
        draw_char(pixmap, ch, x + i as f32 * advance, y, size, &paint);
    }
}

fn draw_char(pixmap: &mut Pixmap, ch: char, x: f32, y: f32, pixel_size: f32, paint: &Paint) {
    for (row, &bits) in pattern(ch).iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                continue;
            }
            let px = x + col as f32 * pixel_size;
            let py = y + row as f32 * pixel_size;
            if let Some(rect) = Rect::from_xywh(px, py, pixel_size, pixel_size) {
                let path = PathBuilder::from_rect(rect);
                pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
            }
        }
    }
}
