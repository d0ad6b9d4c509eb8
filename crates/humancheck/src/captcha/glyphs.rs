//! Built-in 5x7 bitmap face.
//!
//! Used when none of the TrueType faces can be parsed.

use image::imageops::{FilterType, resize};
use image::{GrayImage, Luma};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Blank columns rendered for each padding space
const SPACE_WIDTH: u32 = 3;

/// Pixels per bitmap cell before scaling down to the requested size
const MASTER_SCALE: u32 = 8;

/// Rows of a glyph, most significant of the low 5 bits is the leftmost column
fn bitmap(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'b' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        'c' => [0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'd' => [0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'h' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'w' => [0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        'y' => [0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        _ => return None,
    };
    Some(rows)
}

/// Rasterize `text` white-on-black, `px` pixels tall.
///
/// Spaces and characters without a bitmap advance the pen but draw nothing.
pub fn rasterize(text: &str, px: u32) -> GrayImage {
    let master = rasterize_scaled(text, MASTER_SCALE);
    let (width, height) = master.dimensions();

    let px = px.max(1);
    let scaled_width = ((width * px + height / 2) / height).max(1);
    resize(&master, scaled_width, px, FilterType::Triangle)
}

/// Draw each bitmap cell as a `scale`x`scale` block.
///
/// A cell row is the 7-row glyph plus one row of margin above and below.
fn rasterize_scaled(text: &str, scale: u32) -> GrayImage {
    let columns: u32 = text
        .chars()
        .map(|c| if bitmap(c).is_some() { GLYPH_WIDTH + 1 } else { SPACE_WIDTH })
        .sum();
    let mut canvas = GrayImage::new(columns.max(1) * scale, (GLYPH_HEIGHT + 2) * scale);

    let mut pen = 0;
    for c in text.chars() {
        let Some(rows) = bitmap(c) else {
            pen += SPACE_WIDTH;
            continue;
        };

        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = (pen + col) * scale;
                let y0 = (row as u32 + 1) * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        canvas.put_pixel(x0 + dx, y0 + dy, Luma([255]));
                    }
                }
            }
        }
        pen += GLYPH_WIDTH + 1;
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use humancheck_common::constants::SOLUTION_CHARS;

    #[test]
    fn test_every_solution_char_has_a_bitmap() {
        for c in SOLUTION_CHARS.chars() {
            assert!(bitmap(c).is_some(), "missing bitmap for {c}");
        }
    }

    #[test]
    fn test_bitmaps_fit_five_columns() {
        for c in SOLUTION_CHARS.chars() {
            let rows = bitmap(c).unwrap();
            assert!(rows.iter().all(|r| *r < 0x20), "{c} overflows");
            assert!(rows.iter().any(|r| *r != 0), "{c} is blank");
        }
    }

    #[test]
    fn test_rasterize_padded_glyph() {
        let img = rasterize(" K ", 32);
        // 12 cells wide, 9 tall, scaled to 32 rows
        assert_eq!(img.height(), 32);
        assert_eq!(img.width(), 43);
        assert!(img.pixels().any(|p| p.0[0] > 128));

        // Leading space columns stay empty
        for y in 0..img.height() {
            for x in 0..8 {
                assert_eq!(img.get_pixel(x, y).0[0], 0);
            }
        }
    }

    #[test]
    fn test_rasterize_tracks_requested_size() {
        for px in 30..35 {
            let img = rasterize(" K ", px);
            assert_eq!(img.height(), px);
        }
        assert!(rasterize(" K ", 30).width() < rasterize(" K ", 34).width());
    }

    #[test]
    fn test_rasterize_blank_text() {
        let img = rasterize("  ", 30);
        assert!(img.pixels().all(|p| p.0[0] == 0));
    }
}
