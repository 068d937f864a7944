//! Box and label rendering.
//!
//! `render` is a pure function from a frame and a box list to a new
//! frame; it holds no state and never mutates its input. Label text is
//! drawn with a built-in 8x12 glyph face so no font asset ships with
//! the binary.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::DetectionBox;
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const GLYPH_WIDTH: u32 = 8;
const GLYPH_HEIGHT: u32 = 12;
const LABEL_PAD: u32 = 5;

/// Draw detection boxes onto a copy of `frame`.
///
/// `highlight` of `None` draws every box; `Some(i)` in range draws only
/// box `i`; `Some(i)` out of range draws nothing, so a stale selection
/// index from the caller yields a clean copy instead of a crash.
pub fn render(frame: &Frame, boxes: &[DetectionBox], highlight: Option<usize>) -> Frame {
    let Some(mut img) = frame.to_image() else {
        return frame.clone();
    };

    match highlight {
        None => {
            for b in boxes {
                draw_box(&mut img, b);
            }
        }
        Some(i) => {
            if let Some(b) = boxes.get(i) {
                draw_box(&mut img, b);
            }
        }
    }

    Frame::from_image(img)
}

/// Per box: filled label background above the top-left corner, then a
/// 2 px outline, then the label text in black.
fn draw_box(img: &mut RgbImage, b: &DetectionBox) {
    let x1 = b.x1.round() as i32;
    let y1 = b.y1.round() as i32;
    let x2 = b.x2.round() as i32;
    let y2 = b.y2.round() as i32;
    let w = (x2 - x1).max(1) as u32;
    let h = (y2 - y1).max(1) as u32;

    let label = b.label();
    let text_w = label.chars().count() as u32 * GLYPH_WIDTH;
    let bg_h = GLYPH_HEIGHT + LABEL_PAD;

    draw_filled_rect_mut(
        img,
        Rect::at(x1, y1 - bg_h as i32).of_size(text_w, bg_h),
        BOX_COLOR,
    );

    draw_hollow_rect_mut(img, Rect::at(x1, y1).of_size(w, h), BOX_COLOR);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(img, Rect::at(x1 + 1, y1 + 1).of_size(w - 2, h - 2), BOX_COLOR);
    }

    draw_text(
        img,
        &label,
        x1,
        y1 - GLYPH_HEIGHT as i32 - 2,
        TEXT_COLOR,
    );
}

fn draw_text(img: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let mut cx = x;
    for ch in text.chars() {
        if let Some(rows) = glyph_rows(ch) {
            for (dy, bits) in rows.iter().enumerate() {
                for dx in 0..GLYPH_WIDTH {
                    if (bits >> (7 - dx)) & 1 == 1 {
                        let px = cx + dx as i32;
                        let py = y + dy as i32;
                        if px >= 0
                            && py >= 0
                            && (px as u32) < img.width()
                            && (py as u32) < img.height()
                        {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        cx += GLYPH_WIDTH as i32;
    }
}

/// 8x12 row bitmaps, MSB leftmost. Uppercase folds onto the lowercase
/// shapes; unknown characters advance the cursor without ink.
fn glyph_rows(ch: char) -> Option<[u8; 12]> {
    let rows = match ch.to_ascii_lowercase() {
        'a' => [0x00, 0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'b' => [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x62, 0x5C, 0x00, 0x00],
        'c' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'd' => [0x00, 0x02, 0x02, 0x3A, 0x46, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'e' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'f' => [0x00, 0x0C, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00],
        'g' => [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x3C, 0x00, 0x00],
        'h' => [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'i' => [0x00, 0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        'j' => [0x00, 0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x44, 0x38, 0x00, 0x00],
        'k' => [0x00, 0x40, 0x40, 0x44, 0x48, 0x70, 0x48, 0x44, 0x42, 0x41, 0x00, 0x00],
        'l' => [0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        'm' => [0x00, 0x00, 0x00, 0x76, 0x49, 0x49, 0x49, 0x49, 0x49, 0x49, 0x00, 0x00],
        'n' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'o' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        'p' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x62, 0x5C, 0x40, 0x40, 0x00, 0x00],
        'q' => [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x02, 0x00, 0x00],
        'r' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
        's' => [0x00, 0x00, 0x00, 0x3E, 0x40, 0x3C, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        't' => [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x0C, 0x00, 0x00],
        'u' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'v' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x24, 0x24, 0x18, 0x18, 0x00, 0x00],
        'w' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x5A, 0x66, 0x42, 0x42, 0x00, 0x00],
        'x' => [0x00, 0x00, 0x00, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x42, 0x00, 0x00],
        'y' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x26, 0x1A, 0x02, 0x3C, 0x00, 0x00],
        'z' => [0x00, 0x00, 0x00, 0x7E, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
        '0' => [0x00, 0x3C, 0x42, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '1' => [0x00, 0x08, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        '2' => [0x00, 0x3C, 0x42, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
        '3' => [0x00, 0x3C, 0x42, 0x02, 0x1C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '4' => [0x00, 0x04, 0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x04, 0x00, 0x00],
        '5' => [0x00, 0x7E, 0x40, 0x40, 0x7C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '6' => [0x00, 0x1C, 0x20, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '7' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x08, 0x10, 0x10, 0x20, 0x20, 0x00, 0x00],
        '8' => [0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '9' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x04, 0x08, 0x70, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00],
        ':' => [0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00],
        ' ' => [0x00; 12],
        _ => return None,
    };
    Some(rows)
}

// ----------- tests -----------
