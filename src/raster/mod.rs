//! Raster primitives shared by the segmentation stages.
//!
//! Everything operates on 8-bit grayscale (`image::GrayImage`). Binary
//! masks use 255 for foreground (ink) and 0 for background, the polarity an
//! inverse threshold produces on dark-on-light newsprint.

pub mod profile;

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::geometry::PixelRect;

/// White in 8-bit grayscale.
pub const WHITE: Luma<u8> = Luma([255]);

/// Foreground value in binary masks.
pub const INK: Luma<u8> = Luma([255]);

/// Inverse binary threshold: pixels at or below `threshold` become 255,
/// everything brighter becomes 0.
pub fn binarize_inverse(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        dst.0[0] = if src.0[0] > threshold { 0 } else { 255 };
    }
    out
}

/// Binary dilation with a `kernel_w` x `kernel_h` rectangular structuring
/// element, repeated `iterations` times.
///
/// The rectangle is separable, so each pass is a horizontal then a vertical
/// sliding-window maximum. `imageproc::morphology` only offers square and
/// diamond norms, or arbitrary masks at per-pixel mask cost.
pub fn dilate_rect(binary: &GrayImage, kernel_w: u32, kernel_h: u32, iterations: u32) -> GrayImage {
    let (w, h) = (binary.width() as usize, binary.height() as usize);
    if w == 0 || h == 0 {
        return binary.clone();
    }
    let mut current = binary.as_raw().clone();
    let mut scratch = vec![0u8; w * h];
    for _ in 0..iterations {
        dilate_horizontal(&current, &mut scratch, w, h, kernel_w as usize);
        dilate_vertical(&scratch, &mut current, w, h, kernel_h as usize);
    }
    GrayImage::from_raw(w as u32, h as u32, current).unwrap_or_else(|| binary.clone())
}

fn dilate_horizontal(input: &[u8], output: &mut [u8], w: usize, h: usize, kernel_w: usize) {
    if kernel_w <= 1 {
        output.copy_from_slice(input);
        return;
    }
    let r_left = kernel_w / 2;
    let r_right = kernel_w - 1 - r_left;

    for y in 0..h {
        let row = y * w;
        let mut count = 0usize;
        for x in 0..=r_right.min(w - 1) {
            if input[row + x] > 0 {
                count += 1;
            }
        }
        for x in 0..w {
            output[row + x] = if count > 0 { 255 } else { 0 };
            let enter = x + r_right + 1;
            if enter < w && input[row + enter] > 0 {
                count += 1;
            }
            if x >= r_left && input[row + x - r_left] > 0 {
                count -= 1;
            }
        }
    }
}

fn dilate_vertical(input: &[u8], output: &mut [u8], w: usize, h: usize, kernel_h: usize) {
    if kernel_h <= 1 {
        output.copy_from_slice(input);
        return;
    }
    let r_top = kernel_h / 2;
    let r_bot = kernel_h - 1 - r_top;

    for x in 0..w {
        let mut count = 0usize;
        for y in 0..=r_bot.min(h - 1) {
            if input[y * w + x] > 0 {
                count += 1;
            }
        }
        for y in 0..h {
            output[y * w + x] = if count > 0 { 255 } else { 0 };
            let enter = y + r_bot + 1;
            if enter < h && input[enter * w + x] > 0 {
                count += 1;
            }
            if y >= r_top && input[(y - r_top) * w + x] > 0 {
                count -= 1;
            }
        }
    }
}

/// Bounding boxes of the outermost foreground contours of a binary mask.
///
/// Contours nested inside holes of another contour are not reported.
pub fn external_boxes(binary: &GrayImage) -> Vec<PixelRect> {
    find_contours::<u32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|contour| {
            let mut points = contour.points.iter();
            let first = points.next()?;
            let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
            for p in points {
                x0 = x0.min(p.x);
                y0 = y0.min(p.y);
                x1 = x1.max(p.x);
                y1 = y1.max(p.y);
            }
            Some(PixelRect::from_corners(x0, y0, x1 + 1, y1 + 1))
        })
        .collect()
}

/// Paint `rect` (clipped to the image) with `color`.
pub fn fill_rect(image: &mut GrayImage, rect: PixelRect, color: Luma<u8>) {
    let rect = rect.clipped(image.width(), image.height());
    if rect.is_empty() {
        return;
    }
    draw_filled_rect_mut(
        image,
        Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
        color,
    );
}

/// Paint `rect` white, keeping image dimensions and coordinates stable.
pub fn fill_white(image: &mut GrayImage, rect: PixelRect) {
    fill_rect(image, rect, WHITE);
}

/// Copy out the pixels under `rect` (clipped to the image).
pub fn crop(image: &GrayImage, rect: PixelRect) -> GrayImage {
    let rect = rect.clipped(image.width(), image.height());
    imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Keep only rows `from_row..` of the image.
pub fn crop_rows_from(image: &GrayImage, from_row: u32) -> GrayImage {
    let from_row = from_row.min(image.height());
    crop(
        image,
        PixelRect::new(0, from_row, image.width(), image.height() - from_row),
    )
}

/// Keep only rows `..to_row` of the image.
pub fn crop_rows_to(image: &GrayImage, to_row: u32) -> GrayImage {
    crop(image, PixelRect::new(0, 0, image.width(), to_row.min(image.height())))
}

/// Photometric negative of an image.
pub fn inverted(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    imageops::invert(&mut out);
    out
}

/// Copy `src` onto `canvas` with its top-left corner at (`x`, `y`).
pub fn paste(canvas: &mut GrayImage, src: &GrayImage, x: u32, y: u32) {
    imageops::replace(canvas, src, x as i64, y as i64);
}

/// A white raster of the given size.
pub fn white_canvas(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, WHITE)
}
