//! Canvas alignment and pixel counting
//!
//! Two captures of different size are laid on a common canvas of the larger
//! width and height. Out-of-bounds pixels take the image's own top-left pixel
//! (its page background), so growing or shrinking over a uniform background
//! does not register. Nothing is ever resampled.

use image::{Rgba, RgbaImage};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const MASK_CHANGED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Decode PNG/JPEG bytes, `None` when the bytes are not an image we read
pub fn decode(bytes: &[u8]) -> Option<RgbaImage> {
    image::load_from_memory(bytes).ok().map(|img| img.to_rgba8())
}

/// `{w}x{h}:{crc32}` over decoded RGBA pixels
pub fn image_digest(bytes: &[u8]) -> Option<String> {
    decode(bytes).map(|img| digest_of(&img))
}

pub fn digest_of(img: &RgbaImage) -> String {
    let crc = crc32fast::hash(img.as_raw());
    format!("{}x{}:{:08x}", img.width(), img.height(), crc)
}

fn background(img: &RgbaImage) -> Rgba<u8> {
    img.get_pixel_checked(0, 0).copied().unwrap_or(TRANSPARENT)
}

fn padded(img: &RgbaImage, x: u32, y: u32, fill: Rgba<u8>) -> Rgba<u8> {
    img.get_pixel_checked(x, y).copied().unwrap_or(fill)
}

fn differs(a: Rgba<u8>, b: Rgba<u8>, tolerance: u8) -> bool {
    a.0.iter()
        .zip(b.0.iter())
        .any(|(x, y)| x.abs_diff(*y) > tolerance)
}

fn canvas_size(old: &RgbaImage, new: &RgbaImage) -> (u32, u32) {
    (old.width().max(new.width()), old.height().max(new.height()))
}

/// Returns `(changed, total)` over the common canvas
pub fn count_changed(old: &RgbaImage, new: &RgbaImage, tolerance: u8) -> (u64, u64) {
    let (width, height) = canvas_size(old, new);
    let (old_fill, new_fill) = (background(old), background(new));

    let mut changed = 0u64;
    for y in 0..height {
        for x in 0..width {
            if differs(padded(old, x, y, old_fill), padded(new, x, y, new_fill), tolerance) {
                changed += 1;
            }
        }
    }

    (changed, width as u64 * height as u64)
}

/// Red-on-transparent mask of differing pixels, for debug output
pub fn diff_mask(old: &RgbaImage, new: &RgbaImage, tolerance: u8) -> RgbaImage {
    let (width, height) = canvas_size(old, new);
    let (old_fill, new_fill) = (background(old), background(new));

    RgbaImage::from_fn(width, height, |x, y| {
        if differs(padded(old, x, y, old_fill), padded(new, x, y, new_fill), tolerance) {
            MASK_CHANGED
        } else {
            TRANSPARENT
        }
    })
}
