//! Synthetic image fixtures for the unit test suite.
//!
//! Everything is generated on the fly with the `image` crate so tests do not
//! depend on binary fixtures checked into the repo.

use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write an RGBA PNG whose even columns are fully transparent.
pub fn create_test_png_with_alpha(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        Rgba([200, (x % 256) as u8, 40, if x % 2 == 0 { 0 } else { 255 }])
    });
    DynamicImage::ImageRgba8(img).save(path).unwrap();
}

/// Write bytes that carry an image extension but cannot be decoded.
pub fn create_garbage_image(path: &Path) {
    std::fs::write(path, b"this is not an image").unwrap();
}

/// Decode an image file, sniffing the format from its content.
pub fn decode(path: &Path) -> DynamicImage {
    image::ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .decode()
        .unwrap()
}

/// File names in a directory, sorted.
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
