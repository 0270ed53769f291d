use std::path::Path;

use log::debug;
use ndarray::Array4;

use super::{IMAGE_SIDE, Normalization};
use crate::{MlErr, Result};

/// Reads a `28x28` digit bitmap into a single sample batch.
///
/// Color images are converted to grayscale first, a bitmap whose three channels mirror the same
/// value reads the same as a grayscale one.
///
/// # Arguments
/// * `path` - The path of the image, any format the `image` crate was built with.
/// * `normalization` - The same preprocessing the model's corpus went through.
///
/// # Returns
/// A `(1, 1, 28, 28)` tensor, or an error if the file can't be decoded or has the wrong size.
pub fn read_bitmap<P: AsRef<Path>>(path: P, normalization: Normalization) -> Result<Array4<f32>> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|e| MlErr::DataUnavailable(format!("{}: {e}", path.display())))?
        .to_luma8();

    let (width, height) = image.dimensions();
    if (width as usize, height as usize) != (IMAGE_SIDE, IMAGE_SIDE) {
        return Err(MlErr::ShapeMismatch {
            what: "bitmap",
            got: vec![height as usize, width as usize],
            expected: format!("[{IMAGE_SIDE}, {IMAGE_SIDE}]"),
        });
    }

    debug!("read bitmap {}", path.display());

    let values = image.pixels().map(|p| normalization.apply(p.0[0])).collect();
    Array4::from_shape_vec((1, 1, IMAGE_SIDE, IMAGE_SIDE), values).map_err(|_| {
        MlErr::SizeMismatch {
            what: "bitmap pixels",
            got: image.len(),
            expected: IMAGE_SIDE * IMAGE_SIDE,
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    #[test]
    fn grayscale_bitmaps_are_read_row_major() {
        let dir = env::temp_dir().join("machine_learning_bitmap_gray");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("digit.bmp");

        let mut image = GrayImage::new(28, 28);
        image.put_pixel(3, 1, Luma([255]));
        image.save(&path).unwrap();

        let x = read_bitmap(&path, Normalization::Normalized).unwrap();

        assert_eq!(x.dim(), (1, 1, 28, 28));
        assert_eq!(x[[0, 0, 1, 3]], 1.);
        assert_eq!(x.sum(), 1.);
    }

    #[test]
    fn mirrored_color_bitmaps_read_as_gray() {
        let dir = env::temp_dir().join("machine_learning_bitmap_rgb");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("digit.bmp");

        let image = RgbImage::from_pixel(28, 28, Rgb([200, 200, 200]));
        image.save(&path).unwrap();

        let x = read_bitmap(&path, Normalization::Raw).unwrap();

        assert!(x.iter().all(|&v| (v - 200.).abs() <= 1.));
    }

    #[test]
    fn wrong_size_is_a_shape_mismatch() {
        let dir = env::temp_dir().join("machine_learning_bitmap_size");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("digit.png");

        GrayImage::new(32, 28).save(&path).unwrap();

        let err = read_bitmap(&path, Normalization::Raw).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { what: "bitmap", .. }));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let path = env::temp_dir().join("machine_learning_no_such_bitmap.bmp");

        let err = read_bitmap(&path, Normalization::Raw).unwrap_err();
        assert!(matches!(err, MlErr::DataUnavailable(_)));
    }
}
