use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};

use crate::data::sample::LabelMap;
use crate::math::FeatureMap;

/// Per-channel RGB mean subtracted before scaling.
pub const MEAN_RGB: [f64; 3] = [122.67892, 116.66877, 104.00699];

/// Resizes to `rows x cols`, subtracts `MEAN_RGB`, divides by 255 and lays
/// the result out as a 3-channel CHW feature map.
pub fn transform_image(img: &RgbImage, rows: usize, cols: usize) -> FeatureMap {
    let resized = resize_rgb(img, rows, cols, FilterType::Triangle);
    let n = rows * cols;
    let mut fm = FeatureMap::zeros(3, rows, cols);
    for (p, px) in resized.pixels().enumerate() {
        for c in 0..3 {
            fm.data[c * n + p] = (px.0[c] as f64 - MEAN_RGB[c]) / 255.0;
        }
    }
    fm
}

/// Inverse of `transform_image`, for display.
pub fn untransform_image(fm: &FeatureMap) -> RgbImage {
    let n = fm.plane_len();
    let mut img = RgbImage::new(fm.width as u32, fm.height as u32);
    for (p, px) in img.pixels_mut().enumerate() {
        let mut rgb = [0u8; 3];
        for (c, v) in rgb.iter_mut().enumerate() {
            let raw = fm.data.get(c * n + p).copied().unwrap_or(0.0) * 255.0 + MEAN_RGB[c];
            *v = raw.round().clamp(0.0, 255.0) as u8;
        }
        *px = Rgb(rgb);
    }
    img
}

/// Nearest-neighbour resize so no new class values are invented.
pub fn transform_labels(labels: &GrayImage, rows: usize, cols: usize) -> LabelMap {
    let resized = if labels.width() as usize == cols && labels.height() as usize == rows {
        labels.clone()
    } else {
        imageops::resize(labels, cols as u32, rows as u32, FilterType::Nearest)
    };
    LabelMap::from_vec(rows, cols, resized.into_raw())
}

/// Nearest-neighbour resize of a color-coded mask, prior to palette lookup.
pub fn resize_mask(mask: &RgbImage, rows: usize, cols: usize) -> RgbImage {
    resize_rgb(mask, rows, cols, FilterType::Nearest)
}

fn resize_rgb(img: &RgbImage, rows: usize, cols: usize, filter: FilterType) -> RgbImage {
    if img.width() as usize == cols && img.height() as usize == rows {
        img.clone()
    } else {
        imageops::resize(img, cols as u32, rows as u32, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn transform_roundtrips_pixel_values() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([10, 200, 255]));
        let fm = transform_image(&img, 2, 2);
        assert_eq!((fm.channels, fm.height, fm.width), (3, 2, 2));
        assert!((fm.get(0, 0, 1) - (10.0 - MEAN_RGB[0]) / 255.0).abs() < 1e-12);
        assert_eq!(untransform_image(&fm), img);
    }

    #[test]
    fn label_resize_keeps_class_values() {
        let mut labels = GrayImage::new(4, 4);
        for (x, y, px) in labels.enumerate_pixels_mut() {
            *px = Luma([if x < 2 && y < 2 { 3 } else { 7 }]);
        }
        let small = transform_labels(&labels, 2, 2);
        assert_eq!(small.data.len(), 4);
        assert!(small.data.iter().all(|&v| v == 3 || v == 7));
        assert_eq!(small.get(0, 0), 3);
        assert_eq!(small.get(1, 1), 7);
    }
}
