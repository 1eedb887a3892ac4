use image::{Rgb, RgbImage};

use crate::data::sample::{LabelMap, IGNORE_INDEX};

/// Standard PASCAL VOC colormap for the first `n` classes.
///
/// Class `i` takes its bits three at a time, spreading them from the
/// most significant end of each of the R, G and B channels.
pub fn pascal_palette(n: usize) -> Vec<[u8; 3]> {
    (0..n)
        .map(|class| {
            let (mut r, mut g, mut b) = (0u8, 0u8, 0u8);
            let mut c = class;
            for shift in (0..8).rev() {
                r |= ((c & 1) as u8) << shift;
                g |= (((c >> 1) & 1) as u8) << shift;
                b |= (((c >> 2) & 1) as u8) << shift;
                c >>= 3;
            }
            [r, g, b]
        })
        .collect()
}

/// CamVid 11 classes plus "unlabelled".
pub const CAMVID_PALETTE: [[u8; 3]; 12] = [
    [128, 128, 128], // sky
    [128, 0, 0],     // building
    [192, 192, 128], // pole
    [128, 64, 128],  // road
    [60, 40, 222],   // pavement
    [128, 128, 0],   // tree
    [192, 128, 128], // sign / symbol
    [64, 64, 128],   // fence
    [64, 0, 128],    // car
    [64, 64, 0],     // pedestrian
    [0, 128, 192],   // bicyclist
    [0, 0, 0],       // unlabelled
];

/// Renders a label map as a color image. Ignored and unknown labels are black.
pub fn decode_segmap(labels: &LabelMap, palette: &[[u8; 3]]) -> RgbImage {
    let mut img = RgbImage::new(labels.width as u32, labels.height as u32);
    for (i, px) in img.pixels_mut().enumerate() {
        let label = labels.data[i];
        let color = if label == IGNORE_INDEX {
            [0, 0, 0]
        } else {
            palette.get(label as usize).copied().unwrap_or([0, 0, 0])
        };
        *px = Rgb(color);
    }
    img
}

/// Maps a color-coded mask back to class indices. Colors absent from the
/// palette become `IGNORE_INDEX`.
pub fn encode_segmap(mask: &RgbImage, palette: &[[u8; 3]]) -> LabelMap {
    let data = mask
        .pixels()
        .map(|px| {
            palette
                .iter()
                .position(|c| *c == px.0)
                .map(|i| i as u8)
                .unwrap_or(IGNORE_INDEX)
        })
        .collect();
    LabelMap::from_vec(mask.height() as usize, mask.width() as usize, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_palette_matches_known_colors() {
        let p = pascal_palette(21);
        assert_eq!(p[0], [0, 0, 0]);
        assert_eq!(p[1], [128, 0, 0]);
        assert_eq!(p[15], [192, 128, 128]); // person
        assert_eq!(p[20], [0, 64, 128]);
    }

    #[test]
    fn encode_marks_boundary_color_ignored() {
        let palette = pascal_palette(21);
        let mut mask = RgbImage::new(2, 1);
        mask.put_pixel(0, 0, Rgb([128, 0, 0]));
        mask.put_pixel(1, 0, Rgb([224, 224, 192]));
        let labels = encode_segmap(&mask, &palette);
        assert_eq!(labels.data, vec![1, IGNORE_INDEX]);

        let back = decode_segmap(&labels, &palette);
        assert_eq!(back.get_pixel(0, 0).0, [128, 0, 0]);
        assert_eq!(back.get_pixel(1, 0).0, [0, 0, 0]);
    }
}
