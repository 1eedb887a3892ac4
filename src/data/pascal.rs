use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::data::palette::{decode_segmap, encode_segmap, pascal_palette};
use crate::data::sample::{LabelMap, Sample};
use crate::data::transform::{resize_mask, transform_image};
use crate::data::SegmentationDataset;
use crate::error::{Result, SegError};

pub const PASCAL_CLASSES: usize = 21;

/// PASCAL VOC 2012 segmentation split.
///
/// Layout under `root`:
/// - `ImageSets/Segmentation/<split>.txt` — one image id per line
/// - `JPEGImages/<id>.jpg`
/// - `SegmentationClass/<id>.png` — color-coded masks
pub struct PascalVoc {
    root: PathBuf,
    ids: Vec<String>,
    img_size: (usize, usize),
    palette: Vec<[u8; 3]>,
}

impl PascalVoc {
    pub fn new(root: &Path, split: &str, img_size: (usize, usize)) -> Result<PascalVoc> {
        let list = root.join("ImageSets").join("Segmentation").join(format!("{}.txt", split));
        let text = std::fs::read_to_string(&list).map_err(|e| SegError::io(&list, e))?;
        let ids: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        if ids.is_empty() {
            return Err(SegError::EmptyDataset(list));
        }
        log::info!("pascal {}: {} images from {}", split, ids.len(), root.display());

        Ok(PascalVoc {
            root: root.to_path_buf(),
            ids,
            img_size,
            palette: pascal_palette(PASCAL_CLASSES),
        })
    }
}

impl SegmentationDataset for PascalVoc {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn n_classes(&self) -> usize {
        PASCAL_CLASSES
    }

    fn image_size(&self) -> (usize, usize) {
        self.img_size
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let id = &self.ids[index];
        let img_path = self.root.join("JPEGImages").join(format!("{}.jpg", id));
        let mask_path = self.root.join("SegmentationClass").join(format!("{}.png", id));

        let img = image::open(&img_path).map_err(|e| SegError::image(&img_path, e))?.to_rgb8();
        let mask = image::open(&mask_path).map_err(|e| SegError::image(&mask_path, e))?.to_rgb8();

        let (rows, cols) = self.img_size;
        Ok(Sample {
            image: transform_image(&img, rows, cols),
            labels: encode_segmap(&resize_mask(&mask, rows, cols), &self.palette),
        })
    }

    fn decode_segmap(&self, labels: &LabelMap) -> RgbImage {
        decode_segmap(labels, &self.palette)
    }
}
