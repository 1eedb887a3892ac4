use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::data::palette::{decode_segmap, CAMVID_PALETTE};
use crate::data::sample::{LabelMap, Sample};
use crate::data::transform::{transform_image, transform_labels};
use crate::data::SegmentationDataset;
use crate::error::{Result, SegError};

pub const CAMVID_CLASSES: usize = 12;

/// CamVid in the SegNet tutorial layout: images in `<root>/<split>/` and
/// single-channel index masks with identical file names in
/// `<root>/<split>annot/`.
pub struct CamVid {
    image_dir: PathBuf,
    annot_dir: PathBuf,
    files: Vec<String>,
    img_size: (usize, usize),
}

impl CamVid {
    pub fn new(root: &Path, split: &str, img_size: (usize, usize)) -> Result<CamVid> {
        let image_dir = root.join(split);
        let annot_dir = root.join(format!("{}annot", split));

        let entries = std::fs::read_dir(&image_dir).map_err(|e| SegError::io(&image_dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SegError::io(&image_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_ascii_lowercase().ends_with(".png") {
                files.push(name);
            }
        }
        // read_dir order is platform-dependent; index 0 must be stable
        files.sort();

        if files.is_empty() {
            return Err(SegError::EmptyDataset(image_dir));
        }
        log::info!("camvid {}: {} images from {}", split, files.len(), root.display());

        Ok(CamVid { image_dir, annot_dir, files, img_size })
    }
}

impl SegmentationDataset for CamVid {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn n_classes(&self) -> usize {
        CAMVID_CLASSES
    }

    fn image_size(&self) -> (usize, usize) {
        self.img_size
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let name = &self.files[index];
        let img_path = self.image_dir.join(name);
        let annot_path = self.annot_dir.join(name);

        let img = image::open(&img_path).map_err(|e| SegError::image(&img_path, e))?.to_rgb8();
        let annot = image::open(&annot_path).map_err(|e| SegError::image(&annot_path, e))?.to_luma8();

        let (rows, cols) = self.img_size;
        Ok(Sample {
            image: transform_image(&img, rows, cols),
            labels: transform_labels(&annot, rows, cols),
        })
    }

    fn decode_segmap(&self, labels: &LabelMap) -> RgbImage {
        decode_segmap(labels, &CAMVID_PALETTE)
    }
}
