pub mod camvid;
pub mod loader;
pub mod palette;
pub mod pascal;
pub mod sample;
pub mod transform;

use std::path::Path;

use image::RgbImage;
use serde::{Serialize, Deserialize};

use crate::error::Result;

pub use camvid::CamVid;
pub use loader::DataLoader;
pub use pascal::PascalVoc;
pub use sample::{LabelMap, Sample, IGNORE_INDEX};

/// A labeled image collection whose samples are already resized and
/// normalized to a fixed `image_size`.
pub trait SegmentationDataset: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn n_classes(&self) -> usize;

    /// `(rows, cols)` of every sample.
    fn image_size(&self) -> (usize, usize);

    fn get(&self, index: usize) -> Result<Sample>;

    /// Colorizes a label map with this dataset's palette.
    fn decode_segmap(&self, labels: &LabelMap) -> RgbImage;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Pascal,
    Camvid,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Pascal => "pascal",
            DatasetKind::Camvid => "camvid",
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens the dataset of `kind` rooted at `root`.
pub fn get_loader(
    kind: DatasetKind,
    root: &Path,
    split: &str,
    img_size: (usize, usize),
) -> Result<Box<dyn SegmentationDataset>> {
    Ok(match kind {
        DatasetKind::Pascal => Box::new(PascalVoc::new(root, split, img_size)?),
        DatasetKind::Camvid => Box::new(CamVid::new(root, split, img_size)?),
    })
}
