use serde::{Serialize, Deserialize};

use crate::math::FeatureMap;

/// Label value for pixels that take no part in the loss (object boundaries,
/// "void" regions).
pub const IGNORE_INDEX: u8 = 255;

/// Per-pixel class indices, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl LabelMap {
    /// Panics if `data.len() != height * width`.
    pub fn from_vec(height: usize, width: usize, data: Vec<u8>) -> LabelMap {
        assert_eq!(data.len(), height * width, "label buffer does not match {}x{}", height, width);
        LabelMap { height, width, data }
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// One transformed training example.
#[derive(Debug, Clone)]
pub struct Sample {
    /// 3 x H x W, mean-subtracted and scaled.
    pub image: FeatureMap,
    pub labels: LabelMap,
}
