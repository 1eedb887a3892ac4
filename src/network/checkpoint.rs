use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Result, SegError};
use crate::network::model::SegmentationModel;

/// Run details stored next to the weights so a checkpoint file is
/// self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub arch: String,
    pub dataset: String,
    pub n_classes: usize,
    pub feature_scale: usize,
    pub img_rows: usize,
    pub img_cols: usize,
    /// 0-based epoch after which the snapshot was taken.
    pub epoch: usize,
    pub avg_loss: f64,
}

impl CheckpointMetadata {
    /// `<arch>_<dataset>_<feature_scale>_<epoch>.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}_{}.json", self.arch, self.dataset, self.feature_scale, self.epoch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,
    pub model: SegmentationModel,
}

impl Checkpoint {
    /// Serializes the checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| SegError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|source| SegError::Json { path: path.to_path_buf(), source })
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let file = std::fs::File::open(path).map_err(|e| SegError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|source| SegError::Json { path: path.to_path_buf(), source })
    }
}

/// Writes `model` into `dir` under the name derived from `metadata`,
/// creating the directory if needed. Returns the path written.
pub fn save_checkpoint(model: &SegmentationModel, metadata: CheckpointMetadata, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SegError::io(dir, e))?;
    let path = dir.join(metadata.file_name());
    let checkpoint = Checkpoint { metadata, model: model.clone() };
    checkpoint.save_json(&path)?;
    Ok(path)
}
