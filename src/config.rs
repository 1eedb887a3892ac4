//! Dataset location lookup.
//!
//! Dataset roots live in a small JSON file rather than on the command line
//! so that one machine-specific file serves every run:
//!
//! ```json
//! { "pascal": { "data_path": "/data/VOCdevkit/VOC2012" },
//!   "camvid": { "data_path": "/data/CamVid" } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Result, SegError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub data_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPathConfig {
    pub datasets: BTreeMap<String, DatasetEntry>,
}

impl DataPathConfig {
    pub fn load_json(path: &Path) -> Result<DataPathConfig> {
        let file = std::fs::File::open(path).map_err(|e| SegError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|source| SegError::Json { path: path.to_path_buf(), source })
    }

    pub fn data_path(&self, dataset: &str) -> Option<&Path> {
        self.datasets.get(dataset).map(|e| e.data_path.as_path())
    }
}

/// Resolves the root directory of `dataset` from the config file at
/// `config_path`.
pub fn get_data_path(dataset: &str, config_path: &Path) -> Result<PathBuf> {
    let config = DataPathConfig::load_json(config_path)?;
    config
        .data_path(dataset)
        .map(Path::to_path_buf)
        .ok_or_else(|| SegError::MissingDataPath {
            dataset: dataset.to_owned(),
            config: config_path.to_path_buf(),
        })
}
