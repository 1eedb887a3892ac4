use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SegError>;

/// Errors produced by the library. The binary wraps these in `anyhow`.
#[derive(Debug, Error)]
pub enum SegError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no data_path for dataset '{dataset}' in {config}")]
    MissingDataPath { dataset: String, config: PathBuf },
    #[error("data loader: {0}")]
    Loader(String),
    #[error("dataset at {0} contains no samples")]
    EmptyDataset(PathBuf),
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },
    #[error("label {label} out of range for {n_classes} classes")]
    LabelOutOfRange { label: u8, n_classes: usize },
    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),
    #[error("invalid training config: {0}")]
    InvalidConfig(String),
    #[error("dashboard: {0}")]
    Dashboard(String),
}

impl SegError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SegError::Io { path: path.into(), source }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        SegError::Image { path: path.into(), source }
    }
}
