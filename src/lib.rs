pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod config;
pub mod dashboard;
pub mod train;
pub mod cli;
pub mod error;

// Convenience re-exports
pub use math::{FeatureMap, Matrix};
pub use activation::activation::ActivationFunction;
pub use layers::Layer;
pub use network::{get_model, Architecture, SegmentationModel};
pub use loss::cross_entropy2d;
pub use optim::{Adam, Optimizer, Sgd};
pub use data::{get_loader, DatasetKind, SegmentationDataset};
pub use dashboard::{DashboardServer, NullVisualizer, Visualizer};
pub use train::{train_loop, EpochStats, TrainConfig};
pub use error::{Result, SegError};
