pub mod matrix;
pub mod feature_map;

pub use matrix::Matrix;
pub use feature_map::FeatureMap;
