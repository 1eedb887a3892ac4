pub mod cross_entropy2d;

pub use cross_entropy2d::{cross_entropy2d, cross_entropy2d_sum, PixelLoss};
