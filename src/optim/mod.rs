pub mod adam;
pub mod schedule;
pub mod sgd;

use crate::layers::Param;

pub use adam::Adam;
pub use schedule::LrSchedule;
pub use sgd::Sgd;

/// Applies one update to every parameter from its accumulated gradient.
pub trait Optimizer {
    fn step(&mut self, params: Vec<Param<'_>>);
    fn learning_rate(&self) -> f64;
    fn set_learning_rate(&mut self, lr: f64);
}
