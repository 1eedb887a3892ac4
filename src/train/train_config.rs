use std::path::PathBuf;

use crate::error::{Result, SegError};
use crate::optim::LrSchedule;

/// Configuration for a `train_loop` run.
///
/// - `base_lr`       — learning rate handed to the schedule; the optimizer
///                     receives `schedule(base_lr, iter, max_iter)` each batch
/// - `log_interval`  — one progress line every this many batches
/// - `run_*`         — name parts for checkpoint files,
///                     `<arch>_<dataset>_<feature_scale>_<epoch>.json`
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub n_epoch: usize,
    pub batch_size: usize,
    pub num_workers: usize,
    pub shuffle: bool,
    pub log_interval: usize,
    pub base_lr: f64,
    pub schedule: LrSchedule,
    pub checkpoint_dir: PathBuf,
    pub run_arch: String,
    pub run_dataset: String,
    pub feature_scale: usize,
}

impl TrainConfig {
    /// Creates a config with shuffling on, a constant learning rate, one
    /// loader thread and checkpoints in the working directory.
    pub fn new(n_epoch: usize, batch_size: usize, base_lr: f64) -> Self {
        TrainConfig {
            n_epoch,
            batch_size,
            num_workers: 1,
            shuffle: true,
            log_interval: 20,
            base_lr,
            schedule: LrSchedule::Constant,
            checkpoint_dir: PathBuf::from("."),
            run_arch: "model".into(),
            run_dataset: "data".into(),
            feature_scale: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_epoch == 0 {
            return Err(SegError::InvalidConfig("n_epoch must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(SegError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.log_interval == 0 {
            return Err(SegError::InvalidConfig("log_interval must be at least 1".into()));
        }
        if !(self.base_lr.is_finite() && self.base_lr > 0.0) {
            return Err(SegError::InvalidConfig(format!("learning rate must be positive, got {}", self.base_lr)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_non_positive_values() {
        assert!(TrainConfig::new(1, 1, 1e-3).validate().is_ok());
        assert!(TrainConfig::new(0, 1, 1e-3).validate().is_err());
        assert!(TrainConfig::new(1, 0, 1e-3).validate().is_err());
        assert!(TrainConfig::new(1, 1, 0.0).validate().is_err());
        assert!(TrainConfig::new(1, 1, f64::NAN).validate().is_err());

        let mut quiet = TrainConfig::new(1, 1, 1e-3);
        quiet.log_interval = 0;
        assert!(matches!(quiet.validate(), Err(SegError::InvalidConfig(m)) if m.contains("log_interval")));
    }
}
