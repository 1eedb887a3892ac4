use std::path::PathBuf;

use serde::{Serialize, Deserialize};

/// Per-epoch summary returned by `train_loop`, one entry per completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Sum of batch losses divided by the number of batches.
    pub avg_loss: f64,
    pub batches: usize,
    /// Learning rate used for the last batch of the epoch.
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
    /// Where the end-of-epoch checkpoint was written.
    pub checkpoint: PathBuf,
}
