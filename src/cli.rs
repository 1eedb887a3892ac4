use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::get_data_path;
use crate::dashboard::{DashboardServer, NullVisualizer, Visualizer};
use crate::data::{get_loader, DatasetKind};
use crate::network::{get_model, Architecture};
use crate::optim::{Adam, LrSchedule, Optimizer, Sgd};
use crate::train::{train_loop, TrainConfig};

/// Adam runs at this multiple of `--l-rate`.
pub const ADAM_LR_SCALE: f64 = 100.0;
pub const SGD_MOMENTUM: f64 = 0.99;
pub const SGD_WEIGHT_DECAY: f64 = 5e-4;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Constant,
    Poly,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ferrite-seg", about = "Train a semantic-segmentation network")]
pub struct TrainArgs {
    /// Architecture to use.
    #[arg(long, value_enum, default_value_t = Architecture::Fcn)]
    pub arch: Architecture,
    /// Dataset to use.
    #[arg(long, value_enum, default_value_t = DatasetKind::Pascal)]
    pub dataset: DatasetKind,
    /// Height of the input image.
    #[arg(long, default_value_t = 256)]
    pub img_rows: usize,
    /// Width of the input image.
    #[arg(long, default_value_t = 256)]
    pub img_cols: usize,
    /// Number of epochs.
    #[arg(long, default_value_t = 100)]
    pub n_epoch: usize,
    /// Batch size.
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,
    /// Base learning rate (Adam runs at 100x this).
    #[arg(long, default_value_t = 1e-5)]
    pub l_rate: f64,
    /// Divider for the number of features per layer.
    #[arg(long, default_value_t = 1)]
    pub feature_scale: usize,
    /// Optimizer.
    #[arg(long, value_enum, default_value_t = OptimizerKind::Adam)]
    pub optimizer: OptimizerKind,
    /// Learning-rate schedule.
    #[arg(long, value_enum, default_value_t = ScheduleKind::Constant)]
    pub lr_schedule: ScheduleKind,
    /// JSON file mapping dataset names to their root directories.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,
    /// Dataset root; skips the config file lookup.
    #[arg(long)]
    pub data_path: Option<PathBuf>,
    /// Dataset split to train on.
    #[arg(long, default_value = "train")]
    pub split: String,
    /// Directory for per-epoch checkpoints.
    #[arg(long, default_value = ".")]
    pub checkpoint_dir: PathBuf,
    /// Background threads decoding upcoming batches; 0 loads on the
    /// training thread.
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,
    /// Batches between progress log lines.
    #[arg(long, default_value_t = 20)]
    pub log_interval: usize,
    /// RNG seed for weight init and shuffling.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Dashboard bind address.
    #[arg(long, default_value = "127.0.0.1:8097")]
    pub dashboard_addr: String,
    /// Do not start the dashboard.
    #[arg(long)]
    pub no_dashboard: bool,
    /// Stop the dashboard and exit once training ends, instead of serving
    /// the final results until interrupted.
    #[arg(long)]
    pub exit_when_done: bool,
}

impl TrainArgs {
    pub fn train_config(&self) -> TrainConfig {
        let base_lr = match self.optimizer {
            OptimizerKind::Adam => self.l_rate * ADAM_LR_SCALE,
            OptimizerKind::Sgd => self.l_rate,
        };
        let mut config = TrainConfig::new(self.n_epoch, self.batch_size, base_lr);
        config.num_workers = self.num_workers;
        config.log_interval = self.log_interval;
        config.schedule = match self.lr_schedule {
            ScheduleKind::Constant => LrSchedule::Constant,
            ScheduleKind::Poly => LrSchedule::poly(),
        };
        config.checkpoint_dir = self.checkpoint_dir.clone();
        config.run_arch = self.arch.to_string();
        config.run_dataset = self.dataset.to_string();
        config.feature_scale = self.feature_scale;
        config
    }

    pub fn build_optimizer(&self, base_lr: f64) -> Box<dyn Optimizer> {
        match self.optimizer {
            OptimizerKind::Adam => Box::new(Adam::new(base_lr)),
            OptimizerKind::Sgd => Box::new(Sgd::new(base_lr).with_momentum(SGD_MOMENTUM, SGD_WEIGHT_DECAY)),
        }
    }
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let config = args.train_config();
    config.validate()?;

    let img_size = (args.img_rows, args.img_cols);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Validate the model against the image size before touching the data.
    let n_classes = match args.dataset {
        DatasetKind::Pascal => crate::data::pascal::PASCAL_CLASSES,
        DatasetKind::Camvid => crate::data::camvid::CAMVID_CLASSES,
    };
    let mut model = get_model(args.arch, n_classes, args.feature_scale, img_size, &mut rng)?;

    let data_path = match &args.data_path {
        Some(p) => p.clone(),
        None => get_data_path(args.dataset.as_str(), &args.config)
            .with_context(|| format!("resolving data path for {}", args.dataset))?,
    };

    let dataset = get_loader(args.dataset, &data_path, &args.split, img_size)
        .with_context(|| format!("loading {} from {}", args.dataset, data_path.display()))?;

    let mut optimizer = args.build_optimizer(config.base_lr);

    let mut dashboard = if args.no_dashboard {
        None
    } else {
        DashboardServer::start(&args.dashboard_addr)
            .map_err(|e| log::warn!("{}; continuing without dashboard", e))
            .ok()
    };
    let mut null = NullVisualizer::default();
    let visualizer: &mut dyn Visualizer = match dashboard.as_mut() {
        Some(server) => server,
        None => &mut null,
    };

    log::info!(
        "{} on {} ({} samples, {}x{}), {:?} lr {:e}",
        args.arch,
        args.dataset,
        dataset.len(),
        args.img_rows,
        args.img_cols,
        args.optimizer,
        config.base_lr
    );

    let history = train_loop(
        &mut model,
        dataset.as_ref(),
        optimizer.as_mut(),
        visualizer,
        &config,
        &mut rng,
    )?;

    if let Some(last) = history.last() {
        log::info!("finished: final avg loss {:.4}, last checkpoint {}", last.avg_loss, last.checkpoint.display());
    }

    if let Some(server) = dashboard {
        if args.exit_when_done {
            log::info!("shutting down dashboard at http://{}", server.addr());
        } else {
            serve_until_interrupted(&server);
        }
    }
    Ok(())
}

/// Keeps the process, and with it the dashboard, alive after training so
/// the final curves stay viewable. Ends only when the process is killed.
fn serve_until_interrupted(server: &DashboardServer) -> ! {
    log::info!("training done; dashboard still serving at http://{} (Ctrl-C to exit)", server.addr());
    loop {
        std::thread::park();
    }
}
