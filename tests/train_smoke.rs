use image::RgbImage;
use rand::{rngs::StdRng, SeedableRng};

use ferrite_seg::dashboard::state::lock;
use ferrite_seg::dashboard::{DashboardServer, LineOptions, WindowId};
use ferrite_seg::data::palette::{decode_segmap, pascal_palette};
use ferrite_seg::data::{LabelMap, Sample};
use ferrite_seg::network::Checkpoint;
use ferrite_seg::{
    get_model, train_loop, Adam, Architecture, FeatureMap, Result, SegError, SegmentationDataset, Sgd,
    TrainConfig, Visualizer,
};

/// Left half class 0, right half class 1; the image encodes the class in
/// its first channel so the task is learnable.
struct Halves {
    len: usize,
    rows: usize,
    cols: usize,
}

impl SegmentationDataset for Halves {
    fn len(&self) -> usize {
        self.len
    }

    fn n_classes(&self) -> usize {
        2
    }

    fn image_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn get(&self, index: usize) -> Result<Sample> {
        let mut image = FeatureMap::zeros(3, self.rows, self.cols);
        let mut labels = vec![0u8; self.rows * self.cols];
        for y in 0..self.rows {
            for x in 0..self.cols {
                let class = (x >= self.cols / 2) as u8;
                labels[y * self.cols + x] = class;
                let i = image.index(0, y, x);
                image.data[i] = if class == 1 { 0.5 } else { -0.5 };
                let j = image.index(1, y, x);
                image.data[j] = 0.01 * index as f64;
            }
        }
        Ok(Sample { image, labels: LabelMap::from_vec(self.rows, self.cols, labels) })
    }

    fn decode_segmap(&self, labels: &LabelMap) -> RgbImage {
        decode_segmap(labels, &pascal_palette(2))
    }
}

#[derive(Default)]
struct Recorder {
    windows: Vec<LineOptions>,
    points: Vec<(usize, f64, f64)>,
    images: Vec<String>,
}

impl Visualizer for Recorder {
    fn line_window(&mut self, options: LineOptions) -> Result<WindowId> {
        self.windows.push(options);
        Ok(WindowId(self.windows.len() - 1))
    }

    fn append_line(&mut self, window: WindowId, x: f64, y: f64) -> Result<()> {
        self.points.push((window.0, x, y));
        Ok(())
    }

    fn image(&mut self, title: &str, _image: &RgbImage) -> Result<()> {
        self.images.push(title.to_owned());
        Ok(())
    }
}

/// Fails every call; training must carry on regardless.
struct Broken;

impl Visualizer for Broken {
    fn line_window(&mut self, _options: LineOptions) -> Result<WindowId> {
        Err(SegError::Dashboard("offline".into()))
    }

    fn append_line(&mut self, _window: WindowId, _x: f64, _y: f64) -> Result<()> {
        Err(SegError::Dashboard("offline".into()))
    }

    fn image(&mut self, _title: &str, _image: &RgbImage) -> Result<()> {
        Err(SegError::Dashboard("offline".into()))
    }
}

fn config(dir: &std::path::Path, n_epoch: usize, batch_size: usize) -> TrainConfig {
    let mut config = TrainConfig::new(n_epoch, batch_size, 1e-2);
    config.checkpoint_dir = dir.to_path_buf();
    config.run_arch = "fcn".into();
    config.run_dataset = "synthetic".into();
    config.feature_scale = 8;
    config.num_workers = 2;
    config.log_interval = 1;
    config
}

#[test]
fn two_epochs_post_plots_and_write_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Halves { len: 3, rows: 4, cols: 4 };
    let mut rng = StdRng::seed_from_u64(7);
    let mut model = get_model(Architecture::Fcn, 2, 8, (4, 4), &mut rng).unwrap();
    let mut optimizer = Adam::new(1e-2);
    let mut recorder = Recorder::default();

    let history = train_loop(
        &mut model,
        &dataset,
        &mut optimizer,
        &mut recorder,
        &config(dir.path(), 2, 2),
        &mut rng,
    )
    .unwrap();

    assert_eq!(history.len(), 2);
    for (i, stats) in history.iter().enumerate() {
        assert_eq!(stats.epoch, i + 1);
        assert_eq!(stats.batches, 2);
        assert!(stats.avg_loss.is_finite() && stats.avg_loss > 0.0);
    }

    assert_eq!(recorder.windows.len(), 1);
    assert_eq!(recorder.windows[0].title, "Training Loss");
    assert_eq!(recorder.points.len(), 2);
    assert_eq!(recorder.points[0].1, 0.0);
    assert_eq!(recorder.points[1].1, 1.0);
    assert_eq!(recorder.points[1].2, history[1].avg_loss);
    assert_eq!(
        recorder.images,
        vec!["Test Epoch0", "GT Epoch0", "Predicted Epoch0", "Predicted Epoch1"]
    );

    for epoch in 0..2 {
        let path = dir.path().join(format!("fcn_synthetic_8_{}.json", epoch));
        assert!(path.exists(), "missing {}", path.display());
        let checkpoint = Checkpoint::load_json(&path).unwrap();
        assert_eq!(checkpoint.metadata.epoch, epoch);
        assert_eq!(checkpoint.metadata.avg_loss, history[epoch].avg_loss);
        assert_eq!(checkpoint.model.n_classes, 2);
    }
}

#[test]
fn loss_goes_down_with_sgd_and_poly_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Halves { len: 2, rows: 4, cols: 4 };
    let mut rng = StdRng::seed_from_u64(3);
    let mut model = get_model(Architecture::Fcn, 2, 8, (4, 4), &mut rng).unwrap();
    let mut optimizer = Sgd::new(0.05).with_momentum(0.5, 0.0);
    let mut cfg = config(dir.path(), 15, 1);
    cfg.base_lr = 0.05;
    cfg.schedule = ferrite_seg::optim::LrSchedule::poly();

    let history = train_loop(&mut model, &dataset, &mut optimizer, &mut Recorder::default(), &cfg, &mut rng)
        .unwrap();

    let first = history.first().unwrap().avg_loss;
    let last = history.last().unwrap().avg_loss;
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
    assert!(history.last().unwrap().learning_rate < 0.05);
}

#[test]
fn dashboard_failures_do_not_stop_training() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Halves { len: 1, rows: 2, cols: 2 };
    let mut rng = StdRng::seed_from_u64(1);
    let mut model = get_model(Architecture::Fcn, 2, 8, (2, 2), &mut rng).unwrap();
    let mut optimizer = Adam::new(1e-3);

    let history =
        train_loop(&mut model, &dataset, &mut optimizer, &mut Broken, &config(dir.path(), 1, 1), &mut rng)
            .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].checkpoint.exists());
}

#[test]
fn class_count_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Halves { len: 1, rows: 2, cols: 2 };
    let mut rng = StdRng::seed_from_u64(1);
    let mut model = get_model(Architecture::Fcn, 5, 8, (2, 2), &mut rng).unwrap();
    let mut optimizer = Adam::new(1e-3);

    let err = train_loop(
        &mut model,
        &dataset,
        &mut optimizer,
        &mut Recorder::default(),
        &config(dir.path(), 1, 1),
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, SegError::ShapeMismatch { .. }));
}

#[test]
fn dashboard_server_records_training_run() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Halves { len: 2, rows: 2, cols: 2 };
    let mut rng = StdRng::seed_from_u64(5);
    let mut model = get_model(Architecture::Fcn, 2, 8, (2, 2), &mut rng).unwrap();
    let mut optimizer = Adam::new(1e-3);
    let mut server = DashboardServer::start("127.0.0.1:0").unwrap();

    train_loop(&mut model, &dataset, &mut optimizer, &mut server, &config(dir.path(), 2, 1), &mut rng)
        .unwrap();

    let state = server.state();
    let snapshot = lock(&state).snapshot();
    assert_eq!(snapshot.windows.len(), 1);
    assert_eq!(snapshot.windows[0].points.len(), 2);
    let titles: Vec<_> = snapshot.images.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, ["Test Epoch0", "GT Epoch0", "Predicted Epoch0", "Predicted Epoch1"]);
}
