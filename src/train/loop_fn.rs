use std::time::Instant;

use log::{info, warn};
use rand::Rng;

use crate::dashboard::{LineOptions, Visualizer};
use crate::data::transform::untransform_image;
use crate::data::{DataLoader, Sample, SegmentationDataset};
use crate::error::{Result, SegError};
use crate::loss::cross_entropy2d_sum;
use crate::network::{save_checkpoint, CheckpointMetadata, SegmentationModel};
use crate::optim::Optimizer;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `model` on `dataset` for `config.n_epoch` epochs.
///
/// Per epoch:
/// - one shuffled pass of mini-batches, prefetched by `config.num_workers`
///   loader threads: forward, pixel-wise cross-entropy, backward,
///   gradients averaged over the labeled pixels of the batch, one
///   optimizer step
/// - the mean batch loss is appended to the "Training Loss" plot at
///   x = 0-based epoch
/// - dataset sample 0 is segmented and posted as `Predicted Epoch<e>`;
///   the first epoch also posts the input (`Test Epoch<e>`) and its ground
///   truth (`GT Epoch<e>`)
/// - a checkpoint is written to `config.checkpoint_dir`
///
/// Dashboard failures are logged and never stop training. Data, shape and
/// checkpoint I/O errors do.
pub fn train_loop<D, V, R>(
    model: &mut SegmentationModel,
    dataset: &D,
    optimizer: &mut dyn Optimizer,
    visualizer: &mut V,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<Vec<EpochStats>>
where
    D: SegmentationDataset + ?Sized,
    V: Visualizer + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;
    if dataset.is_empty() {
        return Err(SegError::InvalidConfig("dataset has no samples".into()));
    }
    if dataset.n_classes() != model.n_classes {
        return Err(SegError::ShapeMismatch {
            expected: format!("{} classes", model.n_classes),
            got: format!("{} classes in dataset", dataset.n_classes()),
        });
    }

    let loader = DataLoader::new(dataset, config.batch_size, config.shuffle, config.num_workers);
    let num_batches = loader.num_batches();
    let max_iter = config.n_epoch * num_batches;
    let (img_rows, img_cols) = dataset.image_size();

    let loss_window = visualizer
        .line_window(LineOptions::new("Training Loss", "epoch", "Loss"))
        .map_err(|e| warn!("could not create loss window: {}", e))
        .ok();

    let test_sample = dataset.get(0)?;
    let mut history = Vec::with_capacity(config.n_epoch);

    info!(
        "training {} params for {} epochs, {} batches per epoch",
        model.parameter_count(),
        config.n_epoch,
        num_batches
    );

    for epoch in 0..config.n_epoch {
        let t_start = Instant::now();
        let mut loss_sum = 0.0;
        let mut batches = 0usize;
        let mut lr = config.base_lr;

        // ── One full pass over the training data ───────────────────────────
        loader.for_each_batch(rng, |i, batch| {
            lr = config.schedule.learning_rate(config.base_lr, epoch * num_batches + i, max_iter);
            optimizer.set_learning_rate(lr);

            let loss = train_batch(model, &batch, optimizer)?;
            if !loss.is_finite() {
                warn!("non-finite loss at epoch {} batch {}", epoch + 1, i + 1);
            }

            if (i + 1) % config.log_interval == 0 {
                info!("Epoch [{}/{}] Loss: {:.4}", epoch + 1, config.n_epoch, loss);
            }
            loss_sum += loss;
            batches += 1;
            Ok(())
        })?;

        let avg_loss = loss_sum / batches.max(1) as f64;

        // ── Dashboard ─────────────────────────────────────────────────────
        if let Some(win) = loss_window {
            report(visualizer.append_line(win, epoch as f64, avg_loss), "loss point");
        }
        post_samples(model, dataset, &test_sample, epoch, visualizer)?;

        // ── Checkpoint ────────────────────────────────────────────────────
        let metadata = CheckpointMetadata {
            arch: config.run_arch.clone(),
            dataset: config.run_dataset.clone(),
            n_classes: model.n_classes,
            feature_scale: config.feature_scale,
            img_rows,
            img_cols,
            epoch,
            avg_loss,
        };
        let checkpoint = save_checkpoint(model, metadata, &config.checkpoint_dir)?;

        let stats = EpochStats {
            epoch: epoch + 1,
            total_epochs: config.n_epoch,
            avg_loss,
            batches,
            learning_rate: lr,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
            checkpoint,
        };
        info!(
            "epoch {}/{} done: avg loss {:.4}, {} ms, saved {}",
            stats.epoch,
            stats.total_epochs,
            stats.avg_loss,
            stats.elapsed_ms,
            stats.checkpoint.display()
        );
        history.push(stats);
    }

    Ok(history)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One optimizer step over `batch`. Returns the loss averaged over every
/// labeled pixel in the batch, so samples with more ignored pixels weigh
/// less.
fn train_batch(
    model: &mut SegmentationModel,
    batch: &[Sample],
    optimizer: &mut dyn Optimizer,
) -> Result<f64> {
    model.zero_grad();

    let mut total = 0.0;
    let mut valid = 0usize;
    for sample in batch {
        let logits = model.forward(&sample.image)?;
        let pixel = cross_entropy2d_sum(&logits, &sample.labels)?;
        model.backward(&pixel.grad);
        total += pixel.loss;
        valid += pixel.valid;
    }

    let inv_valid = 1.0 / valid.max(1) as f64;
    model.scale_grads(inv_valid);
    optimizer.step(model.parameters_mut());
    Ok(total * inv_valid)
}

/// Segments the fixed test sample and sends it to the dashboard.
fn post_samples<D, V>(
    model: &mut SegmentationModel,
    dataset: &D,
    test: &Sample,
    epoch: usize,
    visualizer: &mut V,
) -> Result<()>
where
    D: SegmentationDataset + ?Sized,
    V: Visualizer + ?Sized,
{
    let predicted = model.predict(&test.image)?;

    if epoch == 0 {
        let input = untransform_image(&test.image);
        report(visualizer.image(&format!("Test Epoch{}", epoch), &input), "test image");
        let target = dataset.decode_segmap(&test.labels);
        report(visualizer.image(&format!("GT Epoch{}", epoch), &target), "ground truth");
    }
    let rendered = dataset.decode_segmap(&predicted);
    report(visualizer.image(&format!("Predicted Epoch{}", epoch), &rendered), "prediction");
    Ok(())
}

fn report(result: Result<()>, what: &str) {
    if let Err(e) = result {
        warn!("dashboard: failed to post {}: {}", what, e);
    }
}
