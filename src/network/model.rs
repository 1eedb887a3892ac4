use serde::{Serialize, Deserialize};

use crate::data::sample::LabelMap;
use crate::error::{Result, SegError};
use crate::layers::{Layer, Param};
use crate::math::FeatureMap;
use crate::network::spec::Architecture;

/// A sequential fully-convolutional network mapping an image to per-pixel
/// class logits of the same spatial size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationModel {
    pub arch: Architecture,
    pub n_classes: usize,
    pub in_channels: usize,
    pub layers: Vec<Layer>,
}

impl SegmentationModel {
    /// Forward pass; every layer caches what it needs for `backward`.
    pub fn forward(&mut self, input: &FeatureMap) -> Result<FeatureMap> {
        let factor = self.arch.downsample_factor();
        if input.channels != self.in_channels || input.height % factor != 0 || input.width % factor != 0 {
            return Err(SegError::ShapeMismatch {
                expected: format!("{} channels, sides divisible by {}", self.in_channels, factor),
                got: input.shape_string(),
            });
        }

        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current);
        }
        Ok(current)
    }

    /// Backward pass from ∂L/∂logits. Parameter gradients accumulate until
    /// the next `zero_grad`.
    pub fn backward(&mut self, grad_logits: &FeatureMap) -> FeatureMap {
        let mut delta = grad_logits.clone();
        for layer in self.layers.iter_mut().rev() {
            delta = layer.backward(&delta);
        }
        delta
    }

    pub fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Layer::zero_grad);
    }

    /// Used to turn a sum of per-sample gradients into a batch mean.
    pub fn scale_grads(&mut self, factor: f64) {
        self.layers.iter_mut().for_each(|l| l.scale_grads(factor));
    }

    pub fn parameters_mut(&mut self) -> Vec<Param<'_>> {
        self.layers.iter_mut().flat_map(|l| l.params()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Per-pixel argmax of the logits.
    pub fn predict(&mut self, input: &FeatureMap) -> Result<LabelMap> {
        let logits = self.forward(input)?;
        let classes = logits.argmax_channels().into_iter().map(|c| c as u8).collect();
        Ok(LabelMap::from_vec(logits.height, logits.width, classes))
    }
}
