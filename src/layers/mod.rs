pub mod act;
pub mod conv;
pub mod param;
pub mod pool;

use serde::{Serialize, Deserialize};

use crate::math::FeatureMap;

pub use act::Activation;
pub use conv::Conv2d;
pub use param::Param;
pub use pool::{MaxPool2d, Upsample2d};

/// One stage of a sequential segmentation network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Conv2d(Conv2d),
    Activation(Activation),
    MaxPool2d(MaxPool2d),
    Upsample2d(Upsample2d),
}

impl Layer {
    pub fn forward(&mut self, input: &FeatureMap) -> FeatureMap {
        match self {
            Layer::Conv2d(l)     => l.forward(input),
            Layer::Activation(l) => l.forward(input),
            Layer::MaxPool2d(l)  => l.forward(input),
            Layer::Upsample2d(l) => l.forward(input),
        }
    }

    pub fn backward(&mut self, grad_out: &FeatureMap) -> FeatureMap {
        match self {
            Layer::Conv2d(l)     => l.backward(grad_out),
            Layer::Activation(l) => l.backward(grad_out),
            Layer::MaxPool2d(l)  => l.backward(grad_out),
            Layer::Upsample2d(l) => l.backward(grad_out),
        }
    }

    pub fn zero_grad(&mut self) {
        if let Layer::Conv2d(l) = self {
            l.zero_grad();
        }
    }

    pub fn scale_grads(&mut self, factor: f64) {
        if let Layer::Conv2d(l) = self {
            l.scale_grads(factor);
        }
    }

    pub fn params(&mut self) -> Vec<Param<'_>> {
        match self {
            Layer::Conv2d(l) => l.params().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Layer::Conv2d(l) => l.parameter_count(),
            _ => 0,
        }
    }
}
