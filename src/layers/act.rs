use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::math::FeatureMap;

/// Element-wise activation over a whole feature map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    pub function: ActivationFunction,
    // pre-activation values, needed for the derivative
    #[serde(skip)]
    pre: Vec<f64>,
}

impl Activation {
    pub fn new(function: ActivationFunction) -> Activation {
        Activation { function, pre: Vec::new() }
    }

    pub fn forward(&mut self, input: &FeatureMap) -> FeatureMap {
        let data = input.data.iter().map(|&x| self.function.function(x)).collect();
        self.pre = input.data.clone();
        FeatureMap::from_vec(input.channels, input.height, input.width, data)
    }

    pub fn backward(&mut self, grad_out: &FeatureMap) -> FeatureMap {
        assert_eq!(grad_out.data.len(), self.pre.len(), "backward called without matching forward");
        // δ = upstream ⊙ σ'(z)
        let data = grad_out.data.iter().zip(&self.pre)
            .map(|(g, &z)| g * self.function.derivative(z))
            .collect();
        FeatureMap::from_vec(grad_out.channels, grad_out.height, grad_out.width, data)
    }
}
