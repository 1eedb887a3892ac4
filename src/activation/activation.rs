use serde::{Serialize, Deserialize};
use std::f64::consts::E;

/// Element-wise nonlinearity used between convolutions.
///
/// Softmax is not listed: it is applied per pixel inside
/// `cross_entropy2d`, fused with the loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    LeakyReLU { alpha: f64 },
    Sigmoid,
    Tanh,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::Tanh => x.tanh(),
        }
    }

    /// Derivative evaluated at the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivatives_match_finite_differences() {
        let fns = [
            ActivationFunction::LeakyReLU { alpha: 0.1 },
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
        ];
        let h = 1e-6;
        for f in fns {
            for &x in &[-1.3, -0.2, 0.4, 2.0] {
                let numeric = (f.function(x + h) - f.function(x - h)) / (2.0 * h);
                assert!((numeric - f.derivative(x)).abs() < 1e-5, "{:?} at {}", f, x);
            }
        }
    }

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(ActivationFunction::ReLU.function(-3.0), 0.0);
        assert_eq!(ActivationFunction::ReLU.derivative(-3.0), 0.0);
        assert_eq!(ActivationFunction::ReLU.function(2.5), 2.5);
    }
}
