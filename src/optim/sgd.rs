use crate::layers::Param;
use crate::optim::Optimizer;

/// SGD with classical momentum and L2 weight decay.
///
/// `v ← μ·v + (g + λ·w)`, `w ← w − lr·v`
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    velocity: Vec<Vec<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, weight_decay: 0.0, velocity: Vec::new() }
    }

    pub fn with_momentum(mut self, momentum: f64, weight_decay: f64) -> Sgd {
        self.momentum = momentum;
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<Param<'_>>) {
        if self.velocity.len() != params.len() {
            self.velocity = params.iter().map(|p| vec![0.0; p.value.len()]).collect();
        }

        for (param, vel) in params.into_iter().zip(self.velocity.iter_mut()) {
            for ((w, &g), v) in param.value.iter_mut().zip(param.grad).zip(vel.iter_mut()) {
                *v = self.momentum * *v + g + self.weight_decay * *w;
                *w -= self.learning_rate * *v;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_step_moves_against_gradient() {
        let mut w = vec![1.0, -1.0];
        let g = vec![0.5, -0.5];
        let mut sgd = Sgd::new(0.1);
        sgd.step(vec![Param { value: &mut w, grad: &g }]);
        assert!((w[0] - 0.95).abs() < 1e-12);
        assert!((w[1] + 0.95).abs() < 1e-12);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut w = vec![0.0];
        let g = vec![1.0];
        let mut sgd = Sgd::new(1.0).with_momentum(0.5, 0.0);
        sgd.step(vec![Param { value: &mut w, grad: &g }]);
        sgd.step(vec![Param { value: &mut w, grad: &g }]);
        // velocities 1.0 then 1.5
        assert!((w[0] + 2.5).abs() < 1e-12);
    }
}
