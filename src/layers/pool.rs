use serde::{Serialize, Deserialize};

use crate::math::FeatureMap;

/// 2x2 max pooling with stride 2. Odd trailing rows/columns are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaxPool2d {
    // flat input index of the winner for every output element
    #[serde(skip)]
    argmax: Vec<usize>,
    #[serde(skip)]
    input_shape: (usize, usize, usize),
}

impl MaxPool2d {
    pub fn new() -> MaxPool2d {
        MaxPool2d::default()
    }

    pub fn forward(&mut self, input: &FeatureMap) -> FeatureMap {
        let (oh, ow) = (input.height / 2, input.width / 2);
        let mut out = FeatureMap::zeros(input.channels, oh, ow);
        let mut argmax = Vec::with_capacity(out.data.len());

        for c in 0..input.channels {
            for y in 0..oh {
                for x in 0..ow {
                    let mut best_idx = input.index(c, 2 * y, 2 * x);
                    let mut best = input.data[best_idx];
                    for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                        let idx = input.index(c, 2 * y + dy, 2 * x + dx);
                        if input.data[idx] > best {
                            best = input.data[idx];
                            best_idx = idx;
                        }
                    }
                    out.data[(c * oh + y) * ow + x] = best;
                    argmax.push(best_idx);
                }
            }
        }

        self.argmax = argmax;
        self.input_shape = (input.channels, input.height, input.width);
        out
    }

    /// Routes each output gradient back to the input position that won the max.
    pub fn backward(&mut self, grad_out: &FeatureMap) -> FeatureMap {
        assert_eq!(grad_out.data.len(), self.argmax.len(), "backward called without matching forward");
        let (c, h, w) = self.input_shape;
        let mut grad_in = FeatureMap::zeros(c, h, w);
        for (&idx, &g) in self.argmax.iter().zip(&grad_out.data) {
            grad_in.data[idx] += g;
        }
        grad_in
    }
}

/// Nearest-neighbour upsampling by an integer factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upsample2d {
    pub factor: usize,
}

impl Upsample2d {
    pub fn new(factor: usize) -> Upsample2d {
        assert!(factor > 0, "upsample factor must be positive");
        Upsample2d { factor }
    }

    pub fn forward(&self, input: &FeatureMap) -> FeatureMap {
        let f = self.factor;
        let (oh, ow) = (input.height * f, input.width * f);
        let mut out = FeatureMap::zeros(input.channels, oh, ow);
        for c in 0..input.channels {
            for y in 0..oh {
                for x in 0..ow {
                    out.data[(c * oh + y) * ow + x] = input.get(c, y / f, x / f);
                }
            }
        }
        out
    }

    /// Each input pixel fed an f x f block, so its gradient is the block sum.
    pub fn backward(&self, grad_out: &FeatureMap) -> FeatureMap {
        let f = self.factor;
        let (h, w) = (grad_out.height / f, grad_out.width / f);
        let mut grad_in = FeatureMap::zeros(grad_out.channels, h, w);
        for c in 0..grad_out.channels {
            for y in 0..grad_out.height {
                for x in 0..grad_out.width {
                    grad_in.data[(c * h + y / f) * w + x / f] += grad_out.get(c, y, x);
                }
            }
        }
        grad_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pool_routes_gradient_to_winner() {
        let input = FeatureMap::from_vec(1, 2, 2, vec![0.1, 0.7, 0.3, -1.0]);
        let mut pool = MaxPool2d::new();
        let out = pool.forward(&input);
        assert_eq!(out.data, vec![0.7]);

        let grad = pool.backward(&FeatureMap::from_vec(1, 1, 1, vec![2.0]));
        assert_eq!(grad.data, vec![0.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn max_pool_drops_odd_edge() {
        let mut pool = MaxPool2d::new();
        let out = pool.forward(&FeatureMap::zeros(2, 5, 3));
        assert_eq!((out.channels, out.height, out.width), (2, 2, 1));
    }

    #[test]
    fn upsample_backward_sums_blocks() {
        let up = Upsample2d::new(2);
        let out = up.forward(&FeatureMap::from_vec(1, 1, 2, vec![1.0, 2.0]));
        assert_eq!(out.data, vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0]);

        let grad = up.backward(&FeatureMap::from_vec(1, 2, 4, vec![1.0; 8]));
        assert_eq!(grad.data, vec![4.0, 4.0]);
    }
}
