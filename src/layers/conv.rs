use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::layers::param::Param;
use crate::math::{FeatureMap, Matrix};

/// 2-D convolution with odd square kernel, stride 1 and "same" zero padding,
/// so the spatial size of the output always equals the input.
///
/// Implemented as im2col followed by a single matrix product:
/// `cols (H*W, C*k*k) * weights (C*k*k, out) = out (H*W, out)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
    // im2col of the last input, needed for the weight gradient
    #[serde(skip)]
    cols: Matrix,
    #[serde(skip)]
    input_hw: (usize, usize),
    #[serde(skip)]
    weights_grad: Matrix,
    #[serde(skip)]
    biases_grad: Vec<f64>,
}

impl Conv2d {
    fn with_weights(in_channels: usize, out_channels: usize, kernel: usize, weights: Matrix) -> Conv2d {
        assert!(kernel % 2 == 1, "kernel size must be odd, got {}", kernel);
        Conv2d {
            in_channels,
            out_channels,
            kernel,
            weights,
            biases: vec![0.0; out_channels],
            cols: Matrix::default(),
            input_hw: (0, 0),
            weights_grad: Matrix::default(),
            biases_grad: Vec::new(),
        }
    }

    /// He-initialized convolution, for layers followed by a ReLU.
    pub fn he<R: Rng + ?Sized>(in_channels: usize, out_channels: usize, kernel: usize, rng: &mut R) -> Conv2d {
        let fan_in = in_channels * kernel * kernel;
        Conv2d::with_weights(in_channels, out_channels, kernel, Matrix::he(fan_in, out_channels, rng))
    }

    /// Xavier-initialized convolution, for the classifier head.
    pub fn xavier<R: Rng + ?Sized>(in_channels: usize, out_channels: usize, kernel: usize, rng: &mut R) -> Conv2d {
        let fan_in = in_channels * kernel * kernel;
        Conv2d::with_weights(in_channels, out_channels, kernel, Matrix::xavier(fan_in, out_channels, rng))
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.data.len() + self.biases.len()
    }

    fn im2col(&self, input: &FeatureMap) -> Matrix {
        let (h, w, k) = (input.height, input.width, self.kernel);
        let pad = (k / 2) as isize;
        let mut cols = Matrix::zeros(h * w, self.in_channels * k * k);
        let width = cols.cols;

        for y in 0..h {
            for x in 0..w {
                let base = (y * w + x) * width;
                for c in 0..self.in_channels {
                    for ky in 0..k {
                        let iy = y as isize + ky as isize - pad;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for kx in 0..k {
                            let ix = x as isize + kx as isize - pad;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            cols.data[base + (c * k + ky) * k + kx] =
                                input.data[(c * h + iy as usize) * w + ix as usize];
                        }
                    }
                }
            }
        }
        cols
    }

    fn col2im(&self, dcols: &Matrix, h: usize, w: usize) -> FeatureMap {
        let k = self.kernel;
        let pad = (k / 2) as isize;
        let mut out = FeatureMap::zeros(self.in_channels, h, w);

        for y in 0..h {
            for x in 0..w {
                let row = dcols.row(y * w + x);
                for c in 0..self.in_channels {
                    for ky in 0..k {
                        let iy = y as isize + ky as isize - pad;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for kx in 0..k {
                            let ix = x as isize + kx as isize - pad;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            out.data[(c * h + iy as usize) * w + ix as usize] += row[(c * k + ky) * k + kx];
                        }
                    }
                }
            }
        }
        out
    }

    pub fn forward(&mut self, input: &FeatureMap) -> FeatureMap {
        assert_eq!(input.channels, self.in_channels, "conv input channel mismatch");
        let cols = self.im2col(input);
        let prod = cols.matmul(&self.weights);

        let n = input.plane_len();
        let mut out = FeatureMap::zeros(self.out_channels, input.height, input.width);
        for p in 0..n {
            let row = prod.row(p);
            for (oc, (&v, &b)) in row.iter().zip(&self.biases).enumerate() {
                out.data[oc * n + p] = v + b;
            }
        }

        self.cols = cols;
        self.input_hw = (input.height, input.width);
        out
    }

    /// Accumulates parameter gradients and returns ∂L/∂input.
    pub fn backward(&mut self, grad_out: &FeatureMap) -> FeatureMap {
        let (h, w) = self.input_hw;
        assert_eq!(grad_out.channels, self.out_channels);
        assert_eq!((grad_out.height, grad_out.width), (h, w), "backward called without matching forward");
        self.ensure_grads();

        // Re-lay the CHW gradient as (H*W, out) to line up with `cols`.
        let n = h * w;
        let mut g = Matrix::zeros(n, self.out_channels);
        for oc in 0..self.out_channels {
            for p in 0..n {
                g.data[p * self.out_channels + oc] = grad_out.data[oc * n + p];
            }
        }

        self.weights_grad.add_assign(&self.cols.transpose().matmul(&g));
        for (bg, s) in self.biases_grad.iter_mut().zip(g.column_sums()) {
            *bg += s;
        }

        let dcols = g.matmul(&self.weights.transpose());
        self.col2im(&dcols, h, w)
    }

    fn ensure_grads(&mut self) {
        if self.weights_grad.rows != self.weights.rows || self.weights_grad.cols != self.weights.cols {
            self.weights_grad = Matrix::zeros(self.weights.rows, self.weights.cols);
        }
        if self.biases_grad.len() != self.out_channels {
            self.biases_grad = vec![0.0; self.out_channels];
        }
    }

    pub fn zero_grad(&mut self) {
        self.weights_grad = Matrix::zeros(self.weights.rows, self.weights.cols);
        self.biases_grad = vec![0.0; self.out_channels];
    }

    pub fn scale_grads(&mut self, factor: f64) {
        self.weights_grad.data.iter_mut().for_each(|g| *g *= factor);
        self.biases_grad.iter_mut().for_each(|g| *g *= factor);
    }

    pub fn params(&mut self) -> [Param<'_>; 2] {
        self.ensure_grads();
        [
            Param { value: &mut self.weights.data, grad: &self.weights_grad.data },
            Param { value: &mut self.biases, grad: &self.biases_grad },
        ]
    }
}
