use serde::{Serialize, Deserialize};

/// A single image-shaped tensor in channel-major (CHW) layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureMap {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl FeatureMap {
    pub fn zeros(channels: usize, height: usize, width: usize) -> FeatureMap {
        FeatureMap { channels, height, width, data: vec![0.0; channels * height * width] }
    }

    /// Panics if `data.len() != channels * height * width`.
    pub fn from_vec(channels: usize, height: usize, width: usize, data: Vec<f64>) -> FeatureMap {
        assert_eq!(
            data.len(),
            channels * height * width,
            "buffer length does not match {}x{}x{}",
            channels, height, width
        );
        FeatureMap { channels, height, width, data }
    }

    #[inline]
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    #[inline]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.index(c, y, x)]
    }

    pub fn shape_string(&self) -> String {
        format!("{}x{}x{}", self.channels, self.height, self.width)
    }

    /// Per-pixel index of the largest channel.
    pub fn argmax_channels(&self) -> Vec<usize> {
        let n = self.plane_len();
        (0..n)
            .map(|p| {
                let mut best = 0;
                let mut best_val = f64::NEG_INFINITY;
                for c in 0..self.channels {
                    let v = self.data[c * n + p];
                    if v > best_val {
                        best_val = v;
                        best = c;
                    }
                }
                best
            })
            .collect()
    }
}
